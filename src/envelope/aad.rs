//! Associated data binding a ciphertext to its envelope
//!
//! Format: `"nodeseal-aad-v1"` followed by `envelope_id`, `source_node_id`
//! and `envelope_timestamp`, in that order, each as a 4-byte big-endian
//! length and its UTF-8 bytes. The length prefixes keep the encoding
//! injective, so no two identities share an AAD.

use crate::crypto::sha256_hex;
use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

/// Domain label prefixed to every AAD
pub const AAD_LABEL: &[u8] = b"nodeseal-aad-v1";

/// Append one length-prefixed field to `out`
pub(crate) fn put_field(out: &mut Vec<u8>, field: &[u8]) {
    out.extend_from_slice(&(field.len() as u32).to_be_bytes());
    out.extend_from_slice(field);
}

/// Canonical RFC 3339 form of an envelope timestamp
pub fn canonical_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Build the associated data for an envelope identity
pub fn build_aad(
    envelope_id: &Uuid,
    source_node_id: &str,
    envelope_timestamp: &DateTime<Utc>,
) -> Vec<u8> {
    let id = envelope_id.hyphenated().to_string();
    let ts = canonical_timestamp(envelope_timestamp);

    let mut aad =
        Vec::with_capacity(AAD_LABEL.len() + 12 + id.len() + source_node_id.len() + ts.len());
    aad.extend_from_slice(AAD_LABEL);
    put_field(&mut aad, id.as_bytes());
    put_field(&mut aad, source_node_id.as_bytes());
    put_field(&mut aad, ts.as_bytes());
    aad
}

/// Hex SHA-256 of an AAD, as stored in the metadata
pub fn aad_hash(aad: &[u8]) -> String {
    sha256_hex(aad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_layout() {
        let id = Uuid::nil();
        let aad = build_aad(&id, "A", &fixed_time());

        assert!(aad.starts_with(AAD_LABEL));
        let rest = &aad[AAD_LABEL.len()..];
        assert_eq!(&rest[..4], &36u32.to_be_bytes());
        assert_eq!(&rest[4..40], b"00000000-0000-0000-0000-000000000000");
        assert_eq!(&rest[40..44], &1u32.to_be_bytes());
        assert_eq!(rest[44], b'A');
        assert_eq!(&rest[49..], b"2024-03-01T12:00:00Z");
    }

    #[test]
    fn test_each_field_changes_aad() {
        let id = Uuid::new_v4();
        let base = build_aad(&id, "node-a", &fixed_time());

        assert_ne!(base, build_aad(&Uuid::new_v4(), "node-a", &fixed_time()));
        assert_ne!(base, build_aad(&id, "node-b", &fixed_time()));
        assert_ne!(
            base,
            build_aad(&id, "node-a", &(fixed_time() + chrono::Duration::microseconds(1)))
        );
    }

    #[test]
    fn test_field_boundaries_are_unambiguous() {
        // Shifting bytes between fields must not produce the same AAD
        let id = Uuid::nil();
        let t = fixed_time();
        let a = build_aad(&id, "node-a2024", &t);
        let b = build_aad(&id, "node-a", &t);
        assert_ne!(a, b);
    }

    #[test]
    fn test_subsecond_precision_kept() {
        let t = fixed_time() + chrono::Duration::nanoseconds(123_456_789);
        assert_eq!(canonical_timestamp(&t), "2024-03-01T12:00:00.123456789Z");
    }

    #[test]
    fn test_hash_is_hex_sha256() {
        let aad = build_aad(&Uuid::nil(), "A", &fixed_time());
        let hash = aad_hash(&aad);
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, aad_hash(&aad));
    }
}
