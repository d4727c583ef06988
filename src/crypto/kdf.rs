//! Password-based key derivation
//!
//! PBKDF2 with HMAC-SHA256. The salt is supplied by the caller and is
//! expected to be fresh for every encryption, so derived keys are never
//! reused across envelopes.

use crate::crypto::KEY_SIZE;
use crate::error::{Error, Result};
use ring::pbkdf2::{self, PBKDF2_HMAC_SHA256};
use std::fmt;
use std::num::NonZeroU32;
use zeroize::Zeroizing;

/// Default PBKDF2 iteration count (OWASP 2023 guidance for HMAC-SHA256)
pub const PBKDF2_ITERATIONS: u32 = 600_000;

/// A 256-bit key derived from a passphrase
pub struct DerivedKey {
    key: Zeroizing<[u8; KEY_SIZE]>,
}

impl DerivedKey {
    /// Get the raw key bytes
    pub fn key(&self) -> &[u8; KEY_SIZE] {
        &self.key
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DerivedKey([REDACTED])")
    }
}

/// Derive a 256-bit key from a passphrase and salt
///
/// Any byte string is accepted as a passphrase, including the empty one.
/// Passphrase policy belongs to the caller.
pub fn derive_key(passphrase: &[u8], salt: &[u8], iterations: u32) -> Result<DerivedKey> {
    let iterations = NonZeroU32::new(iterations).ok_or_else(|| {
        Error::KeyDerivation("Iteration count must be greater than 0".to_string())
    })?;

    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    pbkdf2::derive(PBKDF2_HMAC_SHA256, iterations, salt, passphrase, &mut key[..]);

    Ok(DerivedKey { key })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAST: u32 = 1_000;

    #[test]
    fn test_deterministic_for_same_salt() {
        let a = derive_key(b"password", b"salt-1", FAST).unwrap();
        let b = derive_key(b"password", b"salt-1", FAST).unwrap();
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_salt_changes_key() {
        let a = derive_key(b"password", b"salt-1", FAST).unwrap();
        let b = derive_key(b"password", b"salt-2", FAST).unwrap();
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn test_iterations_change_key() {
        let a = derive_key(b"password", b"salt", FAST).unwrap();
        let b = derive_key(b"password", b"salt", FAST + 1).unwrap();
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn test_degenerate_passphrases_accepted() {
        let long = vec![b'x'; 64 * 1024];
        for passphrase in [&b""[..], "pässwörd-🔑".as_bytes(), &long[..]] {
            let key = derive_key(passphrase, b"salt", FAST).unwrap();
            assert_eq!(key.key().len(), KEY_SIZE);
        }
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let result = derive_key(b"password", b"salt", 0);
        assert!(matches!(result, Err(Error::KeyDerivation(_))));
    }

    #[test]
    fn test_known_vector() {
        // RFC 7914 section 11 PBKDF2-HMAC-SHA256 vector, truncated to 32 bytes
        let key = derive_key(b"passwd", b"salt", 1).unwrap();
        assert_eq!(
            hex::encode(key.key()),
            "55ac046e56e3089fec1691c22544b605f94185216dde0465e68b9d57c20dacbc"
        );
    }

    #[test]
    fn test_debug_redacts() {
        let key = derive_key(b"password", b"salt", FAST).unwrap();
        assert_eq!(format!("{:?}", key), "DerivedKey([REDACTED])");
    }
}
