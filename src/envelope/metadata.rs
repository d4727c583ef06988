//! Encryption metadata attached to a sealed envelope

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// AEAD scheme used to seal an envelope
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// AES-256 in Galois/Counter Mode, 12-byte nonce, 16-byte tag
    #[default]
    #[serde(rename = "AES-256-GCM")]
    Aes256Gcm,
}

impl Algorithm {
    /// Wire identifier of the algorithm
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Aes256Gcm => "AES-256-GCM",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "AES-256-GCM" => Ok(Algorithm::Aes256Gcm),
            other => Err(Error::UnsupportedOperation(format!(
                "Unsupported encryption algorithm: {}",
                other
            ))),
        }
    }
}

/// Parameters needed to open a sealed envelope
///
/// Binary values (`iv`, `auth_tag`) are base64; `aad_hash` is hex.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EncryptionMetadata {
    /// AEAD scheme
    pub algorithm: Algorithm,
    /// Per-encryption identifier, also the key-derivation salt
    pub key_id: String,
    /// Nonce for this seal
    pub iv: String,
    /// AEAD authentication tag
    pub auth_tag: String,
    /// SHA-256 of the associated data bound at encryption time
    pub aad_hash: String,
    /// Reserved for wrapped-key (asymmetric) mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_key: Option<String>,
    /// Reserved for multi-recipient mode: recipient id to wrapped key
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub recipient_keys: BTreeMap<String, String>,
}

impl EncryptionMetadata {
    pub(crate) fn new(
        algorithm: Algorithm,
        key_id: String,
        iv: String,
        auth_tag: String,
        aad_hash: String,
    ) -> Self {
        EncryptionMetadata {
            algorithm,
            key_id,
            iv,
            auth_tag,
            aad_hash,
            encrypted_key: None,
            recipient_keys: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_algorithm_parse() {
        assert_eq!(
            "AES-256-GCM".parse::<Algorithm>().unwrap(),
            Algorithm::Aes256Gcm
        );

        for bad in ["aes-256-gcm", "ChaCha20-Poly1305", ""] {
            assert!(matches!(
                bad.parse::<Algorithm>(),
                Err(Error::UnsupportedOperation(_))
            ));
        }
    }

    #[test]
    fn test_algorithm_wire_name() {
        let json = serde_json::to_string(&Algorithm::Aes256Gcm).unwrap();
        assert_eq!(json, "\"AES-256-GCM\"");
        assert_eq!(Algorithm::default().to_string(), "AES-256-GCM");

        let unknown: std::result::Result<Algorithm, _> = serde_json::from_str("\"DES\"");
        assert!(unknown.is_err());
    }

    #[test]
    fn test_reserved_fields_omitted_and_defaulted() {
        let meta = EncryptionMetadata::new(
            Algorithm::Aes256Gcm,
            "kid".to_string(),
            "aXY=".to_string(),
            "dGFn".to_string(),
            "00".to_string(),
        );
        let json = serde_json::to_string(&meta).unwrap();
        assert!(!json.contains("encrypted_key"));
        assert!(!json.contains("recipient_keys"));

        let back: EncryptionMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, meta);
        assert!(back.encrypted_key.is_none());
        assert!(back.recipient_keys.is_empty());
    }
}
