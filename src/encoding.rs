//! Printable encodings for binary envelope fields
//!
//! Ciphertext, nonce and tag are stored as standard (padded) base64 so an
//! envelope can travel through JSON or YAML without binary handling.

use crate::error::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Encode bytes as standard base64
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode a base64 field; `field` names it in the error
pub fn decode(encoded: &str, field: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(encoded)
        .map_err(|e| Error::Validation(format!("{} is not valid base64: {}", field, e)))
}

/// Decode a base64 field that must be exactly `N` bytes long
pub fn decode_array<const N: usize>(encoded: &str, field: &str) -> Result<[u8; N]> {
    let bytes = decode(encoded, field)?;
    bytes.as_slice().try_into().map_err(|_| {
        Error::Validation(format!(
            "{} has invalid length: expected {}, got {}",
            field,
            N,
            bytes.len()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_alphabet() {
        assert_eq!(encode(&[0xfb, 0xff]), "+/8=");
        assert_eq!(decode("+/8=", "x").unwrap(), vec![0xfb, 0xff]);
    }

    #[test]
    fn test_invalid_base64() {
        let err = decode("not base64!", "iv").unwrap_err();
        assert!(matches!(err, Error::Validation(ref m) if m.contains("iv")));
    }

    #[test]
    fn test_decode_array_length() {
        let twelve = encode(&[7u8; 12]);
        assert_eq!(decode_array::<12>(&twelve, "iv").unwrap(), [7u8; 12]);
        assert!(matches!(
            decode_array::<16>(&twelve, "auth_tag"),
            Err(Error::Validation(_))
        ));
    }
}
