//! Hex digests used by the envelope layer

use ring::digest::{digest, SHA256};

/// Lowercase hex SHA-256 of `data`
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(digest(&SHA256, data).as_ref())
}

/// Lowercase hex BLAKE3 of `data`
pub fn blake3_hex(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}
