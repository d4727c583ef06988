//! Cryptography module for nodeseal
//!
//! Provides AES-256-GCM encryption with PBKDF2-HMAC-SHA256 key derivation.
//! Every primitive here is pure: no I/O, no shared state.

mod digest;
mod encryption;
mod kdf;

pub use digest::{blake3_hex, sha256_hex};
pub use encryption::{decrypt, encrypt, SealedData};
pub use kdf::{derive_key, DerivedKey, PBKDF2_ITERATIONS};

/// Size of AES-256 key in bytes
pub const KEY_SIZE: usize = 32;

/// Size of GCM nonce in bytes
pub const NONCE_SIZE: usize = 12;

/// Size of GCM authentication tag in bytes
pub const TAG_SIZE: usize = 16;
