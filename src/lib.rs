//! nodeseal - Secure envelope encryption for execution nodes
//!
//! Wraps structured events in envelopes that can be sealed with a
//! passphrase (PBKDF2-HMAC-SHA256 + AES-256-GCM). The ciphertext is bound
//! to the envelope's identity, so moving it into another envelope, or
//! editing the identity fields, makes decryption fail.

pub mod config;
pub mod crypto;
pub mod encoding;
pub mod envelope;
pub mod error;
pub mod routing;
pub mod worker;

pub use config::Config;
pub use envelope::{
    create_secure_encrypted, Algorithm, EncryptionMetadata, Envelope, EnvelopeCipher, SealRequest,
};
pub use error::{Error, ErrorKind, Result, Violation};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::envelope::{Algorithm, Envelope, EnvelopeCipher, SealRequest};
    pub use crate::error::{Error, ErrorKind, Result, Violation};
    pub use crate::routing::{DirectRouter, RouteResolver, RouteSpec};
    pub use crate::worker::SealPool;
}
