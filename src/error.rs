//! Error types for nodeseal

use std::fmt;
use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for nodeseal
#[derive(Error, Debug)]
pub enum Error {
    // Envelope state errors
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Security violation: {0}")]
    SecurityViolation(Violation),

    // Crypto errors
    #[error("Key derivation error: {0}")]
    KeyDerivation(String),

    #[error("Encryption error: {0}")]
    Encryption(String),

    // Routing errors
    #[error("Route resolution failed: {0}")]
    Routing(String),

    // Config errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// The two ways a sealed envelope can fail its integrity checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    /// Associated data recomputed from the envelope does not match the
    /// hash recorded at encryption time
    Transplantation,
    /// The AEAD tag did not verify: wrong passphrase or modified ciphertext
    AuthenticationFailed,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::Transplantation => write!(
                f,
                "ciphertext transplantation detected: envelope identity does not match the one the ciphertext was sealed for"
            ),
            Violation::AuthenticationFailed => {
                write!(f, "authentication tag invalid or wrong key")
            }
        }
    }
}

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Operation attempted on an envelope in the wrong state
    InvalidOperation,
    /// Requested algorithm is not implemented
    UnsupportedOperation,
    /// Envelope is internally inconsistent
    Validation,
    /// Identity binding or authentication tag check failed
    SecurityViolation,
    /// Everything else (config, IO, serialization, ...)
    Other,
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidOperation(_) => ErrorKind::InvalidOperation,
            Error::UnsupportedOperation(_) => ErrorKind::UnsupportedOperation,
            Error::Validation(_) => ErrorKind::Validation,
            Error::SecurityViolation(_) => ErrorKind::SecurityViolation,
            _ => ErrorKind::Other,
        }
    }

    /// The violation carried by a security error, if any
    pub fn violation(&self) -> Option<Violation> {
        match self {
            Error::SecurityViolation(v) => Some(*v),
            _ => None,
        }
    }

    /// Process exit status for the CLI
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::InvalidOperation => 2,
            ErrorKind::UnsupportedOperation => 3,
            ErrorKind::Validation => 4,
            ErrorKind::SecurityViolation => 5,
            ErrorKind::Other => 1,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            Error::InvalidOperation("x".into()).kind(),
            ErrorKind::InvalidOperation
        );
        assert_eq!(
            Error::UnsupportedOperation("x".into()).kind(),
            ErrorKind::UnsupportedOperation
        );
        assert_eq!(Error::Validation("x".into()).kind(), ErrorKind::Validation);
        assert_eq!(
            Error::SecurityViolation(Violation::Transplantation).kind(),
            ErrorKind::SecurityViolation
        );
        assert_eq!(Error::Internal("x".into()).kind(), ErrorKind::Other);
    }

    #[test]
    fn test_violation_messages_are_distinct() {
        let transplant = Error::SecurityViolation(Violation::Transplantation).to_string();
        let auth = Error::SecurityViolation(Violation::AuthenticationFailed).to_string();

        assert!(transplant.contains("transplantation"));
        assert!(auth.contains("authentication tag"));
        assert!(!auth.contains("transplantation"));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(Error::Config("x".into()).exit_code(), 1);
        assert_eq!(
            Error::SecurityViolation(Violation::AuthenticationFailed).exit_code(),
            5
        );
    }
}
