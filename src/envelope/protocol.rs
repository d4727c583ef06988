//! Seal and open envelopes
//!
//! Sealing derives a fresh key per envelope (the salt is a new random
//! `key_id`), binds the envelope identity as associated data and stores
//! the ciphertext, nonce and tag as base64. Opening recomputes the
//! associated data from the envelope as it is now, compares its hash with
//! the one recorded at sealing time, and only then derives the key and
//! verifies the tag.

use super::aad::aad_hash;
use super::metadata::{Algorithm, EncryptionMetadata};
use super::{canonical_bytes, from_canonical_bytes, Envelope};
use crate::config::EncryptionConfig;
use crate::crypto::{self, derive_key, SealedData, NONCE_SIZE, PBKDF2_ITERATIONS, TAG_SIZE};
use crate::encoding;
use crate::error::{Error, Result, Violation};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

/// Encrypts and decrypts envelopes with a passphrase
///
/// Holds no key material; every call derives its own key.
#[derive(Debug, Clone, Copy)]
pub struct EnvelopeCipher {
    kdf_iterations: u32,
    algorithm: Algorithm,
}

impl Default for EnvelopeCipher {
    fn default() -> Self {
        EnvelopeCipher {
            kdf_iterations: PBKDF2_ITERATIONS,
            algorithm: Algorithm::Aes256Gcm,
        }
    }
}

impl EnvelopeCipher {
    /// Create a cipher from configuration
    pub fn new(config: &EncryptionConfig) -> Self {
        if config.kdf_iterations < PBKDF2_ITERATIONS {
            warn!(
                iterations = config.kdf_iterations,
                recommended = PBKDF2_ITERATIONS,
                "KDF iteration count below recommendation"
            );
        }
        EnvelopeCipher {
            kdf_iterations: config.kdf_iterations,
            algorithm: config.algorithm,
        }
    }

    /// Create a cipher with a specific PBKDF2 iteration count
    pub fn with_iterations(kdf_iterations: u32) -> Self {
        EnvelopeCipher {
            kdf_iterations,
            ..Default::default()
        }
    }

    pub fn kdf_iterations(&self) -> u32 {
        self.kdf_iterations
    }

    /// Algorithm used by [`EnvelopeCipher::seal`]
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Encrypt with the configured algorithm
    pub fn seal<P: Serialize>(
        &self,
        envelope: &mut Envelope<P>,
        passphrase: impl AsRef<[u8]>,
    ) -> Result<()> {
        self.encrypt(envelope, passphrase, self.algorithm)
    }

    /// Encrypt with an algorithm given by its wire name
    ///
    /// An unknown name is rejected before any key material is derived and
    /// the envelope is left untouched.
    pub fn encrypt_with_algorithm<P: Serialize>(
        &self,
        envelope: &mut Envelope<P>,
        passphrase: impl AsRef<[u8]>,
        algorithm: &str,
    ) -> Result<()> {
        ensure_plaintext(envelope)?;
        let algorithm: Algorithm = algorithm.parse()?;
        self.encrypt(envelope, passphrase, algorithm)
    }

    /// Encrypt an envelope in place
    ///
    /// Fails with `InvalidOperation` if the envelope is already sealed.
    /// On success the plaintext payload is dropped, `is_encrypted` is set
    /// and the content hash is recomputed over the sealed state.
    pub fn encrypt<P: Serialize>(
        &self,
        envelope: &mut Envelope<P>,
        passphrase: impl AsRef<[u8]>,
        algorithm: Algorithm,
    ) -> Result<()> {
        ensure_plaintext(envelope)?;

        let payload = envelope.payload.as_ref().ok_or_else(|| {
            Error::Validation(format!(
                "Envelope {} has no plaintext payload",
                envelope.envelope_id
            ))
        })?;
        let plaintext = Zeroizing::new(canonical_bytes(payload)?);

        let key_id = Uuid::new_v4().to_string();
        let key = derive_key(passphrase.as_ref(), key_id.as_bytes(), self.kdf_iterations)?;

        let aad = envelope.associated_data();
        let aad_hash = aad_hash(&aad);

        let sealed = match algorithm {
            Algorithm::Aes256Gcm => crypto::encrypt(key.key(), &plaintext, &aad)?,
        };

        debug!(
            envelope_id = %envelope.envelope_id,
            key_id = %key_id,
            algorithm = %algorithm,
            bytes = sealed.ciphertext.len(),
            "Envelope sealed"
        );

        envelope.encrypted_payload = Some(encoding::encode(&sealed.ciphertext));
        envelope.encryption_metadata = Some(EncryptionMetadata::new(
            algorithm,
            key_id,
            encoding::encode(&sealed.nonce),
            encoding::encode(&sealed.tag),
            aad_hash,
        ));
        envelope.is_encrypted = true;
        envelope.payload = None;
        envelope.content_hash = envelope.compute_content_hash()?;

        Ok(())
    }

    /// Decrypt an envelope, returning its payload
    ///
    /// The envelope is not modified. Identity mismatches are reported as
    /// [`Violation::Transplantation`] before the key is derived; a bad tag
    /// as [`Violation::AuthenticationFailed`].
    pub fn decrypt<P: DeserializeOwned>(
        &self,
        envelope: &Envelope<P>,
        passphrase: impl AsRef<[u8]>,
    ) -> Result<P> {
        if !envelope.is_encrypted {
            return Err(Error::InvalidOperation(format!(
                "Envelope {} is not encrypted",
                envelope.envelope_id
            )));
        }

        let (ciphertext, metadata) = match (
            envelope.encrypted_payload.as_deref(),
            envelope.encryption_metadata.as_ref(),
        ) {
            (Some(c), Some(m)) => (c, m),
            _ => {
                return Err(Error::Validation(format!(
                    "Envelope {} is marked encrypted but ciphertext or metadata is missing",
                    envelope.envelope_id
                )))
            }
        };

        let aad = envelope.associated_data();
        if aad_hash(&aad) != metadata.aad_hash {
            warn!(
                envelope_id = %envelope.envelope_id,
                source_node_id = %envelope.source_node_id,
                "Associated data mismatch, refusing to decrypt"
            );
            return Err(Error::SecurityViolation(Violation::Transplantation));
        }

        let sealed = SealedData {
            nonce: encoding::decode_array::<NONCE_SIZE>(&metadata.iv, "iv")?,
            ciphertext: encoding::decode(ciphertext, "encrypted_payload")?,
            tag: encoding::decode_array::<TAG_SIZE>(&metadata.auth_tag, "auth_tag")?,
        };

        let key = derive_key(
            passphrase.as_ref(),
            metadata.key_id.as_bytes(),
            self.kdf_iterations,
        )?;

        let opened = match metadata.algorithm {
            Algorithm::Aes256Gcm => crypto::decrypt(key.key(), &sealed, &aad),
        };
        let plaintext = Zeroizing::new(opened.map_err(|e| {
            if e.violation().is_some() {
                warn!(
                    envelope_id = %envelope.envelope_id,
                    key_id = %metadata.key_id,
                    "Authentication tag rejected"
                );
            }
            e
        })?);

        debug!(
            envelope_id = %envelope.envelope_id,
            key_id = %metadata.key_id,
            "Envelope opened"
        );

        from_canonical_bytes(&plaintext)
    }
}

fn ensure_plaintext<P>(envelope: &Envelope<P>) -> Result<()> {
    if envelope.is_encrypted {
        return Err(Error::InvalidOperation(format!(
            "Envelope {} is already encrypted; build a new envelope instead",
            envelope.envelope_id
        )));
    }
    Ok(())
}

impl<P: Serialize> Envelope<P> {
    /// Encrypt in place with the default cipher
    pub fn encrypt(&mut self, passphrase: impl AsRef<[u8]>) -> Result<()> {
        EnvelopeCipher::default().encrypt(self, passphrase, Algorithm::Aes256Gcm)
    }
}

impl<P: DeserializeOwned> Envelope<P> {
    /// Decrypt with the default cipher
    pub fn decrypt(&self, passphrase: impl AsRef<[u8]>) -> Result<P> {
        EnvelopeCipher::default().decrypt(self, passphrase)
    }
}
