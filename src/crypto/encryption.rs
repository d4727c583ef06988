//! AES-256-GCM sealing for envelope payloads
//!
//! Sealing produces the ciphertext and the authentication tag as separate
//! values so each can be stored in its own envelope field. The associated
//! data is authenticated but not encrypted.

use crate::crypto::{KEY_SIZE, NONCE_SIZE, TAG_SIZE};
use crate::error::{Error, Result, Violation};
use rand::RngCore;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};

/// Output of one AEAD seal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedData {
    /// Nonce used for encryption (unique per encryption)
    pub nonce: [u8; NONCE_SIZE],
    /// Ciphertext, same length as the plaintext
    pub ciphertext: Vec<u8>,
    /// GCM authentication tag
    pub tag: [u8; TAG_SIZE],
}

fn aead_key(key: &[u8; KEY_SIZE]) -> Result<LessSafeKey> {
    let unbound_key = UnboundKey::new(&AES_256_GCM, key)
        .map_err(|_| Error::Encryption("Failed to create AES-256-GCM key".to_string()))?;
    Ok(LessSafeKey::new(unbound_key))
}

/// Encrypt data using AES-256-GCM with a fresh random nonce
///
/// # Arguments
/// * `key` - 256-bit encryption key
/// * `plaintext` - Data to encrypt
/// * `aad` - Additional authenticated data (authenticated but not encrypted)
pub fn encrypt(key: &[u8; KEY_SIZE], plaintext: &[u8], aad: &[u8]) -> Result<SealedData> {
    let sealing_key = aead_key(key)?;

    // Generate random nonce
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::assume_unique_for_key(nonce_bytes);

    let mut in_out = plaintext.to_vec();
    let tag = sealing_key
        .seal_in_place_separate_tag(nonce, Aad::from(aad), &mut in_out)
        .map_err(|_| Error::Encryption("Encryption failed".to_string()))?;

    let mut tag_bytes = [0u8; TAG_SIZE];
    tag_bytes.copy_from_slice(tag.as_ref());

    Ok(SealedData {
        nonce: nonce_bytes,
        ciphertext: in_out,
        tag: tag_bytes,
    })
}

/// Decrypt data using AES-256-GCM
///
/// A tag mismatch (wrong key, modified ciphertext, nonce, tag or AAD) is
/// reported as [`Violation::AuthenticationFailed`].
pub fn decrypt(key: &[u8; KEY_SIZE], sealed: &SealedData, aad: &[u8]) -> Result<Vec<u8>> {
    let opening_key = aead_key(key)?;
    let nonce = Nonce::assume_unique_for_key(sealed.nonce);

    // ring expects ciphertext || tag
    let mut in_out = Vec::with_capacity(sealed.ciphertext.len() + TAG_SIZE);
    in_out.extend_from_slice(&sealed.ciphertext);
    in_out.extend_from_slice(&sealed.tag);

    let plaintext = opening_key
        .open_in_place(nonce, Aad::from(aad), &mut in_out)
        .map_err(|_| Error::SecurityViolation(Violation::AuthenticationFailed))?;

    Ok(plaintext.to_vec())
}
