//! AES-256-GCM helpers.
//!
//! Ciphertexts are always `ciphertext || 16-byte tag`, matching what browser
//! WebCrypto produces and expects. No associated data is bound.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};

use super::random::random_array;
use crate::error::{Result, SealError};

/// AES-GCM nonce length (96 bits).
pub const NONCE_LENGTH: usize = 12;

/// AES-GCM authentication tag length.
pub const TAG_LENGTH: usize = 16;

/// A fresh random nonce. Never reuse one under the same key.
pub fn generate_nonce() -> Result<[u8; NONCE_LENGTH]> {
    random_array()
}

/// Encrypt `plaintext`, returning `ciphertext || tag`.
pub fn seal(key: &[u8; 32], nonce: &[u8; NONCE_LENGTH], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|e| SealError::Crypto(format!("AES-GCM encryption failed: {}", e)))
}

/// Decrypt `ciphertext || tag`.
///
/// Every failure, including a malformed nonce, is reported as
/// [`SealError::Decryption`].
pub fn open(key: &[u8; 32], nonce: &[u8], sealed: &[u8]) -> Result<Vec<u8>> {
    if nonce.len() != NONCE_LENGTH || sealed.len() < TAG_LENGTH {
        return Err(SealError::Decryption);
    }
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(nonce), sealed)
        .map_err(|_| SealError::Decryption)
}

/// Split `ciphertext || tag` into its two parts.
pub fn split_tag(mut sealed: Vec<u8>) -> Result<(Vec<u8>, Vec<u8>)> {
    if sealed.len() < TAG_LENGTH {
        return Err(SealError::Crypto("Sealed data shorter than tag".to_string()));
    }
    let tag = sealed.split_off(sealed.len() - TAG_LENGTH);
    Ok((sealed, tag))
}
