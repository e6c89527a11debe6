//! Block decryption on the reader side.

use crate::crypto::{aead, DerivedKey};
use crate::error::{Result, SealError};
use crate::payload::EncryptedPayload;

/// A derived key imported for AES-256-GCM decryption.
#[derive(Debug)]
pub struct ContentKey {
    key: DerivedKey,
}

impl ContentKey {
    /// Import raw key bytes as returned by the worker.
    pub fn import(raw: &[u8]) -> Result<Self> {
        Ok(Self {
            key: DerivedKey::from_slice(raw)?,
        })
    }
}

impl From<DerivedKey> for ContentKey {
    fn from(key: DerivedKey) -> Self {
        Self { key }
    }
}

/// Decrypt one block back to its UTF-8 text.
///
/// Malformed payloads, tag mismatches and non-UTF-8 plaintext all return
/// [`SealError::Decryption`].
pub fn decrypt_block(key: &ContentKey, payload: &EncryptedPayload) -> Result<String> {
    let parts = payload.decode().map_err(|_| SealError::Decryption)?;
    let plaintext = aead::open(key.key.as_bytes(), &parts.nonce, &parts.sealed)?;
    String::from_utf8(plaintext).map_err(|_| SealError::Decryption)
}
