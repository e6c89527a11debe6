//! Key derivation using Argon2id.
//!
//! Both the build-time cache and the reader-side worker derive keys through
//! this module, with the single parameter set [`KdfParams::CURRENT`]. A skew
//! between the two would make every decryption fail as if the password were
//! wrong.

use argon2::{Algorithm, Argon2, Params, Version};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::random::random_array;
use crate::error::{Result, SealError};

/// Length of a derived key in bytes (AES-256).
pub const KEY_LENGTH: usize = 32;

/// Length of a per-post salt in bytes.
pub const SALT_LENGTH: usize = 32;

/// Minimum salt length accepted by [`derive_key`].
const MIN_SALT_LENGTH: usize = 16;

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB
    pub memory_kib: u32,
    /// Number of passes
    pub iterations: u32,
    /// Lanes
    pub parallelism: u32,
    /// Output length in bytes
    pub output_len: usize,
}

impl KdfParams {
    /// Parameters baked into payload version 2: 64 MiB, 3 passes, 1 lane, 32 bytes.
    pub const CURRENT: KdfParams = KdfParams {
        memory_kib: 64 * 1024,
        iterations: 3,
        parallelism: 1,
        output_len: KEY_LENGTH,
    };

    /// Build an Argon2id instance for these parameters.
    pub fn argon2(&self) -> Result<Argon2<'static>> {
        let params = Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(self.output_len),
        )
        .map_err(|e| SealError::Derivation(format!("Failed to create Argon2 params: {}", e)))?;

        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// A symmetric key derived from a password.
///
/// Zeroized on drop, redacted in `Debug`, and deliberately not `Serialize`:
/// it must never end up in rendered output.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    key: [u8; KEY_LENGTH],
}

impl DerivedKey {
    pub(crate) fn from_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        Self { key: bytes }
    }

    /// Import raw key bytes, e.g. as returned by the derivation worker.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let key: [u8; KEY_LENGTH] = bytes.try_into().map_err(|_| {
            SealError::InvalidInput(format!(
                "Derived key must be {} bytes, got {}",
                KEY_LENGTH,
                bytes.len()
            ))
        })?;
        Ok(Self::from_bytes(key))
    }

    /// Decode a base64 key as stored in the build cache.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let mut bytes = STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| SealError::InvalidInput(format!("Derived key is not base64: {}", e)))?;
        let key = Self::from_slice(&bytes);
        bytes.zeroize();
        key
    }

    /// Get a reference to the raw key bytes.
    ///
    /// Use only for immediate cipher operations; never store or log it.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.key)
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Per-post Argon2 salt.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Salt([u8; SALT_LENGTH]);

impl Salt {
    /// Generate a fresh random salt.
    pub fn generate() -> Result<Self> {
        Ok(Self(random_array()?))
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let salt: [u8; SALT_LENGTH] = bytes.try_into().map_err(|_| {
            SealError::InvalidInput(format!(
                "Salt must be {} bytes, got {}",
                SALT_LENGTH,
                bytes.len()
            ))
        })?;
        Ok(Self(salt))
    }

    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| SealError::InvalidInput(format!("Salt is not base64: {}", e)))?;
        Self::from_slice(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SALT_LENGTH] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }
}

impl std::fmt::Debug for Salt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Salt({})", self.to_base64())
    }
}

/// Derive a key from a password using Argon2id with [`KdfParams::CURRENT`].
///
/// # Security
///
/// - Same password + salt always produces the same key
/// - Memory-hard: each call claims ~64 MiB, so callers should not fan out
///
/// # Examples
///
/// ```
/// use sealpost_core::crypto::derive_key;
///
/// let salt = [7u8; 32];
/// let key = derive_key("hunter2", &salt).unwrap();
/// assert_eq!(key.as_bytes().len(), 32);
/// ```
pub fn derive_key(password: &str, salt: &[u8]) -> Result<DerivedKey> {
    derive_key_with(&KdfParams::CURRENT.argon2()?, password, salt)
}

/// Derive a key with an already constructed Argon2 instance.
pub fn derive_key_with(argon2: &Argon2<'_>, password: &str, salt: &[u8]) -> Result<DerivedKey> {
    if password.is_empty() {
        return Err(SealError::InvalidInput(
            "Password cannot be empty".to_string(),
        ));
    }

    if salt.len() < MIN_SALT_LENGTH {
        return Err(SealError::InvalidInput(format!(
            "Salt must be at least {} bytes",
            MIN_SALT_LENGTH
        )));
    }

    let mut key_bytes = [0u8; KEY_LENGTH];
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut key_bytes)
        .map_err(|e| SealError::Derivation(format!("Argon2id failed: {}", e)))?;

    let key = DerivedKey::from_bytes(key_bytes);
    key_bytes.zeroize();
    Ok(key)
}
