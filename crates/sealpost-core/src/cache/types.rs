//! Data types for the key-derivation cache.

use chrono::{DateTime, Utc};

use crate::crypto::{DerivedKey, Salt};

/// A persisted cache row.
///
/// Nothing in here is usable without the build master secret: the derived key
/// is AES-256-GCM encrypted and the password appears only as an HMAC tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// `collection:postId`
    pub key: String,
    /// Hex HMAC-SHA256 over `key || 0x00 || password`
    pub password_tag: String,
    /// Argon2 salt (base64)
    pub salt: String,
    /// Encrypted derived key without its tag (base64)
    pub encrypted_derived_key: String,
    /// AES-GCM nonce (base64)
    pub nonce: String,
    /// AES-GCM tag (base64)
    pub auth_tag: String,
    /// Last write time (informational)
    pub updated_at: DateTime<Utc>,
}

/// A derived key together with the salt it was derived with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    pub derived_key: DerivedKey,
    pub salt: Salt,
}
