//! Cryptographic primitives for sealpost.
//!
//! Everything here wraps well-audited RustCrypto crates:
//! - **Argon2id**: memory-hard password hashing (`argon2`)
//! - **AES-256-GCM**: authenticated encryption (`aes-gcm`)
//! - **HKDF / HMAC-SHA256**: cache sub-keys and entry tags (`hkdf`, `hmac`)
//!
//! ## Threat Model
//!
//! We defend against:
//! - Theft of the build cache file (derived keys are encrypted at rest)
//! - A cache entry written for a different password or post
//! - Tampered ciphertext in published pages
//!
//! We do NOT defend against:
//! - Code running inside the build environment
//! - Readers who already know the per-post password

pub mod aead;
pub mod kdf;
pub mod random;
pub mod subkeys;

pub use kdf::{derive_key, derive_key_with, DerivedKey, KdfParams, Salt, KEY_LENGTH, SALT_LENGTH};
pub use subkeys::CacheSubkeys;
