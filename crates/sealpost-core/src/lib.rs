//! # Sealpost Core
//!
//! Core library for Sealpost - password-gated static content that readers
//! unlock entirely on their side, with no server at read time.
//!
//! This crate holds the cryptography, the build-time key cache and the reader
//! protocol, independent of the CLI and of whatever renders the pages.
//!
//! ## Architecture
//!
//! - **crypto**: Argon2id, AES-256-GCM and the cache sub-keys
//! - **passwords**: Cache keys and the per-post password map
//! - **payload**: The embedded `{v, s, n, c}` contract and page document
//! - **cache**: Key-derivation cache, encrypted at rest
//! - **seal**: Build-time block encryption and the per-post pipeline
//! - **client**: Derivation worker and page decryption

pub mod cache;
pub mod client;
pub mod crypto;
pub mod error;
pub mod passwords;
pub mod payload;
pub mod seal;

pub use cache::{CacheStore, KeyCache, KeyMaterial, SqliteCacheStore};
pub use client::{DecryptSession, DecryptedBlock, KeyWorker};
pub use error::{Result, SealError, DECRYPTION_FAILED_MESSAGE};
pub use passwords::{CacheKey, PasswordMap};
pub use payload::{BlockKind, EncryptedBlock, EncryptedPayload, ProtectedPage};
pub use seal::{encrypt_block, seal_post, EncryptionInfo, PostSealer, PromptDefaults, ProtectedPost};

/// Core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
