//! Error types for sealpost core operations.
//!
//! Build-time cache problems never show up here: a cache miss is an `Option`,
//! and a failed write-back is logged and dropped. What remains are the errors a
//! caller actually has to react to.

use thiserror::Error;

/// Message shown for every failed decryption.
///
/// A wrong password and a tampered payload must look identical to the reader.
pub const DECRYPTION_FAILED_MESSAGE: &str = "incorrect password or corrupted content";

/// Result type alias for sealpost operations.
pub type Result<T> = std::result::Result<T, SealError>;

/// Core error type for sealpost operations.
#[derive(Debug, Error)]
pub enum SealError {
    /// Build configuration is incomplete or malformed (fatal for the build)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Key derivation could not run (worker init or Argon2 failure)
    #[error("Key derivation failed: {0}")]
    Derivation(String),

    /// AEAD authentication failed; never says why
    #[error("{}", DECRYPTION_FAILED_MESSAGE)]
    Decryption,

    /// Reader submitted an empty password; carries the page hint
    #[error("{0}")]
    PasswordRequired(String),

    /// Encryption primitive error
    #[error("Encryption error: {0}")]
    Crypto(String),

    /// Embedded payload does not have the expected shape
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Invalid caller input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Cache storage backend error
    #[error("Storage error: {0}")]
    Storage(String),

    /// SQLite-specific storage error
    #[error("SQLite error: {source}")]
    Sqlite {
        #[from]
        source: rusqlite::Error,
    },

    /// JSON serialization/deserialization error
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
}

impl SealError {
    /// Whether the reader can simply try again (new password or new worker).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SealError::Decryption | SealError::Derivation(_) | SealError::PasswordRequired(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decryption_message_is_generic() {
        assert_eq!(
            SealError::Decryption.to_string(),
            "incorrect password or corrupted content"
        );
    }

    #[test]
    fn test_retryable_classification() {
        assert!(SealError::Decryption.is_retryable());
        assert!(SealError::Derivation("wasm init".to_string()).is_retryable());
        assert!(!SealError::Configuration("missing".to_string()).is_retryable());
    }
}
