//! Cache sub-keys derived from the build master secret.
//!
//! One HKDF-SHA256 extraction, two expansions with distinct labels: an
//! AES-256-GCM key that encrypts cached derived keys at rest, and an
//! HMAC-SHA256 key that binds each cache entry to `(cache key, password)`.

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Result, SealError};

type HmacSha256 = Hmac<Sha256>;

const ENCRYPTION_LABEL: &[u8] = b"sealpost-cache:encryption";
const TAG_LABEL: &[u8] = b"sealpost-cache:tag";

/// Separator between cache key and password in the tag input.
///
/// Without it `("a", "bc")` and `("ab", "c")` would authenticate identically.
const TAG_SEPARATOR: u8 = 0x00;

/// The two purpose-specific cache keys.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct CacheSubkeys {
    encryption: [u8; 32],
    tag: [u8; 32],
}

impl CacheSubkeys {
    /// Expand the master secret and salt into the cache sub-keys.
    pub fn derive(master_secret: &[u8], master_salt: &[u8]) -> Result<Self> {
        if master_secret.is_empty() {
            return Err(SealError::Configuration(
                "Master secret cannot be empty".to_string(),
            ));
        }
        if master_salt.is_empty() {
            return Err(SealError::Configuration(
                "Master salt cannot be empty".to_string(),
            ));
        }

        let hk = Hkdf::<Sha256>::new(Some(master_salt), master_secret);

        let mut subkeys = Self {
            encryption: [0u8; 32],
            tag: [0u8; 32],
        };
        hk.expand(ENCRYPTION_LABEL, &mut subkeys.encryption)
            .map_err(|e| SealError::Crypto(format!("HKDF expand failed: {}", e)))?;
        hk.expand(TAG_LABEL, &mut subkeys.tag)
            .map_err(|e| SealError::Crypto(format!("HKDF expand failed: {}", e)))?;

        Ok(subkeys)
    }

    /// Key for AES-256-GCM over cached derived keys.
    pub fn encryption_key(&self) -> &[u8; 32] {
        &self.encryption
    }

    fn tag_mac(&self, cache_key: &str, password: &str) -> Result<HmacSha256> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.tag)
            .map_err(|e| SealError::Crypto(format!("HMAC init failed: {}", e)))?;
        mac.update(cache_key.as_bytes());
        mac.update(&[TAG_SEPARATOR]);
        mac.update(password.as_bytes());
        Ok(mac)
    }

    /// Hex-encoded HMAC over `cache_key || 0x00 || password`.
    pub fn password_tag(&self, cache_key: &str, password: &str) -> Result<String> {
        let mac = self.tag_mac(cache_key, password)?;
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Check a stored tag in constant time. Malformed tags never match.
    pub fn verify_password_tag(&self, cache_key: &str, password: &str, stored: &str) -> bool {
        let Ok(stored) = hex::decode(stored) else {
            return false;
        };
        match self.tag_mac(cache_key, password) {
            Ok(mac) => mac.verify_slice(&stored).is_ok(),
            Err(_) => false,
        }
    }
}

impl std::fmt::Debug for CacheSubkeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheSubkeys").finish_non_exhaustive()
    }
}
