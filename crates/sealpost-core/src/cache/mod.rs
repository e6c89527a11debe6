//! Build-time key-derivation cache.
//!
//! Argon2id with 64 MiB per call is too slow to repeat for every protected
//! post on every build, so derived keys are cached in a [`CacheStore`]. Rows
//! are useless without the build master secret:
//!
//! - the derived key is AES-256-GCM encrypted under an HKDF sub-key
//! - the row carries an HMAC tag over `(cache key, password)` under a second
//!   sub-key, so a row written for another password or post is never accepted
//!
//! Every read problem is a miss and leads to recomputation. Writes are
//! detached tasks; a failed write is logged and the next build recomputes.

mod sqlite;
mod traits;
mod types;

pub use sqlite::SqliteCacheStore;
pub use traits::CacheStore;
pub use types::{CacheEntry, KeyMaterial};

use std::sync::{Arc, Mutex, PoisonError};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::crypto::{aead, derive_key_with, CacheSubkeys, DerivedKey, KdfParams, Salt};
use crate::error::{Result, SealError};
use crate::passwords::CacheKey;

/// Handle to the key-derivation cache.
///
/// Built once per build process; the sub-keys are derived at construction and
/// never recomputed per lookup.
pub struct KeyCache {
    store: Arc<dyn CacheStore>,
    subkeys: CacheSubkeys,
    params: KdfParams,
    pending: Mutex<JoinSet<()>>,
}

impl KeyCache {
    /// Create a cache handle over `store`, deriving the sub-keys from the
    /// build master secret and salt.
    pub fn new(store: Arc<dyn CacheStore>, master_secret: &[u8], master_salt: &[u8]) -> Result<Self> {
        Ok(Self {
            store,
            subkeys: CacheSubkeys::derive(master_secret, master_salt)?,
            params: KdfParams::CURRENT,
            pending: Mutex::new(JoinSet::new()),
        })
    }

    /// Return the cached key for `(key, password)` or derive and cache a new one.
    ///
    /// Cache problems never surface here; only a failing Argon2 run does.
    pub async fn get_or_compute_key(&self, key: &CacheKey, password: &str) -> Result<KeyMaterial> {
        if let Some(material) = self.lookup(key, password) {
            debug!(cache_key = %key, "argon2 cache hit");
            return Ok(material);
        }

        debug!(cache_key = %key, "argon2 cache miss");
        let fresh = self.compute_fresh(password).await?;
        self.persist(key, password, &fresh);
        Ok(fresh)
    }

    /// Read and authenticate the cached entry for `key`.
    ///
    /// Returns `None` for anything short of a fully valid entry bound to this
    /// exact key and password.
    pub fn lookup(&self, key: &CacheKey, password: &str) -> Option<KeyMaterial> {
        let entry = match self.store.get(key.as_str()) {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(err) => {
                warn!(cache_key = %key, error = %err, "argon2 cache read failed");
                return None;
            }
        };

        if entry.key != key.as_str() {
            return None;
        }

        if !self
            .subkeys
            .verify_password_tag(key.as_str(), password, &entry.password_tag)
        {
            debug!(cache_key = %key, "argon2 cache entry belongs to a different password");
            return None;
        }

        match self.open_entry(&entry) {
            Ok(material) => Some(material),
            Err(err) => {
                warn!(
                    cache_key = %key,
                    error = %err,
                    "password matched but cached key could not be decrypted"
                );
                None
            }
        }
    }

    fn open_entry(&self, entry: &CacheEntry) -> Result<KeyMaterial> {
        let ciphertext = decode_column("derived_key", &entry.encrypted_derived_key)?;
        let nonce = decode_column("nonce", &entry.nonce)?;
        let tag = decode_column("auth_tag", &entry.auth_tag)?;

        let sealed = [ciphertext, tag].concat();
        let plaintext = Zeroizing::new(aead::open(
            self.subkeys.encryption_key(),
            &nonce,
            &sealed,
        )?);

        Ok(KeyMaterial {
            derived_key: DerivedKey::from_slice(&plaintext)?,
            salt: Salt::from_base64(&entry.salt)?,
        })
    }

    /// Derive a new key under a fresh random 32-byte salt.
    ///
    /// Argon2 runs on a blocking thread; callers should still derive one post
    /// at a time, since every run claims 64 MiB.
    pub async fn compute_fresh(&self, password: &str) -> Result<KeyMaterial> {
        let salt = Salt::generate()?;
        let params = self.params;
        let password = Zeroizing::new(password.to_string());

        let derived_key = tokio::task::spawn_blocking(move || {
            derive_key_with(&params.argon2()?, &password, salt.as_bytes())
        })
        .await
        .map_err(|e| SealError::Derivation(format!("Argon2 task failed: {}", e)))??;

        info!("derived fresh argon2 key");
        Ok(KeyMaterial { derived_key, salt })
    }

    /// Write `material` back to the store without waiting for it.
    ///
    /// Failures are logged and dropped. Outside a tokio runtime the write
    /// happens inline.
    pub fn persist(&self, key: &CacheKey, password: &str, material: &KeyMaterial) {
        let entry = match self.seal_entry(key, password, material) {
            Ok(entry) => entry,
            Err(err) => {
                warn!(cache_key = %key, error = %err, "argon2 cache update failed");
                return;
            }
        };

        let store = Arc::clone(&self.store);
        let write = move || {
            if let Err(err) = store.upsert(&entry) {
                warn!(cache_key = %entry.key, error = %err, "argon2 cache update failed");
            }
        };

        if tokio::runtime::Handle::try_current().is_err() {
            write();
            return;
        }

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        while pending.try_join_next().is_some() {}
        pending.spawn_blocking(write);
    }

    fn seal_entry(&self, key: &CacheKey, password: &str, material: &KeyMaterial) -> Result<CacheEntry> {
        let nonce = aead::generate_nonce()?;
        let sealed = aead::seal(
            self.subkeys.encryption_key(),
            &nonce,
            material.derived_key.as_bytes(),
        )?;
        let (ciphertext, tag) = aead::split_tag(sealed)?;

        Ok(CacheEntry {
            key: key.to_string(),
            password_tag: self.subkeys.password_tag(key.as_str(), password)?,
            salt: material.salt.to_base64(),
            encrypted_derived_key: STANDARD.encode(ciphertext),
            nonce: STANDARD.encode(nonce),
            auth_tag: STANDARD.encode(tag),
            updated_at: Utc::now(),
        })
    }

    /// Number of write-backs that have not been reaped yet.
    pub fn pending_writes(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Wait for every outstanding write-back.
    pub async fn flush(&self) {
        let mut pending = {
            let mut guard = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *guard)
        };
        while let Some(result) = pending.join_next().await {
            if let Err(err) = result {
                warn!(error = %err, "argon2 cache write task failed");
            }
        }
    }

    /// Drain outstanding writes and drop the handle.
    pub async fn shutdown(self) {
        self.flush().await;
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }
}

impl std::fmt::Debug for KeyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyCache")
            .field("params", &self.params)
            .field("pending_writes", &self.pending_writes())
            .finish_non_exhaustive()
    }
}

fn decode_column(name: &str, value: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(value.as_bytes())
        .map_err(|e| SealError::Storage(format!("Cache column '{}' is not base64: {}", name, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> KeyCache {
        let store = Arc::new(SqliteCacheStore::open_in_memory().unwrap());
        KeyCache::new(store, b"master-secret", b"master-salt").unwrap()
    }

    fn key() -> CacheKey {
        CacheKey::new("posts", "hello").unwrap()
    }

    #[tokio::test]
    async fn test_miss_computes_and_persists() {
        let cache = cache();
        assert!(cache.lookup(&key(), "hunter2").is_none());

        let material = cache.get_or_compute_key(&key(), "hunter2").await.unwrap();
        cache.flush().await;

        assert_eq!(cache.store().len().unwrap(), 1);
        assert_eq!(cache.lookup(&key(), "hunter2"), Some(material));
    }

    #[tokio::test]
    async fn test_stored_row_holds_no_plaintext_key() {
        let cache = cache();
        let material = cache.get_or_compute_key(&key(), "hunter2").await.unwrap();
        cache.flush().await;

        let entry = cache.store().get("posts:hello").unwrap().unwrap();
        assert_ne!(entry.encrypted_derived_key, material.derived_key.to_base64());
        assert!(!entry.password_tag.contains("hunter2"));
        assert_eq!(entry.salt, material.salt.to_base64());
    }

    #[tokio::test]
    async fn test_wrong_password_misses() {
        let cache = cache();
        cache.get_or_compute_key(&key(), "hunter2").await.unwrap();
        cache.flush().await;

        assert!(cache.lookup(&key(), "hunter3").is_none());
    }

    #[tokio::test]
    async fn test_entry_copied_to_another_key_misses() {
        let cache = cache();
        cache.get_or_compute_key(&key(), "hunter2").await.unwrap();
        cache.flush().await;

        let mut entry = cache.store().get("posts:hello").unwrap().unwrap();
        entry.key = "posts:other".to_string();
        cache.store().upsert(&entry).unwrap();

        let other = CacheKey::new("posts", "other").unwrap();
        assert!(cache.lookup(&other, "hunter2").is_none());
    }

    #[test]
    fn test_persist_outside_runtime_writes_inline() {
        let cache = cache();
        let material = KeyMaterial {
            derived_key: DerivedKey::from_slice(&[5u8; 32]).unwrap(),
            salt: Salt::from_slice(&[6u8; 32]).unwrap(),
        };

        cache.persist(&key(), "hunter2", &material);

        assert_eq!(cache.pending_writes(), 0);
        assert_eq!(cache.lookup(&key(), "hunter2"), Some(material));
    }

    #[test]
    fn test_debug_hides_subkeys() {
        let debug_output = format!("{:?}", cache());
        assert!(debug_output.contains("KeyCache"));
        assert!(!debug_output.contains("subkeys"));
    }
}
