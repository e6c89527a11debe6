pub mod build;
pub mod inspect;
pub mod seal;
pub mod unlock;

use std::sync::Arc;

use tracing::debug;

use sealpost_core::{KeyCache, PostSealer, SqliteCacheStore};

use crate::config::SealpostConfig;
use crate::helpers::{load_master_key, load_passwords};

/// Open the key cache and password map for a build.
pub fn open_sealer(config: &SealpostConfig) -> anyhow::Result<PostSealer> {
    let passwords = load_passwords()?;
    let (secret, salt) = load_master_key()?;

    let cache_path = config.cache_path()?;
    let store = SqliteCacheStore::open(&cache_path)
        .map_err(|e| anyhow::anyhow!("Failed to open cache {}: {}", cache_path.display(), e))?;
    debug!(path = %cache_path.display(), passwords = passwords.len(), "opened argon2 cache");

    let cache = KeyCache::new(Arc::new(store), secret.as_bytes(), salt.as_bytes())?;
    Ok(PostSealer::new(cache, passwords, config.prompt_defaults()))
}
