//! Cache store trait definition.
//!
//! The `CacheStore` trait is the persistence seam of the key-derivation cache.
//! The cache treats every error from it as a miss (on read) or logs and drops
//! it (on write), so implementations should report failures rather than hide
//! them.

use super::types::CacheEntry;
use crate::error::Result;

/// Persistent storage for cache entries.
///
/// All implementations must ensure:
/// - One row per cache key
/// - `upsert` replaces an existing row wholesale (last writer wins)
pub trait CacheStore: Send + Sync {
    /// Fetch the entry for `key`, if any.
    fn get(&self, key: &str) -> Result<Option<CacheEntry>>;

    /// Insert or replace the entry keyed by `entry.key`.
    fn upsert(&self, entry: &CacheEntry) -> Result<()>;

    /// Number of stored entries.
    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}
