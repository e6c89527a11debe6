//! Cache keys and the per-post password map.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use secrecy::{ExposeSecret, SecretString};

use crate::error::{Result, SealError};

/// Stable identifier of a protected post: `"<collection>:<postId>"`.
///
/// Also used as domain-separation input to the cache entry tag, so two posts
/// must never share one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(collection: &str, post_id: &str) -> Result<Self> {
        if collection.trim().is_empty() {
            return Err(SealError::InvalidInput(
                "Collection cannot be empty".to_string(),
            ));
        }
        if collection.contains(':') {
            return Err(SealError::InvalidInput(format!(
                "Collection cannot contain ':': {}",
                collection
            )));
        }
        if post_id.trim().is_empty() {
            return Err(SealError::InvalidInput("Post id cannot be empty".to_string()));
        }
        Ok(Self(format!("{}:{}", collection, post_id)))
    }

    /// Parse a `collection:postId` string.
    pub fn parse(value: &str) -> Result<Self> {
        let (collection, post_id) = value.split_once(':').ok_or_else(|| {
            SealError::InvalidInput(format!(
                "Cache key must look like <collection>:<postId>: {}",
                value
            ))
        })?;
        Self::new(collection, post_id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn collection(&self) -> &str {
        self.0.split_once(':').map(|(c, _)| c).unwrap_or(&self.0)
    }

    pub fn post_id(&self) -> &str {
        self.0.split_once(':').map(|(_, p)| p).unwrap_or("")
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Cache key → plaintext password, loaded once at process start.
///
/// Immutable once built. `Debug` lists keys only.
#[derive(Default)]
pub struct PasswordMap {
    entries: HashMap<CacheKey, SecretString>,
}

impl PasswordMap {
    /// Parse a JSON object of `"collection:postId": "password"` pairs.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: BTreeMap<String, String> = serde_json::from_str(json).map_err(|e| {
            SealError::Configuration(format!("Password map is not a JSON object of strings: {}", e))
        })?;
        Self::from_pairs(raw)
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut entries = HashMap::new();
        for (key, password) in pairs {
            let key = CacheKey::parse(key.as_ref())
                .map_err(|e| SealError::Configuration(e.to_string()))?;
            let password = password.into();
            if password.trim().is_empty() {
                return Err(SealError::Configuration(format!(
                    "Password for {} is empty",
                    key
                )));
            }
            entries.insert(key, SecretString::from(password));
        }
        Ok(Self { entries })
    }

    /// Password for `key`; a missing entry is a configuration error.
    pub fn password(&self, key: &CacheKey) -> Result<&str> {
        self.entries
            .get(key)
            .map(|secret| secret.expose_secret())
            .ok_or_else(|| SealError::Configuration(format!("Password not found for {}", key)))
    }

    /// Fail before any derivation if a protected post has no password.
    pub fn ensure_configured<'a, I>(&self, keys: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a CacheKey>,
    {
        let mut missing: Vec<String> = keys
            .into_iter()
            .filter(|key| !self.entries.contains_key(*key))
            .map(|key| key.to_string())
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        missing.sort();
        missing.dedup();
        Err(SealError::Configuration(format!(
            "Password not found for {}",
            missing.join(", ")
        )))
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for PasswordMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&str> = self.entries.keys().map(CacheKey::as_str).collect();
        keys.sort_unstable();
        f.debug_struct("PasswordMap").field("keys", &keys).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_format() {
        let key = CacheKey::new("posts", "hello-world").unwrap();
        assert_eq!(key.as_str(), "posts:hello-world");
        assert_eq!(key.collection(), "posts");
        assert_eq!(key.post_id(), "hello-world");
    }

    #[test]
    fn test_cache_key_rejects_ambiguous_collection() {
        assert!(CacheKey::new("po:sts", "x").is_err());
        assert!(CacheKey::new("", "x").is_err());
        assert!(CacheKey::new("posts", " ").is_err());
    }

    #[test]
    fn test_cache_key_parse_allows_colon_in_post_id() {
        let key = CacheKey::parse("oi:2024:p1").unwrap();
        assert_eq!(key.collection(), "oi");
        assert_eq!(key.post_id(), "2024:p1");
    }

    #[test]
    fn test_password_map_from_json() {
        let map = PasswordMap::from_json(r#"{"posts:hello": "hunter2"}"#).unwrap();
        let key = CacheKey::new("posts", "hello").unwrap();
        assert_eq!(map.password(&key).unwrap(), "hunter2");
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_password_map_rejects_bad_json() {
        let result = PasswordMap::from_json(r#"["posts:hello"]"#);
        assert!(matches!(result, Err(SealError::Configuration(_))));

        let result = PasswordMap::from_json(r#"{"no-separator": "pw"}"#);
        assert!(matches!(result, Err(SealError::Configuration(_))));
    }

    #[test]
    fn test_missing_password_is_configuration_error() {
        let map = PasswordMap::from_json("{}").unwrap();
        let key = CacheKey::new("posts", "hello").unwrap();
        let err = map.password(&key).unwrap_err();
        assert!(matches!(err, SealError::Configuration(_)));
        assert!(err.to_string().contains("posts:hello"));
    }

    #[test]
    fn test_ensure_configured_lists_missing_keys() {
        let map = PasswordMap::from_json(r#"{"posts:a": "pw"}"#).unwrap();
        let keys = vec![
            CacheKey::new("posts", "a").unwrap(),
            CacheKey::new("posts", "c").unwrap(),
            CacheKey::new("posts", "b").unwrap(),
        ];
        let err = map.ensure_configured(&keys).unwrap_err();
        assert!(err.to_string().contains("posts:b, posts:c"));
    }

    #[test]
    fn test_blank_password_is_configuration_error() {
        let result = PasswordMap::from_json(r#"{"posts:a": "pw", "posts:b": ""}"#);
        let err = result.unwrap_err();
        assert!(matches!(err, SealError::Configuration(_)));
        assert!(err.to_string().contains("Password for posts:b is empty"));

        let result = PasswordMap::from_pairs([("posts:a", "  \n")]);
        assert!(matches!(result, Err(SealError::Configuration(_))));
    }

    #[test]
    fn test_debug_does_not_leak_passwords() {
        let map = PasswordMap::from_json(r#"{"posts:hello": "hunter2"}"#).unwrap();
        let debug_output = format!("{:?}", map);
        assert!(debug_output.contains("posts:hello"));
        assert!(!debug_output.contains("hunter2"));
    }
}
