//! Build-time content encryption.
//!
//! Each protected post resolves one [`EncryptionInfo`] per build and seals all
//! of its blocks with it: same salt and key everywhere, a fresh nonce per block.
//! Posts are resolved one after another so that at most one Argon2 run (64 MiB)
//! is in flight.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::cache::KeyCache;
use crate::crypto::{aead, DerivedKey, Salt};
use crate::error::{Result, SealError};
use crate::passwords::{CacheKey, PasswordMap};
use crate::payload::{BlockKind, EncryptedBlock, EncryptedPayload, ProtectedPage};

/// Fallback password field hint.
pub const DEFAULT_PASSWORD_HINT: &str = "Enter password";

/// Fallback text shown above the password field.
pub const DEFAULT_PASSWORD_PROMPT: &str =
    "This content is encrypted. Enter the password to view it.";

/// Key material and UI strings for one protected post.
///
/// Lives for a single build; the key is zeroized when this is dropped.
#[derive(Debug)]
pub struct EncryptionInfo {
    pub salt: Salt,
    pub derived_key: DerivedKey,
    pub hint: String,
    pub prompt: String,
}

/// Encrypt one block of UTF-8 text into an embeddable payload.
pub fn encrypt_block(plaintext: &str, derived_key: &DerivedKey, salt: &Salt) -> Result<EncryptedPayload> {
    let nonce = aead::generate_nonce()?;
    let sealed = aead::seal(derived_key.as_bytes(), &nonce, plaintext.as_bytes())?;
    Ok(EncryptedPayload::new(salt, &nonce, &sealed))
}

/// Seal every block of a post with the post's single key and salt.
pub fn seal_post(
    key: &CacheKey,
    info: &EncryptionInfo,
    blocks: &[(BlockKind, String)],
) -> Result<ProtectedPage> {
    let mut seen = HashSet::new();
    let mut sealed = Vec::with_capacity(blocks.len());
    for (kind, plaintext) in blocks {
        if !seen.insert(*kind) {
            return Err(SealError::InvalidInput(format!(
                "Duplicate {} block for {}",
                kind, key
            )));
        }
        sealed.push(EncryptedBlock {
            kind: *kind,
            data: encrypt_block(plaintext, &info.derived_key, &info.salt)?,
        });
    }

    Ok(ProtectedPage {
        key: key.to_string(),
        hint: info.hint.clone(),
        prompt: info.prompt.clone(),
        salt: info.salt.to_base64(),
        blocks: sealed,
    })
}

/// A post marked as protected in the build configuration.
#[derive(Debug, Clone)]
pub struct ProtectedPost {
    pub key: CacheKey,
    pub hint: Option<String>,
    pub prompt: Option<String>,
}

impl ProtectedPost {
    pub fn new(key: CacheKey) -> Self {
        Self {
            key,
            hint: None,
            prompt: None,
        }
    }
}

/// Site- and collection-level defaults for hint and prompt.
#[derive(Debug, Clone, Default)]
pub struct PromptDefaults {
    pub site_hint: Option<String>,
    pub site_prompt: Option<String>,
    /// Collection name → (hint, prompt)
    pub collections: HashMap<String, (Option<String>, Option<String>)>,
}

impl PromptDefaults {
    /// Post value, else collection default, else site default, else built-in.
    pub fn resolve(&self, post: &ProtectedPost) -> (String, String) {
        let collection = self.collections.get(post.key.collection());

        let hint = post
            .hint
            .clone()
            .or_else(|| collection.and_then(|(hint, _)| hint.clone()))
            .or_else(|| self.site_hint.clone())
            .unwrap_or_else(|| DEFAULT_PASSWORD_HINT.to_string());
        let prompt = post
            .prompt
            .clone()
            .or_else(|| collection.and_then(|(_, prompt)| prompt.clone()))
            .or_else(|| self.site_prompt.clone())
            .unwrap_or_else(|| DEFAULT_PASSWORD_PROMPT.to_string());

        (hint, prompt)
    }
}

/// Build pipeline: passwords + cache → sealed pages.
#[derive(Debug)]
pub struct PostSealer {
    cache: KeyCache,
    passwords: PasswordMap,
    prompts: PromptDefaults,
}

impl PostSealer {
    pub fn new(cache: KeyCache, passwords: PasswordMap, prompts: PromptDefaults) -> Self {
        Self {
            cache,
            passwords,
            prompts,
        }
    }

    /// Fail the build up front if any protected post lacks a password.
    pub fn check_configuration(&self, posts: &[ProtectedPost]) -> Result<()> {
        self.passwords
            .ensure_configured(posts.iter().map(|post| &post.key))
    }

    /// Resolve the key material and UI strings for one post.
    pub async fn resolve(&self, post: &ProtectedPost) -> Result<EncryptionInfo> {
        let password = self.passwords.password(&post.key)?;
        let material = self.cache.get_or_compute_key(&post.key, password).await?;
        let (hint, prompt) = self.prompts.resolve(post);

        Ok(EncryptionInfo {
            salt: material.salt,
            derived_key: material.derived_key,
            hint,
            prompt,
        })
    }

    /// Resolve and seal one post. The post's key is dropped before returning.
    pub async fn seal(&self, post: &ProtectedPost, blocks: &[(BlockKind, String)]) -> Result<ProtectedPage> {
        let info = self.resolve(post).await?;
        let page = seal_post(&post.key, &info, blocks)?;
        debug!(cache_key = %post.key, blocks = page.blocks.len(), "sealed post");
        Ok(page)
    }

    /// Seal posts strictly one at a time, after checking every password exists.
    pub async fn seal_all(
        &self,
        posts: &[(ProtectedPost, Vec<(BlockKind, String)>)],
    ) -> Result<Vec<ProtectedPage>> {
        let protected: Vec<ProtectedPost> = posts.iter().map(|(post, _)| post.clone()).collect();
        self.check_configuration(&protected)?;

        let mut pages = Vec::with_capacity(posts.len());
        for (post, blocks) in posts {
            pages.push(self.seal(post, blocks).await?);
        }
        Ok(pages)
    }

    pub fn cache(&self) -> &KeyCache {
        &self.cache
    }

    /// Drain pending cache writes.
    pub async fn finish(self) {
        self.cache.shutdown().await;
    }
}
