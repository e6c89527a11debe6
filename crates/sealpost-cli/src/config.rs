use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use sealpost_core::{CacheKey, PromptDefaults, ProtectedPost};

/// Default log filter when neither `SEALPOST_LOG` nor the config sets one.
pub const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SealpostConfig {
    pub cache: CacheSection,
    pub site: PromptSection,
    pub collections: BTreeMap<String, PromptSection>,
    pub log: LogSection,
    pub protected: Vec<ProtectedSection>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    pub path: Option<String>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptSection {
    pub password_hint: Option<String>,
    pub password_prompt: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSection {
    pub filter: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProtectedSection {
    pub collection: String,
    pub post: String,
    pub hint: Option<String>,
    pub prompt: Option<String>,
}

impl SealpostConfig {
    /// Cache file from config, else under the XDG data dir.
    pub fn cache_path(&self) -> anyhow::Result<PathBuf> {
        match &self.cache.path {
            Some(path) if !path.trim().is_empty() => Ok(PathBuf::from(path)),
            _ => default_cache_path(),
        }
    }

    pub fn log_filter(&self) -> Option<&str> {
        self.log.filter.as_deref().filter(|f| !f.trim().is_empty())
    }

    pub fn prompt_defaults(&self) -> PromptDefaults {
        PromptDefaults {
            site_hint: self.site.password_hint.clone(),
            site_prompt: self.site.password_prompt.clone(),
            collections: self
                .collections
                .iter()
                .map(|(name, section)| {
                    (
                        name.clone(),
                        (section.password_hint.clone(), section.password_prompt.clone()),
                    )
                })
                .collect(),
        }
    }

    pub fn protected_posts(&self) -> anyhow::Result<Vec<ProtectedPost>> {
        self.protected
            .iter()
            .map(|section| {
                let key = CacheKey::new(&section.collection, &section.post)
                    .map_err(|e| anyhow::anyhow!("Invalid [[protected]] entry: {}", e))?;
                Ok(ProtectedPost {
                    key,
                    hint: section.hint.clone(),
                    prompt: section.prompt.clone(),
                })
            })
            .collect()
    }
}

/// Load the config from an explicit path, or the default path if it exists.
///
/// A missing default config is an empty one; a missing explicit one is an error.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<SealpostConfig> {
    if let Some(path) = explicit {
        return read_config(path);
    }
    let path = default_config_path()?;
    if path.exists() {
        read_config(&path)
    } else {
        Ok(SealpostConfig::default())
    }
}

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    Ok(xdg_config_dir()?.join("config.toml"))
}

pub fn default_cache_path() -> anyhow::Result<PathBuf> {
    Ok(xdg_data_dir()?.join("argon2-cache.sqlite"))
}

pub fn read_config(path: &Path) -> anyhow::Result<SealpostConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e))?;
    toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("Failed to parse config {}: {}", path.display(), e))
}

pub fn xdg_config_dir() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var("XDG_CONFIG_HOME") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value).join("sealpost"));
        }
    }
    Ok(home_dir()?.join(".config").join("sealpost"))
}

pub fn xdg_data_dir() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var("XDG_DATA_HOME") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value).join("sealpost"));
        }
    }
    Ok(home_dir()?.join(".local").join("share").join("sealpost"))
}

fn home_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .map_err(|_| anyhow::anyhow!("HOME is not set; cannot resolve default paths"))?;
    Ok(PathBuf::from(home))
}
