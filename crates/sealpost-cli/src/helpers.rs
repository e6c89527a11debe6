//! Environment, input and file helpers for the CLI.

use std::io::{self, BufRead, IsTerminal};
use std::path::Path;

use dialoguer::Password;
use zeroize::Zeroizing;

use sealpost_core::{PasswordMap, ProtectedPage};

pub const PASSWORDS_ENV: &str = "SEALPOST_PASSWORDS";
pub const MASTER_SECRET_ENV: &str = "SEALPOST_MASTER_SECRET";
pub const MASTER_SALT_ENV: &str = "SEALPOST_MASTER_SALT";

/// Per-post passwords from `SEALPOST_PASSWORDS`. Unset means no passwords.
pub fn load_passwords() -> anyhow::Result<PasswordMap> {
    match std::env::var(PASSWORDS_ENV) {
        Ok(json) if !json.trim().is_empty() => {
            let json = Zeroizing::new(json);
            PasswordMap::from_json(&json).map_err(|e| anyhow::anyhow!("{}: {}", PASSWORDS_ENV, e))
        }
        _ => Ok(PasswordMap::default()),
    }
}

/// Build master secret and salt for the key cache.
pub fn load_master_key() -> anyhow::Result<(Zeroizing<String>, String)> {
    let secret = required_env(MASTER_SECRET_ENV)?;
    let salt = required_env(MASTER_SALT_ENV)?;
    Ok((Zeroizing::new(secret), salt))
}

fn required_env(name: &str) -> anyhow::Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(anyhow::anyhow!(
            "Configuration error: {} is not set\nHint: export {} before building.",
            name,
            name
        )),
    }
}

/// Prompt for a page password. Empty input is allowed so the caller can show the hint.
pub fn prompt_password(hint: &str) -> anyhow::Result<Zeroizing<String>> {
    if !io::stdin().is_terminal() {
        return Err(anyhow::anyhow!(
            "No password provided and no TTY available. Use --password-stdin."
        ));
    }
    Password::new()
        .with_prompt(hint)
        .allow_empty_password(true)
        .interact()
        .map(Zeroizing::new)
        .map_err(|e| anyhow::anyhow!("Failed to read password: {}", e))
}

/// First line of stdin, without its line ending.
pub fn read_password_stdin() -> anyhow::Result<Zeroizing<String>> {
    let mut line = Zeroizing::new(String::new());
    io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| anyhow::anyhow!("Failed to read password from stdin: {}", e))?;
    let trimmed = line.trim_end_matches(['\r', '\n']).len();
    line.truncate(trimmed);
    Ok(line)
}

pub fn read_text(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))
}

/// Read `path` if it exists.
pub fn read_optional_text(path: &Path) -> anyhow::Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    read_text(path).map(Some)
}

pub fn read_page(path: &Path) -> anyhow::Result<ProtectedPage> {
    let json = read_text(path)?;
    ProtectedPage::from_json(&json)
        .map_err(|e| anyhow::anyhow!("Failed to parse page {}: {}", path.display(), e))
}

pub fn write_page(path: &Path, page: &ProtectedPage) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                anyhow::anyhow!(
                    "Failed to create output directory {}: {}",
                    parent.display(),
                    e
                )
            })?;
        }
    }
    let json = page
        .to_json_pretty()
        .map_err(|e| anyhow::anyhow!("Failed to serialize page: {}", e))?;
    std::fs::write(path, json)
        .map_err(|e| anyhow::anyhow!("Failed to write {}: {}", path.display(), e))
}
