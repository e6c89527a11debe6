//! SQLite-backed cache store.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::traits::CacheStore;
use super::types::CacheEntry;
use crate::error::{Result, SealError};

/// Cache store in a single SQLite table, `argon2_cache`.
pub struct SqliteCacheStore {
    path: Option<PathBuf>,
    conn: Mutex<Connection>,
}

impl SqliteCacheStore {
    /// Open (or create) the cache database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    SealError::Storage(format!(
                        "Failed to create cache directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            conn: Mutex::new(conn),
        })
    }

    /// A throwaway cache that lives only as long as this handle.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            path: None,
            conn: Mutex::new(conn),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS argon2_cache (
                key TEXT PRIMARY KEY,
                password_tag TEXT NOT NULL,
                salt TEXT NOT NULL,
                derived_key TEXT NOT NULL,
                nonce TEXT NOT NULL,
                auth_tag TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    /// Lock the database connection, returning an error if the mutex is poisoned.
    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| SealError::Storage("SQLite connection poisoned".to_string()))
    }
}

impl CacheStore for SqliteCacheStore {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let conn = self.lock_conn()?;
        let row = conn
            .query_row(
                "SELECT key, password_tag, salt, derived_key, nonce, auth_tag, updated_at
                 FROM argon2_cache WHERE key = ?1",
                params![key],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                },
            )
            .optional()?;

        let Some((key, password_tag, salt, encrypted_derived_key, nonce, auth_tag, updated_at)) =
            row
        else {
            return Ok(None);
        };

        let updated_at = DateTime::parse_from_rfc3339(&updated_at)
            .map_err(|e| SealError::Storage(format!("Invalid updated_at for {}: {}", key, e)))?
            .with_timezone(&Utc);

        Ok(Some(CacheEntry {
            key,
            password_tag,
            salt,
            encrypted_derived_key,
            nonce,
            auth_tag,
            updated_at,
        }))
    }

    fn upsert(&self, entry: &CacheEntry) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO argon2_cache
                (key, password_tag, salt, derived_key, nonce, auth_tag, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(key) DO UPDATE SET
                password_tag = excluded.password_tag,
                salt = excluded.salt,
                derived_key = excluded.derived_key,
                nonce = excluded.nonce,
                auth_tag = excluded.auth_tag,
                updated_at = excluded.updated_at",
            params![
                entry.key,
                entry.password_tag,
                entry.salt,
                entry.encrypted_derived_key,
                entry.nonce,
                entry.auth_tag,
                entry.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn len(&self) -> Result<usize> {
        let conn = self.lock_conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM argon2_cache", [], |row| row.get(0))?;
        usize::try_from(count)
            .map_err(|_| SealError::Storage(format!("Invalid row count: {}", count)))
    }
}
