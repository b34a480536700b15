//! Key-value blob store contracts and implementations.
//!
//! # Responsibility
//! - Store whole serialized snapshots under a well-known key.
//! - Keep storage details (SQLite, in-memory) behind one trait.
//!
//! # Invariants
//! - `put` fully replaces the previous value; there are no deltas.
//! - A rejected write leaves the previously stored value readable.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::{open_db, DbError};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

/// Result type used by blob store operations.
pub type BlobResult<T> = Result<T, BlobStoreError>;

/// Errors from blob store operations.
#[derive(Debug)]
pub enum BlobStoreError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Value does not fit in the remaining storage quota.
    QuotaExceeded {
        key: String,
        size: usize,
        quota: usize,
    },
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
}

impl Display for BlobStoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::QuotaExceeded { key, size, quota } => write!(
                f,
                "blob `{key}` of {size} bytes exceeds storage quota of {quota} bytes"
            ),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "blob store requires schema version {expected_version}, got {actual_version}"
            ),
        }
    }
}

impl Error for BlobStoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::QuotaExceeded { .. } => None,
            Self::UninitializedConnection { .. } => None,
        }
    }
}

impl From<DbError> for BlobStoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for BlobStoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Client-local key-value store for serialized snapshots.
pub trait BlobStore {
    /// Reads one value, `None` when the key was never written or was removed.
    fn get(&self, key: &str) -> BlobResult<Option<String>>;
    /// Writes one value, replacing any previous value.
    fn put(&mut self, key: &str, value: &str) -> BlobResult<()>;
    /// Removes one value. Removing a missing key is not an error.
    fn remove(&mut self, key: &str) -> BlobResult<()>;
}

impl<T: BlobStore + ?Sized> BlobStore for Box<T> {
    fn get(&self, key: &str) -> BlobResult<Option<String>> {
        (**self).get(key)
    }

    fn put(&mut self, key: &str, value: &str) -> BlobResult<()> {
        (**self).put(key, value)
    }

    fn remove(&mut self, key: &str) -> BlobResult<()> {
        (**self).remove(key)
    }
}

/// In-memory blob store with an optional total byte quota.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    values: BTreeMap<String, String>,
    quota_bytes: Option<usize>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that rejects writes pushing the total size above `quota_bytes`.
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            values: BTreeMap::new(),
            quota_bytes: Some(quota_bytes),
        }
    }

    /// Changes the quota of an existing store.
    pub fn set_quota(&mut self, quota_bytes: Option<usize>) {
        self.quota_bytes = quota_bytes;
    }

    fn used_bytes_excluding(&self, key: &str) -> usize {
        self.values
            .iter()
            .filter(|(stored_key, _)| stored_key.as_str() != key)
            .map(|(stored_key, value)| stored_key.len() + value.len())
            .sum()
    }
}

impl BlobStore for MemoryBlobStore {
    fn get(&self, key: &str) -> BlobResult<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: &str) -> BlobResult<()> {
        if let Some(quota) = self.quota_bytes {
            let size = key.len() + value.len();
            if self.used_bytes_excluding(key) + size > quota {
                return Err(BlobStoreError::QuotaExceeded {
                    key: key.to_string(),
                    size,
                    quota,
                });
            }
        }
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> BlobResult<()> {
        self.values.remove(key);
        Ok(())
    }
}

/// SQLite-backed blob store.
pub struct SqliteBlobStore {
    conn: Connection,
}

impl SqliteBlobStore {
    /// Opens (and migrates) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> BlobResult<Self> {
        let conn = open_db(path)?;
        Self::try_new(conn)
    }

    /// Wraps a migrated connection.
    pub fn try_new(conn: Connection) -> BlobResult<Self> {
        let actual_version = current_user_version(&conn)?;
        let expected_version = latest_version();
        if actual_version != expected_version {
            return Err(BlobStoreError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        Ok(Self { conn })
    }
}

impl BlobStore for SqliteBlobStore {
    fn get(&self, key: &str) -> BlobResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM blobs WHERE blob_key = ?1;",
                [key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn put(&mut self, key: &str, value: &str) -> BlobResult<()> {
        self.conn.execute(
            "INSERT INTO blobs (blob_key, value, updated_at)
             VALUES (?1, ?2, strftime('%s', 'now') * 1000)
             ON CONFLICT(blob_key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at;",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> BlobResult<()> {
        self.conn
            .execute("DELETE FROM blobs WHERE blob_key = ?1;", [key])?;
        Ok(())
    }
}
