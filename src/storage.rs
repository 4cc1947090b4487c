use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::app_dirs::AppDirs;
use crate::error::StorageError;

const PROBE_KEY: &str = "__quiz_test__";
const PROBE_MARKER: &str = "quiz_marker_test";

/// Durable key/value storage: entries have no expiry of their own.
pub trait DurableStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;

    /// Write and remove a throwaway entry to find out if storage works at all.
    fn probe(&self) -> bool {
        let result = self
            .set_item(PROBE_KEY, "1")
            .and_then(|_| self.remove_item(PROBE_KEY));
        if let Err(e) = &result {
            log::warn!("storage unavailable: {e}");
        }
        result.is_ok()
    }
}

/// Short-lived named flags with an expiry, the liveness signal of a session.
pub trait MarkerJar {
    fn set_marker(
        &self,
        name: &str,
        value: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;
    /// Returns the marker value unless it is missing or expired at `now`.
    fn marker(&self, name: &str, now: DateTime<Utc>) -> Result<Option<String>, StorageError>;
    fn delete_marker(&self, name: &str) -> Result<(), StorageError>;

    fn probe_markers(&self, now: DateTime<Utc>) -> bool {
        let result = self
            .set_marker(PROBE_MARKER, "1", now + Duration::seconds(5))
            .and_then(|_| self.marker(PROBE_MARKER, now))
            .and_then(|found| self.delete_marker(PROBE_MARKER).map(|_| found.is_some()));
        match result {
            Ok(supported) => supported,
            Err(e) => {
                log::warn!("markers unavailable: {e}");
                false
            }
        }
    }
}

/// Everything the session store needs from a backend.
pub trait StorageBackend: DurableStore + MarkerJar {}

impl<T: DurableStore + MarkerJar> StorageBackend for T {}

#[derive(Debug, Default)]
struct MemoryInner {
    items: HashMap<String, String>,
    markers: HashMap<String, (String, DateTime<Utc>)>,
    quota: Option<usize>,
    items_disabled: bool,
    markers_disabled: bool,
}

impl MemoryInner {
    fn used_without(&self, key: &str) -> usize {
        self.items
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }
}

/// In-process backend. Clones share the same state, so a test can keep a
/// handle while the store owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes fail once stored keys and values exceed `bytes`.
    pub fn with_quota(bytes: usize) -> Self {
        let storage = Self::new();
        storage.set_quota(Some(bytes));
        storage
    }

    /// Durable storage works, markers do not.
    pub fn without_markers() -> Self {
        let storage = Self::new();
        if let Ok(mut inner) = storage.lock() {
            inner.markers_disabled = true;
        }
        storage
    }

    /// Every operation fails, like storage blocked by the environment.
    pub fn disabled() -> Self {
        let storage = Self::new();
        storage.set_disabled(true);
        storage
    }

    pub fn set_quota(&self, quota: Option<usize>) {
        if let Ok(mut inner) = self.lock() {
            inner.quota = quota;
        }
    }

    pub fn set_disabled(&self, disabled: bool) {
        if let Ok(mut inner) = self.lock() {
            inner.items_disabled = disabled;
            inner.markers_disabled = disabled;
        }
    }

    pub fn len(&self) -> usize {
        self.lock().map(|inner| inner.items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryInner>, StorageError> {
        self.inner
            .lock()
            .map_err(|e| StorageError::Unavailable(e.to_string()))
    }

    fn items(&self) -> Result<MutexGuard<'_, MemoryInner>, StorageError> {
        let guard = self.lock()?;
        if guard.items_disabled {
            return Err(StorageError::Unavailable("storage is disabled".into()));
        }
        Ok(guard)
    }

    fn markers(&self) -> Result<MutexGuard<'_, MemoryInner>, StorageError> {
        let guard = self.lock()?;
        if guard.markers_disabled {
            return Err(StorageError::Unavailable("markers are disabled".into()));
        }
        Ok(guard)
    }
}

impl DurableStore for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items()?.items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut inner = self.items()?;
        if let Some(quota) = inner.quota {
            let used = inner.used_without(key) + key.len() + value.len();
            if used > quota {
                return Err(StorageError::QuotaExceeded { used, quota });
            }
        }
        inner.items.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.items()?.items.remove(key);
        Ok(())
    }
}

impl MarkerJar for MemoryStorage {
    fn set_marker(
        &self,
        name: &str,
        value: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.markers()?
            .markers
            .insert(name.to_owned(), (value.to_owned(), expires_at));
        Ok(())
    }

    fn marker(&self, name: &str, now: DateTime<Utc>) -> Result<Option<String>, StorageError> {
        let mut inner = self.markers()?;
        match inner.markers.get(name) {
            Some((value, expires_at)) if *expires_at > now => Ok(Some(value.clone())),
            Some(_) => {
                inner.markers.remove(name);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn delete_marker(&self, name: &str) -> Result<(), StorageError> {
        self.markers()?.markers.remove(name);
        Ok(())
    }
}

/// SQLite-backed storage under the user's state directory.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Open (or create) the database at `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the directory or database cannot be created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    /// Open the database at the default location.
    ///
    /// # Errors
    ///
    /// See [`SqliteStorage::open`].
    pub fn open_default() -> Result<Self, StorageError> {
        let path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("quizr_storage.db"));
        Self::open(path)
    }

    /// # Errors
    ///
    /// Returns `StorageError::Sqlite` if the schema cannot be created.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS local_storage (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS markers (
                name TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL,
                expires_at INTEGER NOT NULL
            );
            "#,
        )?;
        Ok(Self { conn })
    }
}

impl DurableStore for SqliteStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM local_storage WHERE key = ?1",
                [key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.conn.execute(
            r#"
            INSERT INTO local_storage (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.conn
            .execute("DELETE FROM local_storage WHERE key = ?1", [key])?;
        Ok(())
    }
}

impl MarkerJar for SqliteStorage {
    fn set_marker(
        &self,
        name: &str,
        value: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.conn.execute(
            r#"
            INSERT INTO markers (name, value, expires_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(name) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at
            "#,
            params![name, value, expires_at.timestamp_millis()],
        )?;
        Ok(())
    }

    fn marker(&self, name: &str, now: DateTime<Utc>) -> Result<Option<String>, StorageError> {
        self.conn.execute(
            "DELETE FROM markers WHERE name = ?1 AND expires_at <= ?2",
            params![name, now.timestamp_millis()],
        )?;
        let value = self
            .conn
            .query_row("SELECT value FROM markers WHERE name = ?1", [name], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn delete_marker(&self, name: &str) -> Result<(), StorageError> {
        self.conn
            .execute("DELETE FROM markers WHERE name = ?1", [name])?;
        Ok(())
    }
}
