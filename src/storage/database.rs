//! Shared SQLite connection.
//!
//! One `Database` owns the only connection to the database file. Cloning it
//! shares that connection; the engine, the access logger and the reaper all
//! hold clones. Each statement takes the mutex for its own duration only.

use crate::error::{StorageError, StorageResult};
use crate::storage::schema::ensure_schema;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

/// Current time in epoch seconds.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Handle to the shared connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").field("path", &self.path).finish()
    }
}

impl Database {
    /// Opens (or creates) the database file and ensures the schema.
    ///
    /// Creates the parent directory when it is missing. Any failure here
    /// means storage is unusable and is reported as
    /// [`StorageError::Unavailable`].
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::unavailable(parent, "failed to create data directory", e)
            })?;
        }

        let conn = Connection::open(path)
            .map_err(|e| StorageError::unavailable(path, "failed to open database", e))?;

        ensure_schema(&conn)
            .map_err(|e| StorageError::unavailable(path, "failed to create schema", e))?;

        info!(path = %path.display(), "Database initialized");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: path.to_path_buf(),
        })
    }

    /// Opens a private in-memory database with the schema applied.
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StorageError::unavailable(":memory:", "failed to open database", e))?;
        ensure_schema(&conn)
            .map_err(|e| StorageError::unavailable(":memory:", "failed to create schema", e))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: PathBuf::from(":memory:"),
        })
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Runs `f` with exclusive access to the connection.
    pub(crate) fn with_conn<T, F>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let conn = self.conn.lock().map_err(|_| StorageError::LockPoisoned)?;
        Ok(f(&conn)?)
    }
}
