//! Storage Errors
//!
//! Only genuine failures live here. A missing or expired key, or a payload
//! that does not decode as JSON, is reported as `None` by the engine and
//! never reaches this type.

use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The database could not be brought up (directory, file or schema).
    ///
    /// Fatal at construction: the process should not serve storage requests.
    #[error("storage unavailable at {}: {reason}", .path.display())]
    Unavailable {
        path: PathBuf,
        reason: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A single statement failed. Scoped to the call that issued it.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Metadata could not be encoded as JSON on put.
    #[error("metadata serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A list cursor that this engine did not hand out.
    #[error("invalid list cursor: {0:?}")]
    InvalidCursor(String),

    /// The connection mutex was poisoned by a panicking holder.
    #[error("database connection lock poisoned")]
    LockPoisoned,

    /// A blocking-pool task panicked or was cancelled.
    #[error("blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl StorageError {
    pub(crate) fn unavailable(
        path: impl Into<PathBuf>,
        reason: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Unavailable {
            path: path.into(),
            reason: reason.into(),
            source: Box::new(source),
        }
    }

    /// Returns true if this error means the storage could not be constructed.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
