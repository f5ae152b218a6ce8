//! Process-wide storage handle.
//!
//! `SharedStorage` is created once by the start-up routine and cloned into
//! whatever needs storage. The database is not touched until the first
//! caller asks for it; from then on every caller gets the same engine over
//! the same connection.
//!
//! ```text
//!  first engine() ──> create data dir ──> open sink.db ──> ensure schema
//!                                                              │
//!  later engine() ──────────────────── cached Arc<KvEngine> <──┘
//! ```
//!
//! If construction fails, the error goes to the caller and the handle stays
//! uninitialized, so the next call tries again.

use crate::config::{RunMode, StorageConfig};
use crate::error::{StorageError, StorageResult};
use crate::storage::{AccessLogger, Database, ExpiryReaper, KvEngine, ReaperConfig};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Everything built from the single connection.
#[derive(Debug)]
struct Backends {
    engine: Arc<KvEngine>,
    logger: AccessLogger,
}

#[derive(Debug)]
struct Inner {
    config: StorageConfig,
    backends: OnceCell<Backends>,
}

/// Lazily-initialized handle to the embedded storage.
#[derive(Debug, Clone)]
pub struct SharedStorage {
    inner: Arc<Inner>,
}

impl SharedStorage {
    /// Creates an uninitialized handle. Nothing is opened yet.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                backends: OnceCell::new(),
            }),
        }
    }

    /// Creates a handle configured from the process environment.
    pub fn from_env() -> Self {
        Self::new(StorageConfig::from_env())
    }

    pub fn config(&self) -> &StorageConfig {
        &self.inner.config
    }

    /// Returns true once the database has been opened.
    pub fn is_initialized(&self) -> bool {
        self.inner.backends.initialized()
    }

    async fn backends(&self) -> StorageResult<&Backends> {
        self.inner
            .backends
            .get_or_try_init(|| async {
                let path = self.inner.config.db_path();
                info!(path = %path.display(), "Opening embedded storage");

                let db = tokio::task::spawn_blocking(move || Database::open(path)).await??;

                Ok::<_, StorageError>(Backends {
                    engine: Arc::new(KvEngine::new(db.clone())),
                    logger: AccessLogger::new(db),
                })
            })
            .await
    }

    /// The key/value engine, opening the database on first use.
    pub async fn engine(&self) -> StorageResult<Arc<KvEngine>> {
        Ok(Arc::clone(&self.backends().await?.engine))
    }

    /// The access logger, opening the database on first use.
    pub async fn access_logger(&self) -> StorageResult<AccessLogger> {
        Ok(self.backends().await?.logger.clone())
    }

    /// Starts the expiration reaper if this is a long-running service.
    ///
    /// Returns `None` in one-shot mode. The caller owns the returned handle
    /// and stops the reaper by dropping it or calling `shutdown`.
    pub async fn spawn_reaper(&self) -> StorageResult<Option<ExpiryReaper>> {
        if self.inner.config.mode != RunMode::Service {
            debug!("One-shot mode, expiration reaper not started");
            return Ok(None);
        }

        let engine = self.engine().await?;
        let config = ReaperConfig {
            interval: self.inner.config.reap_interval,
        };
        Ok(Some(ExpiryReaper::start(KvEngine::clone(&engine), config)))
    }
}
