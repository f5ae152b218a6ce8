//! Background Expiration Reaper
//!
//! This module implements a background task that periodically deletes
//! expired rows from the `links` table. Reads already ignore expired rows
//! ("lazy expiry"), so the reaper only reclaims disk space.
//!
//! ## Design
//!
//! The reaper runs as a Tokio task and:
//! 1. Sleeps for the configured interval (default: 1 hour)
//! 2. Wakes up and issues a single `DELETE` on the blocking pool
//! 3. Logs how many rows were removed
//!
//! The connection is held only for that one statement. The task owns its
//! engine handle and stops when the [`ExpiryReaper`] handle is stopped or
//! dropped.
//!
//! Only long-running services start a reaper; see
//! [`RunMode`](crate::config::RunMode).

use crate::config::DEFAULT_REAP_INTERVAL;
use crate::error::StorageResult;
use crate::storage::KvEngine;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace};

/// Configuration for the expiration reaper.
#[derive(Debug, Clone)]
pub struct ReaperConfig {
    /// Interval between purge cycles (default: 1 hour)
    pub interval: Duration,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_REAP_INTERVAL,
        }
    }
}

/// A handle to the running reaper.
///
/// When this handle is dropped, the reaper task will be stopped.
#[derive(Debug)]
pub struct ExpiryReaper {
    /// Sender to signal shutdown
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl ExpiryReaper {
    /// Starts the reaper as a background task.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use sinkkv::storage::{Database, ExpiryReaper, KvEngine, ReaperConfig};
    ///
    /// let engine = KvEngine::new(Database::open("data/sink.db")?);
    /// let reaper = ExpiryReaper::start(engine, ReaperConfig::default());
    ///
    /// // Reaper runs in the background...
    ///
    /// // Stopping (or dropping) the handle ends it
    /// reaper.shutdown().await;
    /// ```
    pub fn start(engine: KvEngine, config: ReaperConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let interval = config.interval;
        let task = tokio::spawn(reaper_loop(engine, config, shutdown_rx));

        info!(
            interval_secs = interval.as_secs(),
            "Background expiration reaper started"
        );

        Self {
            shutdown_tx,
            task: Some(task),
        }
    }

    /// Signals the reaper to stop.
    ///
    /// This is called automatically when the handle is dropped.
    pub fn stop(&self) {
        if self.shutdown_tx.send(true).is_ok() {
            info!("Background expiration reaper stopped");
        }
    }

    /// Stops the reaper and waits for its task to finish.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for ExpiryReaper {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Runs one purge cycle on the blocking pool.
///
/// # Returns
///
/// Returns the number of rows removed.
pub async fn run_once(engine: &KvEngine) -> StorageResult<u64> {
    let engine = engine.clone();
    let removed = tokio::task::spawn_blocking(move || engine.purge_expired()).await??;

    if removed > 0 {
        info!(removed, "Cleaned up expired links");
    } else {
        trace!("No expired links to clean up");
    }
    Ok(removed)
}

/// The main reaper loop.
async fn reaper_loop(
    engine: KvEngine,
    config: ReaperConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        // Wait for the interval or shutdown signal
        tokio::select! {
            _ = tokio::time::sleep(config.interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Expiration reaper received shutdown signal");
                    return;
                }
            }
        }

        // A failed cycle is retried on the next tick
        if let Err(e) = run_once(&engine).await {
            error!(error = %e, "Expiration reaper cycle failed");
        }
    }
}
