//! Storage Configuration
//!
//! Everything the storage layer needs from the environment:
//!
//! | Variable                  | Meaning                              | Default    |
//! |---------------------------|--------------------------------------|------------|
//! | `DATA_DIR`                | Directory holding the database file  | `./data`   |
//! | `SINK_ENV`                | `production` enables service mode    | one-shot   |
//! | `SINK_REAP_INTERVAL_SECS` | Seconds between reaper cycles        | `3600`     |
//!
//! The service binary layers its command-line flags on top of this.

use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// File name of the database inside the data directory.
pub const DB_FILE_NAME: &str = "sink.db";

/// Name of the data directory used when `DATA_DIR` is not set.
pub const DEFAULT_DATA_DIR: &str = "data";

/// Default interval between reaper cycles (one hour).
pub const DEFAULT_REAP_INTERVAL: Duration = Duration::from_secs(60 * 60);

pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const RUN_MODE_ENV: &str = "SINK_ENV";
pub const REAP_INTERVAL_ENV: &str = "SINK_REAP_INTERVAL_SECS";

/// Whether the process is a long-running service or a short-lived run.
///
/// Only a service runs the expiration reaper; a lingering periodic task
/// would keep one-shot runs and tests from exiting cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Tests, scripts, single invocations. The reaper stays off.
    #[default]
    OneShot,
    /// Long-running deployment. The reaper is started at boot.
    Service,
}

impl RunMode {
    /// Interprets the value of the activation flag.
    pub fn from_flag(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("production") {
            Self::Service
        } else {
            Self::OneShot
        }
    }

    pub fn is_service(self) -> bool {
        self == Self::Service
    }
}

/// Configuration for the embedded storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Directory holding the database file. Created if absent.
    pub data_dir: PathBuf,
    /// Service vs one-shot mode.
    pub mode: RunMode,
    /// Interval between reaper cycles.
    pub reap_interval: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            mode: RunMode::OneShot,
            reap_interval: DEFAULT_REAP_INTERVAL,
        }
    }
}

impl StorageConfig {
    /// Reads the configuration from the process environment.
    ///
    /// A relative default data directory is resolved against the current
    /// working directory.
    pub fn from_env() -> Self {
        let mut config = Self::from_lookup(|name| std::env::var(name).ok());
        if config.data_dir.is_relative() {
            if let Ok(cwd) = std::env::current_dir() {
                config.data_dir = cwd.join(&config.data_dir);
            }
        }
        config
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup(DATA_DIR_ENV).filter(|d| !d.trim().is_empty()) {
            config.data_dir = PathBuf::from(dir);
        }

        if let Some(mode) = lookup(RUN_MODE_ENV) {
            config.mode = RunMode::from_flag(&mode);
        }

        if let Some(raw) = lookup(REAP_INTERVAL_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => config.reap_interval = Duration::from_secs(secs),
                _ => warn!(
                    value = %raw,
                    "Ignoring invalid {}, using default",
                    REAP_INTERVAL_ENV
                ),
            }
        }

        config
    }

    /// A one-shot configuration rooted at `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Full path of the database file.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE_NAME)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}
