//! Access Logger
//!
//! Appends one row per link access and reads the recent history back. The
//! log is independent of link liveness: entries outlive the links they
//! describe.
//!
//! Logging sits beside the redirect path, never on it. Request handlers
//! should use [`AccessLogger::log_access_detached`], which cannot fail the
//! caller.

use crate::error::StorageResult;
use crate::storage::database::Database;
use rusqlite::params;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

/// Default number of entries returned by `get_analytics`.
pub const DEFAULT_ANALYTICS_LIMIT: usize = 100;

/// One access to be recorded. Only `slug` is required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessEvent {
    pub slug: String,
    pub user_agent: Option<String>,
    pub ip: Option<String>,
    pub referer: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub device: Option<String>,
    pub browser: Option<String>,
    pub os: Option<String>,
}

impl AccessEvent {
    pub fn new(slug: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            ..Self::default()
        }
    }
}

/// A stored access log row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRecord {
    pub id: i64,
    pub link_slug: String,
    pub timestamp: i64,
    pub user_agent: Option<String>,
    pub ip: Option<String>,
    pub referer: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub device: Option<String>,
    pub browser: Option<String>,
    pub os: Option<String>,
}

/// Writes and reads the `analytics` table.
#[derive(Debug, Clone)]
pub struct AccessLogger {
    db: Database,
}

impl AccessLogger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Appends one access row. Fields are stored as given.
    pub fn log_access(&self, event: &AccessEvent) -> StorageResult<()> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO analytics (link_slug, user_agent, ip, referer, country, city, device, browser, os)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    event.slug,
                    event.user_agent,
                    event.ip,
                    event.referer,
                    event.country,
                    event.city,
                    event.device,
                    event.browser,
                    event.os,
                ],
            )
        })?;
        trace!(slug = %event.slug, "access logged");
        Ok(())
    }

    /// Records the access on the blocking pool without waiting for it.
    ///
    /// Failures are logged and dropped. Must be called from within a Tokio
    /// runtime.
    pub fn log_access_detached(&self, event: AccessEvent) -> tokio::task::JoinHandle<()> {
        let logger = self.clone();
        tokio::task::spawn_blocking(move || {
            if let Err(e) = logger.log_access(&event) {
                warn!(slug = %event.slug, error = %e, "Failed to record access");
            }
        })
    }

    /// Returns the most recent `limit` entries for a slug, newest first.
    pub fn get_analytics(&self, slug: &str, limit: usize) -> StorageResult<Vec<AccessRecord>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT id, link_slug, timestamp, user_agent, ip, referer, country, city, device, browser, os
                 FROM analytics
                 WHERE link_slug = ?1
                 ORDER BY timestamp DESC, id DESC
                 LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![slug, limit], |row| {
                Ok(AccessRecord {
                    id: row.get(0)?,
                    link_slug: row.get(1)?,
                    timestamp: row.get(2)?,
                    user_agent: row.get(3)?,
                    ip: row.get(4)?,
                    referer: row.get(5)?,
                    country: row.get(6)?,
                    city: row.get(7)?,
                    device: row.get(8)?,
                    browser: row.get(9)?,
                    os: row.get(10)?,
                })
            })?;
            rows.collect()
        })
    }

    /// Async version of `get_analytics` that uses `spawn_blocking`.
    pub async fn get_analytics_async(
        &self,
        slug: String,
        limit: usize,
    ) -> StorageResult<Vec<AccessRecord>> {
        let logger = self.clone();
        tokio::task::spawn_blocking(move || logger.get_analytics(&slug, limit)).await?
    }
}
