//! Key/Value Engine over SQLite
//!
//! This module implements the embedded backend: a managed-KV compatible
//! namespace stored in the `links` table.
//!
//! ## Design Decisions
//!
//! 1. **One liveness predicate**: every read shares [`LIVE_PREDICATE`]; the
//!    purge uses its exact complement, so readers and the reaper always agree.
//! 2. **Lazy expiry**: expired rows stay on disk until the reaper runs, but
//!    are invisible to every read.
//! 3. **Full replace**: `put` is `INSERT OR REPLACE`; nothing of the old row
//!    survives, including `created_at`.
//! 4. **Blocking core, async shell**: the inherent methods are synchronous;
//!    the [`KvNamespace`] impl moves them onto the blocking pool.
//!
//! ## Listing
//!
//! ```text
//!   live rows with key prefix P, newest first
//!   ┌──────────┬──────────┬──────────┬──────────┬──────────┐
//!   │  row 0   │  row 1   │   ...    │ row L-1  │  row L   │ <- probe row
//!   └──────────┴──────────┴──────────┴──────────┴──────────┘
//!   └─────────────── page (limit L) ─────────────┘
//! ```
//!
//! One row past the limit is fetched. If it exists the page is incomplete
//! and a cursor pointing after the page is returned.

use crate::error::{StorageError, StorageResult};
use crate::kv::{
    KvNamespace, KvValue, ListKey, ListOptions, ListResult, PutOptions, ValueType,
    ValueWithMetadata, DEFAULT_LIST_LIMIT,
};
use crate::storage::database::{unix_now, Database};
use crate::storage::json::{decode_column, decode_or_absent};
use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Condition under which a row is visible. Binds `:now`.
const LIVE_PREDICATE: &str = "(expiration IS NULL OR expiration > :now)";

/// Prefix used for list cursors so foreign tokens are rejected.
const CURSOR_TAG: &str = "o:";

/// Operation counters.
#[derive(Debug, Default)]
struct Counters {
    get_count: AtomicU64,
    put_count: AtomicU64,
    del_count: AtomicU64,
    list_count: AtomicU64,
    expired_count: AtomicU64,
}

/// The embedded key/value engine.
///
/// Cheap to clone; all clones share one connection and one set of counters.
///
/// # Example
///
/// ```
/// use sinkkv::storage::{Database, KvEngine};
/// use sinkkv::kv::{PutOptions, ValueType, KvValue};
///
/// let engine = KvEngine::new(Database::open_in_memory().unwrap());
///
/// engine.put("link:abc", r#"{"url":"https://example.com"}"#, &PutOptions::new()).unwrap();
/// let value = engine.get("link:abc", ValueType::Text).unwrap();
/// assert_eq!(value, Some(KvValue::Text(r#"{"url":"https://example.com"}"#.into())));
/// ```
#[derive(Clone)]
pub struct KvEngine {
    db: Database,
    counters: Arc<Counters>,
}

impl std::fmt::Debug for KvEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvEngine")
            .field("path", &self.db.path())
            .field("get_count", &self.counters.get_count.load(Ordering::Relaxed))
            .field("put_count", &self.counters.put_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl KvEngine {
    /// Creates an engine over an opened database.
    pub fn new(db: Database) -> Self {
        Self {
            db,
            counters: Arc::new(Counters::default()),
        }
    }

    /// The database this engine operates on.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Gets the live value for a key.
    ///
    /// Returns `None` if the key doesn't exist, has expired, or was asked
    /// for as JSON and does not parse.
    pub fn get(&self, key: &str, value_type: ValueType) -> StorageResult<Option<KvValue>> {
        self.counters.get_count.fetch_add(1, Ordering::Relaxed);
        let now = unix_now();

        let raw: Option<String> = self.db.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT value FROM links WHERE key = :key AND {LIVE_PREDICATE}"),
                rusqlite::named_params! { ":key": key, ":now": now },
                |row| row.get(0),
            )
            .optional()
        })?;

        trace!(key, found = raw.is_some(), "get");
        Ok(raw.and_then(|raw| decode_value(raw, value_type)))
    }

    /// Gets the live value and its metadata.
    ///
    /// Metadata that fails to parse reads as `None` without affecting the
    /// value. Both are `None` when the key is not live.
    pub fn get_with_metadata(
        &self,
        key: &str,
        value_type: ValueType,
    ) -> StorageResult<ValueWithMetadata> {
        self.counters.get_count.fetch_add(1, Ordering::Relaxed);
        let now = unix_now();

        let row: Option<(String, Option<String>)> = self.db.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "SELECT value, metadata FROM links WHERE key = :key AND {LIVE_PREDICATE}"
                ),
                rusqlite::named_params! { ":key": key, ":now": now },
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
        })?;

        let Some((raw, metadata)) = row else {
            return Ok(ValueWithMetadata::default());
        };

        Ok(ValueWithMetadata {
            value: decode_value(raw, value_type),
            metadata: decode_column(metadata.as_deref()),
        })
    }

    /// Writes a key, fully replacing any existing record.
    pub fn put(&self, key: &str, value: &str, options: &PutOptions) -> StorageResult<()> {
        self.counters.put_count.fetch_add(1, Ordering::Relaxed);
        let now = unix_now();

        let expiration = options.resolve_expiration(now);
        let metadata = match &options.metadata {
            Some(m) if !m.is_null() => Some(serde_json::to_string(m)?),
            _ => None,
        };

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO links (key, value, expiration, metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![key, value, expiration, metadata, now],
            )
        })?;

        trace!(key, ?expiration, "put");
        Ok(())
    }

    /// Deletes a key.
    ///
    /// # Returns
    ///
    /// Returns `true` if a row was removed, `false` if there was nothing to remove.
    pub fn delete(&self, key: &str) -> StorageResult<bool> {
        self.counters.del_count.fetch_add(1, Ordering::Relaxed);

        let removed = self
            .db
            .with_conn(|conn| conn.execute("DELETE FROM links WHERE key = ?1", [key]))?;

        trace!(key, removed, "delete");
        Ok(removed > 0)
    }

    /// Lists live keys starting with the prefix, newest first.
    pub fn list(&self, options: &ListOptions) -> StorageResult<ListResult> {
        self.counters.list_count.fetch_add(1, Ordering::Relaxed);
        let now = unix_now();

        let prefix = options.prefix.as_deref().unwrap_or("");
        // A zero limit falls back to the default, like an absent one
        let limit = options
            .limit
            .filter(|&l| l > 0)
            .unwrap_or(DEFAULT_LIST_LIMIT);
        // One extra row tells us whether another page exists
        let sql_limit = i64::try_from(limit).unwrap_or(i64::MAX).saturating_add(1);
        let offset = match options.cursor.as_deref() {
            Some(cursor) => decode_cursor(cursor)?,
            None => 0,
        };

        let rows: Vec<(String, Option<String>, Option<i64>)> = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT key, metadata, expiration FROM links
                 WHERE substr(key, 1, length(:prefix)) = :prefix AND {LIVE_PREDICATE}
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT :limit OFFSET :offset"
            ))?;
            let rows = stmt.query_map(
                rusqlite::named_params! {
                    ":prefix": prefix,
                    ":now": now,
                    ":limit": sql_limit,
                    ":offset": offset,
                },
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )?;
            rows.collect()
        })?;

        let list_complete = rows.len() <= limit;
        let keys = rows
            .into_iter()
            .take(limit)
            .map(|(name, metadata, expiration)| ListKey {
                name,
                metadata: decode_column(metadata.as_deref()),
                expiration,
            })
            .collect::<Vec<_>>();

        let cursor = (!list_complete).then(|| {
            let returned = i64::try_from(keys.len()).unwrap_or(i64::MAX);
            encode_cursor(offset.saturating_add(returned))
        });

        trace!(prefix, returned = keys.len(), list_complete, "list");
        Ok(ListResult {
            keys,
            list_complete,
            cursor,
        })
    }

    /// Physically removes every expired row in one statement.
    ///
    /// This is called by the background reaper.
    ///
    /// # Returns
    ///
    /// Returns the number of rows removed.
    pub fn purge_expired(&self) -> StorageResult<u64> {
        let now = unix_now();

        let removed = self.db.with_conn(|conn| {
            conn.execute(
                "DELETE FROM links WHERE expiration IS NOT NULL AND expiration <= ?1",
                [now],
            )
        })? as u64;

        if removed > 0 {
            self.counters
                .expired_count
                .fetch_add(removed, Ordering::Relaxed);
        }
        Ok(removed)
    }

    /// Number of rows on disk, expired ones included.
    pub fn record_count(&self) -> StorageResult<u64> {
        let count: i64 = self
            .db
            .with_conn(|conn| conn.query_row("SELECT COUNT(*) FROM links", [], |row| row.get(0)))?;
        Ok(count as u64)
    }

    /// Returns engine statistics.
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            get_ops: self.counters.get_count.load(Ordering::Relaxed),
            put_ops: self.counters.put_count.load(Ordering::Relaxed),
            del_ops: self.counters.del_count.load(Ordering::Relaxed),
            list_ops: self.counters.list_count.load(Ordering::Relaxed),
            expired: self.counters.expired_count.load(Ordering::Relaxed),
        }
    }

    /// Runs `op` on a clone of this engine on the blocking pool.
    async fn blocking<T, F>(&self, op: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(KvEngine) -> StorageResult<T> + Send + 'static,
    {
        let engine = self.clone();
        tokio::task::spawn_blocking(move || op(engine)).await?
    }
}

/// Engine statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStats {
    /// Total get / get_with_metadata operations
    pub get_ops: u64,
    /// Total put operations
    pub put_ops: u64,
    /// Total delete operations
    pub del_ops: u64,
    /// Total list operations
    pub list_ops: u64,
    /// Total expired rows purged
    pub expired: u64,
}

fn decode_value(raw: String, value_type: ValueType) -> Option<KvValue> {
    match value_type {
        ValueType::Text => Some(KvValue::Text(raw)),
        ValueType::Json => decode_or_absent(&raw).map(KvValue::Json),
    }
}

fn encode_cursor(offset: i64) -> String {
    format!("{CURSOR_TAG}{offset}")
}

/// Accepts only what `encode_cursor` produces: plain decimal digits with no
/// sign or leading zeros, small enough to bind as an SQL offset.
fn decode_cursor(cursor: &str) -> StorageResult<i64> {
    cursor
        .strip_prefix(CURSOR_TAG)
        .filter(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
        .filter(|n| *n == "0" || !n.starts_with('0'))
        .and_then(|n| n.parse::<i64>().ok())
        .ok_or_else(|| StorageError::InvalidCursor(cursor.to_string()))
}

#[async_trait]
impl KvNamespace for KvEngine {
    async fn get(&self, key: &str, value_type: ValueType) -> StorageResult<Option<KvValue>> {
        let key = key.to_string();
        self.blocking(move |engine| engine.get(&key, value_type))
            .await
    }

    async fn get_with_metadata(
        &self,
        key: &str,
        value_type: ValueType,
    ) -> StorageResult<ValueWithMetadata> {
        let key = key.to_string();
        self.blocking(move |engine| engine.get_with_metadata(&key, value_type))
            .await
    }

    async fn put(&self, key: &str, value: &str, options: PutOptions) -> StorageResult<()> {
        let key = key.to_string();
        let value = value.to_string();
        self.blocking(move |engine| engine.put(&key, &value, &options))
            .await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let key = key.to_string();
        self.blocking(move |engine| engine.delete(&key).map(|_| ()))
            .await
    }

    async fn list(&self, options: ListOptions) -> StorageResult<ListResult> {
        self.blocking(move |engine| engine.list(&options)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    fn engine() -> KvEngine {
        KvEngine::new(Database::open_in_memory().unwrap())
    }

    fn text(s: &str) -> Option<KvValue> {
        Some(KvValue::Text(s.to_string()))
    }

    #[test]
    fn test_put_and_get() {
        let engine = engine();

        engine.put("key", "value", &PutOptions::new()).unwrap();
        assert_eq!(engine.get("key", ValueType::Text).unwrap(), text("value"));
    }

    #[test]
    fn test_get_nonexistent() {
        let engine = engine();
        assert_eq!(engine.get("nonexistent", ValueType::Text).unwrap(), None);
        assert_eq!(
            engine
                .get_with_metadata("nonexistent", ValueType::Json)
                .unwrap(),
            ValueWithMetadata::default()
        );
    }

    #[test]
    fn test_get_as_json() {
        let engine = engine();

        engine
            .put("link:abc", r#"{"url":"https://example.com"}"#, &PutOptions::new())
            .unwrap();
        assert_eq!(
            engine.get("link:abc", ValueType::Json).unwrap(),
            Some(KvValue::Json(json!({"url": "https://example.com"})))
        );
    }

    #[test]
    fn test_malformed_json_reads_as_absent() {
        let engine = engine();

        engine.put("key", "not json at all", &PutOptions::new()).unwrap();
        assert_eq!(engine.get("key", ValueType::Json).unwrap(), None);
        // The raw string is untouched
        assert_eq!(engine.get("key", ValueType::Text).unwrap(), text("not json at all"));
    }

    #[test]
    fn test_metadata_round_trip() {
        let engine = engine();
        let metadata = json!({"slug": "abc", "tags": ["a", "b"], "nested": {"n": 1.5}});

        engine
            .put(
                "link:abc",
                r#"{"url":"https://example.com"}"#,
                &PutOptions::new().metadata(metadata.clone()),
            )
            .unwrap();

        let result = engine
            .get_with_metadata("link:abc", ValueType::Json)
            .unwrap();
        assert_eq!(
            result.value,
            Some(KvValue::Json(json!({"url": "https://example.com"})))
        );
        assert_eq!(result.metadata, Some(metadata));
    }

    #[test]
    fn test_malformed_metadata_keeps_value() {
        let engine = engine();
        engine.put("key", "value", &PutOptions::new()).unwrap();
        engine
            .database()
            .with_conn(|conn| {
                conn.execute("UPDATE links SET metadata = '{broken' WHERE key = 'key'", [])
            })
            .unwrap();

        let result = engine.get_with_metadata("key", ValueType::Text).unwrap();
        assert_eq!(result.value, text("value"));
        assert_eq!(result.metadata, None);
    }

    #[test]
    fn test_overwrite_replaces_everything() {
        let engine = engine();

        engine
            .put(
                "key",
                "v1",
                &PutOptions::new()
                    .metadata(json!({"old": true}))
                    .expiration_ttl(3600),
            )
            .unwrap();
        engine
            .put("key", "v2", &PutOptions::new().metadata(json!({"new": true})))
            .unwrap();

        let result = engine.get_with_metadata("key", ValueType::Text).unwrap();
        assert_eq!(result.value, text("v2"));
        assert_eq!(result.metadata, Some(json!({"new": true})));

        // Expiry did not survive either
        let listed = engine.list(&ListOptions::new()).unwrap();
        assert_eq!(listed.keys[0].expiration, None);

        // Overwrite without metadata clears it
        engine.put("key", "v3", &PutOptions::new()).unwrap();
        let result = engine.get_with_metadata("key", ValueType::Text).unwrap();
        assert_eq!(result.value, text("v3"));
        assert_eq!(result.metadata, None);
    }

    #[test]
    fn test_delete() {
        let engine = engine();

        engine.put("key", "value", &PutOptions::new()).unwrap();
        assert!(engine.delete("key").unwrap());
        assert_eq!(engine.get("key", ValueType::Text).unwrap(), None);
        assert!(!engine.delete("key").unwrap()); // Already deleted
    }

    #[test]
    fn test_expiry() {
        let engine = engine();

        engine
            .put("key", "value", &PutOptions::new().expiration_ttl(1))
            .unwrap();

        // Key should exist immediately
        assert_eq!(engine.get("key", ValueType::Text).unwrap(), text("value"));

        // Wait for expiry (epoch-second resolution)
        std::thread::sleep(Duration::from_millis(2100));

        // Key should be gone, but still on disk until purged
        assert_eq!(engine.get("key", ValueType::Text).unwrap(), None);
        assert_eq!(engine.record_count().unwrap(), 1);
    }

    #[test]
    fn test_already_expired_put() {
        let engine = engine();

        engine
            .put(
                "link:abc",
                r#"{"url":"https://example.com"}"#,
                &PutOptions::new().metadata(json!({"slug": "abc"})),
            )
            .unwrap();
        assert!(engine
            .get_with_metadata("link:abc", ValueType::Json)
            .unwrap()
            .value
            .is_some());

        engine
            .put(
                "link:abc",
                r#"{"url":"https://example.com"}"#,
                &PutOptions::new().expiration_ttl(0),
            )
            .unwrap();
        assert_eq!(engine.get("link:abc", ValueType::Json).unwrap(), None);
        assert_eq!(
            engine
                .get_with_metadata("link:abc", ValueType::Json)
                .unwrap(),
            ValueWithMetadata::default()
        );

        engine
            .put("other", "v", &PutOptions::new().expiration_ttl(-30))
            .unwrap();
        assert_eq!(engine.get("other", ValueType::Text).unwrap(), None);
    }

    #[test]
    fn test_absolute_expiration() {
        let engine = engine();
        let now = unix_now();

        engine
            .put("past", "v", &PutOptions::new().expiration(now - 10))
            .unwrap();
        engine
            .put("future", "v", &PutOptions::new().expiration(now + 3600))
            .unwrap();

        assert_eq!(engine.get("past", ValueType::Text).unwrap(), None);
        assert_eq!(engine.get("future", ValueType::Text).unwrap(), text("v"));
    }

    #[test]
    fn test_no_expiration_never_expires() {
        let engine = engine();
        engine.put("forever", "v", &PutOptions::new()).unwrap();

        // Even far behind the purge horizon the row stays
        assert_eq!(engine.purge_expired().unwrap(), 0);
        assert_eq!(engine.get("forever", ValueType::Text).unwrap(), text("v"));
    }

    #[test]
    fn test_list_prefix_and_order() {
        let engine = engine();
        let now = unix_now();

        engine.put("link:first", "1", &PutOptions::new()).unwrap();
        engine.put("other:x", "2", &PutOptions::new()).unwrap();
        engine
            .put(
                "link:second",
                "3",
                &PutOptions::new().metadata(json!({"slug": "second"})),
            )
            .unwrap();
        engine
            .put("link:dead", "4", &PutOptions::new().expiration(now - 1))
            .unwrap();
        engine
            .put("link:third", "5", &PutOptions::new().expiration(now + 600))
            .unwrap();

        let result = engine.list(&ListOptions::new().prefix("link:")).unwrap();
        let names: Vec<&str> = result.keys.iter().map(|k| k.name.as_str()).collect();
        assert_eq!(names, vec!["link:third", "link:second", "link:first"]);
        assert!(result.list_complete);
        assert!(result.cursor.is_none());

        assert_eq!(result.keys[0].expiration, Some(now + 600));
        assert_eq!(result.keys[1].metadata, Some(json!({"slug": "second"})));
        assert_eq!(result.keys[2].metadata, None);
    }

    #[test]
    fn test_list_orders_by_creation_time() {
        let engine = engine();
        engine.put("a", "1", &PutOptions::new()).unwrap();
        engine.put("b", "2", &PutOptions::new()).unwrap();

        // Backdate "b" so "a" is the newest despite insertion order
        engine
            .database()
            .with_conn(|conn| {
                conn.execute("UPDATE links SET created_at = created_at - 100 WHERE key = 'b'", [])
            })
            .unwrap();

        let names: Vec<String> = engine
            .list(&ListOptions::new())
            .unwrap()
            .keys
            .into_iter()
            .map(|k| k.name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_list_prefix_is_literal() {
        let engine = engine();
        engine.put("a%b", "1", &PutOptions::new()).unwrap();
        engine.put("axb", "2", &PutOptions::new()).unwrap();
        engine.put("A%B", "3", &PutOptions::new()).unwrap();

        let result = engine.list(&ListOptions::new().prefix("a%")).unwrap();
        let names: Vec<&str> = result.keys.iter().map(|k| k.name.as_str()).collect();
        assert_eq!(names, vec!["a%b"]);
    }

    #[test]
    fn test_list_pagination() {
        let engine = engine();
        for i in 0..5 {
            engine
                .put(&format!("link:{}", i), "v", &PutOptions::new())
                .unwrap();
        }

        let first = engine
            .list(&ListOptions::new().prefix("link:").limit(2))
            .unwrap();
        assert_eq!(first.keys.len(), 2);
        assert!(!first.list_complete);
        let cursor = first.cursor.clone().unwrap();

        let second = engine
            .list(&ListOptions::new().prefix("link:").limit(2).cursor(cursor))
            .unwrap();
        assert_eq!(second.keys.len(), 2);
        assert!(!second.list_complete);

        let third = engine
            .list(
                &ListOptions::new()
                    .prefix("link:")
                    .limit(2)
                    .cursor(second.cursor.clone().unwrap()),
            )
            .unwrap();
        assert_eq!(third.keys.len(), 1);
        assert!(third.list_complete);
        assert!(third.cursor.is_none());

        let mut all: Vec<String> = first
            .keys
            .into_iter()
            .chain(second.keys)
            .chain(third.keys)
            .map(|k| k.name)
            .collect();
        all.sort();
        assert_eq!(all, vec!["link:0", "link:1", "link:2", "link:3", "link:4"]);
    }

    #[test]
    fn test_list_exact_limit_is_complete() {
        let engine = engine();
        engine.put("k1", "v", &PutOptions::new()).unwrap();
        engine.put("k2", "v", &PutOptions::new()).unwrap();

        let result = engine.list(&ListOptions::new().limit(2)).unwrap();
        assert_eq!(result.keys.len(), 2);
        assert!(result.list_complete);
    }

    #[test]
    fn test_list_zero_limit_uses_default() {
        let engine = engine();
        engine.put("k1", "v", &PutOptions::new()).unwrap();

        let result = engine.list(&ListOptions::new().limit(0)).unwrap();
        assert_eq!(result.keys.len(), 1);
        assert!(result.list_complete);
    }

    #[test]
    fn test_list_rejects_foreign_cursor() {
        let engine = engine();
        let err = engine
            .list(&ListOptions::new().cursor("garbage"))
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidCursor(_)));
    }

    #[test]
    fn test_list_rejects_out_of_range_cursor() {
        let engine = engine();
        for i in 0..3 {
            engine.put(&format!("link:{}", i), "v", &PutOptions::new()).unwrap();
        }

        let forged = [
            format!("o:{}", usize::MAX),
            format!("o:{}", u64::from(u32::MAX) * u64::from(u32::MAX)),
        ];
        for cursor in forged {
            let err = engine
                .list(&ListOptions::new().limit(1).cursor(cursor))
                .unwrap_err();
            assert!(matches!(err, StorageError::InvalidCursor(_)));
        }

        // Largest bindable offset is accepted and simply yields nothing
        let result = engine
            .list(&ListOptions::new().limit(1).cursor(format!("o:{}", i64::MAX)))
            .unwrap();
        assert!(result.keys.is_empty());
        assert!(result.list_complete);
    }

    #[test]
    fn test_list_rejects_non_canonical_cursor() {
        let engine = engine();
        for cursor in ["o:", "o:+1", "o:-1", "o: 1", "o:01", "o:1x"] {
            let err = engine.list(&ListOptions::new().cursor(cursor)).unwrap_err();
            assert!(matches!(err, StorageError::InvalidCursor(_)), "{cursor}");
        }
        assert!(engine.list(&ListOptions::new().cursor("o:0")).is_ok());
    }

    #[test]
    fn test_list_huge_limit_returns_everything() {
        let engine = engine();
        for i in 0..3 {
            engine.put(&format!("link:{}", i), "v", &PutOptions::new()).unwrap();
        }

        let result = engine
            .list(&ListOptions::new().prefix("link:").limit(usize::MAX))
            .unwrap();
        assert_eq!(result.keys.len(), 3);
        assert!(result.list_complete);
        assert!(result.cursor.is_none());
    }

    #[test]
    fn test_purge_expired() {
        let engine = engine();
        let now = unix_now();

        for i in 0..3 {
            engine
                .put(&format!("dead{}", i), "v", &PutOptions::new().expiration(now - 5))
                .unwrap();
        }
        engine.put("alive1", "v", &PutOptions::new()).unwrap();
        engine.put("alive2", "v", &PutOptions::new()).unwrap();

        assert_eq!(engine.record_count().unwrap(), 5);
        assert_eq!(engine.purge_expired().unwrap(), 3);
        assert_eq!(engine.record_count().unwrap(), 2);
        assert_eq!(engine.get("alive1", ValueType::Text).unwrap(), text("v"));
        assert_eq!(engine.get("alive2", ValueType::Text).unwrap(), text("v"));
        assert_eq!(engine.stats().expired, 3);
    }

    #[test]
    fn test_stats() {
        let engine = engine();
        engine.put("k", "v", &PutOptions::new()).unwrap();
        engine.get("k", ValueType::Text).unwrap();
        engine.get_with_metadata("k", ValueType::Text).unwrap();
        engine.delete("k").unwrap();
        engine.list(&ListOptions::new()).unwrap();

        let stats = engine.stats();
        assert_eq!(stats.put_ops, 1);
        assert_eq!(stats.get_ops, 2);
        assert_eq!(stats.del_ops, 1);
        assert_eq!(stats.list_ops, 1);
    }

    #[test]
    fn test_concurrent_access() {
        use std::thread;

        let tmp = TempDir::new().unwrap();
        let engine = KvEngine::new(Database::open(tmp.path().join("sink.db")).unwrap());
        let mut handles = vec![];

        // Spawn multiple writers
        for i in 0..8 {
            let engine = engine.clone();
            handles.push(thread::spawn(move || {
                for j in 0..25 {
                    let key = format!("key-{}-{}", i, j);
                    engine.put(&key, "value", &PutOptions::new()).unwrap();
                    engine.get(&key, ValueType::Text).unwrap();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(engine.record_count().unwrap(), 200);
    }

    #[tokio::test]
    async fn test_namespace_impl() {
        let engine = engine();
        let ns: &dyn KvNamespace = &engine;

        ns.put(
            "link:abc",
            r#"{"url":"https://example.com"}"#,
            PutOptions::new().metadata(json!({"slug": "abc"})),
        )
        .await
        .unwrap();

        let result = ns
            .get_with_metadata("link:abc", ValueType::Json)
            .await
            .unwrap();
        assert_eq!(
            result.value,
            Some(KvValue::Json(json!({"url": "https://example.com"})))
        );
        assert_eq!(result.metadata, Some(json!({"slug": "abc"})));

        let listed = ns.list(ListOptions::new().prefix("link:")).await.unwrap();
        assert_eq!(listed.keys.len(), 1);

        ns.delete("link:abc").await.unwrap();
        ns.delete("link:abc").await.unwrap();
        assert_eq!(ns.get("link:abc", ValueType::Text).await.unwrap(), None);
    }
}
