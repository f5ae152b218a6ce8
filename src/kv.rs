//! Key-Value Capability Interface
//!
//! The contract shared by every backend: the platform-provided namespace a
//! request may carry, and the embedded SQLite engine used as fallback.
//! Callers only ever see `dyn KvNamespace` and cannot tell the two apart.
//!
//! ## Operations
//!
//! | Method              | Absent / expired key          |
//! |---------------------|-------------------------------|
//! | `get`               | `Ok(None)`                    |
//! | `get_with_metadata` | both fields `None`            |
//! | `put`               | creates the key               |
//! | `delete`            | no-op, `Ok(())`               |
//! | `list`              | key is skipped                |

use crate::error::StorageResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tag prepended to link slugs by the surrounding application.
pub const LINK_KEY_PREFIX: &str = "link:";

/// Default page size for `list`.
pub const DEFAULT_LIST_LIMIT: usize = 1000;

/// Builds the conventional `link:<slug>` key.
///
/// The storage layer treats keys as opaque; this exists for callers.
pub fn link_key(slug: &str) -> String {
    format!("{LINK_KEY_PREFIX}{slug}")
}

/// How a stored value should be handed back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueType {
    /// The raw stored string.
    #[default]
    Text,
    /// The stored string parsed as JSON. Unparseable payloads read as absent.
    Json,
}

/// A value read back from a namespace.
#[derive(Debug, Clone, PartialEq)]
pub enum KvValue {
    Text(String),
    Json(Value),
}

impl KvValue {
    /// Returns the raw text if this was read as `ValueType::Text`.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Json(_) => None,
        }
    }

    /// Returns the parsed document if this was read as `ValueType::Json`.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(v) => Some(v),
            Self::Text(_) => None,
        }
    }

    /// Consumes the value, keeping the parsed document if it was read as JSON.
    pub fn into_json(self) -> Option<Value> {
        match self {
            Self::Json(v) => Some(v),
            Self::Text(_) => None,
        }
    }
}

/// Result of `get_with_metadata`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValueWithMetadata {
    pub value: Option<KvValue>,
    pub metadata: Option<Value>,
}

/// Options for `put`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PutOptions {
    /// Absolute expiry in epoch seconds.
    pub expiration: Option<i64>,
    /// Relative expiry in seconds, resolved at write time. Takes precedence
    /// over `expiration` when both are set.
    pub expiration_ttl: Option<i64>,
    /// Arbitrary JSON stored beside the value.
    pub metadata: Option<Value>,
}

impl PutOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expiration(mut self, at: i64) -> Self {
        self.expiration = Some(at);
        self
    }

    pub fn expiration_ttl(mut self, seconds: i64) -> Self {
        self.expiration_ttl = Some(seconds);
        self
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Resolves the absolute expiry to store, given the current time.
    pub fn resolve_expiration(&self, now: i64) -> Option<i64> {
        match self.expiration_ttl {
            Some(ttl) => Some(now.saturating_add(ttl)),
            None => self.expiration,
        }
    }
}

/// Options for `list`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Only keys starting with this string. Empty lists everything.
    pub prefix: Option<String>,
    /// Page size. Defaults to [`DEFAULT_LIST_LIMIT`].
    pub limit: Option<usize>,
    /// Continuation token from a previous incomplete page.
    pub cursor: Option<String>,
}

impl ListOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }
}

/// One entry of a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListKey {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration: Option<i64>,
}

/// A page of keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListResult {
    pub keys: Vec<ListKey>,
    pub list_complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// A key-value namespace.
///
/// Implemented by the embedded engine and by whatever the hosting platform
/// binds into the request. Implementations must be thread-safe.
#[async_trait]
pub trait KvNamespace: Send + Sync {
    /// Reads a live value.
    async fn get(&self, key: &str, value_type: ValueType) -> StorageResult<Option<KvValue>>;

    /// Reads a live value together with its metadata.
    async fn get_with_metadata(
        &self,
        key: &str,
        value_type: ValueType,
    ) -> StorageResult<ValueWithMetadata>;

    /// Writes a value, replacing any previous value, expiry and metadata.
    async fn put(&self, key: &str, value: &str, options: PutOptions) -> StorageResult<()>;

    /// Removes a key. Removing a missing key succeeds.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Lists live keys, newest first.
    async fn list(&self, options: ListOptions) -> StorageResult<ListResult>;
}
