//! Storage Module
//!
//! The embedded backend: one SQLite file holding link records and the
//! access log, plus the background reaper that trims expired rows.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Database                             │
//! │            Arc<Mutex<rusqlite::Connection>>                 │
//! │        ┌──────────────┐        ┌──────────────┐             │
//! │        │    links     │        │  analytics   │             │
//! │        └──────────────┘        └──────────────┘             │
//! └─────────────────────────────────────────────────────────────┘
//!        ▲                 ▲                    ▲
//!        │                 │                    │
//! ┌──────┴──────┐   ┌──────┴───────┐   ┌────────┴────────┐
//! │  KvEngine   │   │ AccessLogger │   │  ExpiryReaper   │
//! │ get/put/... │   │ log / read   │   │ (Tokio task)    │
//! └─────────────┘   └──────────────┘   └─────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Managed-KV semantics**: get, get-with-metadata, put with TTL, delete, prefix list
//! - **Lazy Expiry**: Expired rows are invisible to every read
//! - **Active Expiry**: The reaper deletes them in one statement per cycle
//! - **Best-effort JSON**: Malformed payloads and metadata read as absent
//!
//! ## Example
//!
//! ```
//! use sinkkv::storage::{Database, KvEngine};
//! use sinkkv::kv::{KvValue, PutOptions, ValueType};
//! use serde_json::json;
//!
//! let engine = KvEngine::new(Database::open_in_memory().unwrap());
//!
//! // Basic operations
//! engine.put("link:abc", "payload", &PutOptions::new()).unwrap();
//! let value = engine.get("link:abc", ValueType::Text).unwrap();
//! assert_eq!(value, Some(KvValue::Text("payload".into())));
//!
//! // Put with TTL and metadata
//! engine.put(
//!     "session",
//!     "token123",
//!     &PutOptions::new().expiration_ttl(3600).metadata(json!({"user": 1})),
//! ).unwrap();
//! ```

pub mod analytics;
pub mod database;
pub mod engine;
pub mod expiry;
pub mod json;
pub mod schema;

// Re-export commonly used types
pub use analytics::{AccessEvent, AccessLogger, AccessRecord, DEFAULT_ANALYTICS_LIMIT};
pub use database::{unix_now, Database};
pub use engine::{EngineStats, KvEngine};
pub use expiry::{ExpiryReaper, ReaperConfig};
pub use schema::ensure_schema;
