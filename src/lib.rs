//! # SinkKV - Managed-KV Compatible Storage on Embedded SQLite
//!
//! SinkKV lets code written against a managed, distributed key-value API run
//! unchanged on a self-hosted deployment. It stores link records and their
//! access log in a single SQLite file and falls back to it whenever the
//! hosting platform does not provide its own namespace.
//!
//! ## Features
//!
//! - **Managed-KV Semantics**: get, get-with-metadata, put with TTL, delete, prefix list
//! - **Metadata Sidecar**: arbitrary JSON stored beside each value
//! - **TTL Support**: absolute or relative expiry, honoured on every read
//! - **Backend Fallback**: platform namespace when bound, embedded engine otherwise
//! - **Access Log**: append-only per-link access history
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                               SinkKV                                    │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────────┐    ┌──────────────────────┐     │
//! │  │  Request    │───>│ BackendSelector │───>│ platform KvNamespace │     │
//! │  │  Context    │    └────────┬────────┘    └──────────────────────┘     │
//! │  └─────────────┘             │ fallback                                 │
//! │                              ▼                                          │
//! │                     ┌─────────────────┐                                 │
//! │                     │  SharedStorage  │  (lazy, once per process)       │
//! │                     └────────┬────────┘                                 │
//! │                              ▼                                          │
//! │  ┌──────────────┐   ┌─────────────────┐   ┌──────────────────────┐      │
//! │  │ AccessLogger │──>│ Database        │<──│ KvEngine             │      │
//! │  └──────────────┘   │ (SQLite, 1 conn)│   └──────────────────────┘      │
//! │                     └─────────────────┘                                 │
//! │                              ▲                                          │
//! │                     ┌────────┴────────┐                                 │
//! │                     │  ExpiryReaper   │  (service mode only)            │
//! │                     └─────────────────┘                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use sinkkv::backend::{BackendSelector, RequestContext};
//! use sinkkv::kv::{link_key, ValueType};
//! use sinkkv::SharedStorage;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let storage = SharedStorage::from_env();
//!     let _reaper = storage.spawn_reaper().await?;
//!     let selector = BackendSelector::new(storage);
//!
//!     // For each request...
//!     let kv = selector.select(&RequestContext::new()).await?;
//!     let link = kv.get_with_metadata(&link_key("abc"), ValueType::Json).await?;
//!     println!("{:?}", link.value);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`kv`]: The capability trait and its option/result types
//! - [`storage`]: SQLite engine, access logger, schema and reaper
//! - [`store`]: Process-wide lazily-opened storage handle
//! - [`backend`]: Per-request backend selection
//! - [`config`]: Environment-driven configuration
//! - [`error`]: Error types

pub mod backend;
pub mod config;
pub mod error;
pub mod kv;
pub mod storage;
pub mod store;

// Re-export commonly used types for convenience
pub use backend::{BackendKind, BackendSelector, Binding, PlatformEnv, RequestContext};
pub use config::{RunMode, StorageConfig};
pub use error::{StorageError, StorageResult};
pub use kv::{KvNamespace, KvValue, ListOptions, ListResult, PutOptions, ValueType};
pub use storage::{AccessEvent, AccessLogger, ExpiryReaper, KvEngine};
pub use store::SharedStorage;

/// Version of SinkKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
