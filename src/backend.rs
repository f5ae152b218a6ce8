//! Backend Selection
//!
//! Picks the key/value namespace for one request. A hosting platform may
//! attach its own namespace to the request environment under the `KV`
//! binding; when it does, that namespace is used as-is. Otherwise requests
//! fall back to the embedded SQLite engine.
//!
//! ```text
//!   RequestContext
//!        │
//!        ▼
//!   platform env? ── no ──────────────┐
//!        │ yes                        │
//!        ▼                            ▼
//!   binding "KV" is Kv? ── no ──> SharedStorage::engine()
//!        │ yes                        │
//!        ▼                            ▼
//!   platform namespace          embedded KvEngine
//! ```
//!
//! Failing to find a usable binding is the normal fallback trigger and is
//! never an error. The only error `select` can return comes from opening
//! the embedded database on first use.

use crate::error::StorageResult;
use crate::kv::KvNamespace;
use crate::store::SharedStorage;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Name under which the platform exposes its namespace.
pub const KV_BINDING: &str = "KV";

/// Something the platform bound into the request environment.
#[derive(Clone)]
pub enum Binding {
    /// A key/value namespace.
    Kv(Arc<dyn KvNamespace>),
    /// A plain variable.
    Var(String),
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kv(_) => f.write_str("Kv(..)"),
            Self::Var(v) => f.debug_tuple("Var").field(v).finish(),
        }
    }
}

/// Environment the hosting platform attaches to a request.
#[derive(Debug, Clone, Default)]
pub struct PlatformEnv {
    bindings: HashMap<String, Binding>,
}

impl PlatformEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_binding(mut self, name: impl Into<String>, binding: Binding) -> Self {
        self.bindings.insert(name.into(), binding);
        self
    }

    pub fn binding(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }
}

/// Per-request context handed to the selector.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    platform: Option<PlatformEnv>,
}

impl RequestContext {
    /// A context with no platform environment (self-hosted).
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_platform(platform: PlatformEnv) -> Self {
        Self {
            platform: Some(platform),
        }
    }

    pub fn platform(&self) -> Option<&PlatformEnv> {
        self.platform.as_ref()
    }
}

/// Which backend served a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Platform,
    Embedded,
}

/// Chooses between the platform namespace and the embedded engine.
#[derive(Debug, Clone)]
pub struct BackendSelector {
    storage: SharedStorage,
}

impl BackendSelector {
    pub fn new(storage: SharedStorage) -> Self {
        Self { storage }
    }

    /// The embedded storage used for fallback.
    pub fn storage(&self) -> &SharedStorage {
        &self.storage
    }

    /// Looks for a usable platform namespace. Never fails.
    pub fn discover(ctx: &RequestContext) -> Option<Arc<dyn KvNamespace>> {
        let platform = ctx.platform()?;

        match platform.binding(KV_BINDING) {
            Some(Binding::Kv(ns)) => Some(Arc::clone(ns)),
            Some(other) => {
                debug!(binding = KV_BINDING, ?other, "Binding is not a KV namespace, ignoring");
                None
            }
            None => None,
        }
    }

    /// Returns the namespace for this request.
    pub async fn select(&self, ctx: &RequestContext) -> StorageResult<Arc<dyn KvNamespace>> {
        self.select_with_kind(ctx).await.map(|(_, ns)| ns)
    }

    /// Like [`select`](Self::select), also reporting which backend was chosen.
    pub async fn select_with_kind(
        &self,
        ctx: &RequestContext,
    ) -> StorageResult<(BackendKind, Arc<dyn KvNamespace>)> {
        if let Some(ns) = Self::discover(ctx) {
            debug!("Using platform KV namespace");
            return Ok((BackendKind::Platform, ns));
        }

        debug!("Using embedded SQLite storage");
        let engine: Arc<dyn KvNamespace> = self.storage.engine().await?;
        Ok((BackendKind::Embedded, engine))
    }
}
