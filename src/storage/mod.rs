//! Storage adapter over an external asynchronous key-value store.
//!
//! The store is split into two scopes: `local` (large, per install) and
//! `sync` (small, replicated across devices). Backends only move maps in
//! and out; [`StorageAdapter`] adds the session-wide availability sentinel
//! and the bounded retry used for the initial page load.

mod json_file;
mod memory;

pub use json_file::{JsonFileBackend, POSTIT_DIR};
pub use memory::MemoryBackend;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::{PostitError, Result};

/// Top-level mapping held by one scope.
pub type StoreMap = Map<String, Value>;

/// Key under which the local scope keeps every page registry.
pub const POSTITS_KEY: &str = "postIts";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Local,
    Sync,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Local => "local",
            Scope::Sync => "sync",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by a backend, before classification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The hosting runtime was reloaded or removed while the session lives on.
    #[error("context invalidated")]
    ContextInvalidated,

    /// The backend has not finished starting up.
    #[error("storage not ready")]
    NotReady,

    #[error("{0}")]
    Failed(String),
}

/// An asynchronous key-value store with two scopes.
///
/// `set` merges the given top-level keys into the scope and leaves other
/// keys untouched.
#[async_trait]
pub trait KvBackend: Send + Sync {
    async fn get(&self, scope: Scope) -> std::result::Result<StoreMap, BackendError>;

    async fn set(&self, scope: Scope, items: StoreMap) -> std::result::Result<(), BackendError>;

    async fn remove(&self, scope: Scope, keys: &[String])
        -> std::result::Result<(), BackendError>;
}

/// Shared handle to a backend plus the per-session `unavailable` flag.
pub struct StorageAdapter {
    backend: Arc<dyn KvBackend>,
    unavailable: AtomicBool,
}

impl StorageAdapter {
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self {
            backend,
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn is_available(&self) -> bool {
        !self.unavailable.load(Ordering::SeqCst)
    }

    /// Read a whole scope.
    pub async fn read(&self, scope: Scope) -> Result<StoreMap> {
        self.ensure_available()?;
        self.backend
            .get(scope)
            .await
            .map_err(|e| self.classify(scope, e))
    }

    /// Merge `items` into a scope.
    pub async fn write(&self, scope: Scope, items: StoreMap) -> Result<()> {
        self.ensure_available()?;
        self.backend
            .set(scope, items)
            .await
            .map_err(|e| self.classify(scope, e))
    }

    pub async fn remove(&self, scope: Scope, keys: &[String]) -> Result<()> {
        self.ensure_available()?;
        self.backend
            .remove(scope, keys)
            .await
            .map_err(|e| self.classify(scope, e))
    }

    /// Read a scope, retrying transient failures with linear backoff.
    ///
    /// Attempt `n` that fails waits `step * n` before the next one. Gives up
    /// after `max_attempts`, or at once when the store is gone for good.
    pub async fn read_with_retry(
        &self,
        scope: Scope,
        max_attempts: u32,
        step: Duration,
    ) -> Result<StoreMap> {
        let mut attempt = 1;
        loop {
            match self.read(scope).await {
                Ok(map) => return Ok(map),
                Err(PostitError::StorageUnavailable) => {
                    return Err(PostitError::StorageUnavailable)
                }
                Err(e) if attempt >= max_attempts => {
                    tracing::warn!(
                        "Giving up on {} storage after {} attempts: {}",
                        scope,
                        attempt,
                        e
                    );
                    return Err(e);
                }
                Err(e) => {
                    let backoff = step * attempt;
                    tracing::debug!(
                        "Storage read attempt {} failed ({}), retrying in {:?}",
                        attempt,
                        e,
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }

    fn ensure_available(&self) -> Result<()> {
        if self.is_available() {
            Ok(())
        } else {
            Err(PostitError::StorageUnavailable)
        }
    }

    fn classify(&self, scope: Scope, err: BackendError) -> PostitError {
        match err {
            BackendError::ContextInvalidated => {
                if !self.unavailable.swap(true, Ordering::SeqCst) {
                    tracing::error!(
                        "Storage context invalidated during {} access; persistence disabled",
                        scope
                    );
                }
                PostitError::StorageUnavailable
            }
            BackendError::NotReady => {
                PostitError::StorageOpFailed(format!("{} storage not ready", scope))
            }
            BackendError::Failed(msg) => PostitError::StorageOpFailed(msg),
        }
    }
}
