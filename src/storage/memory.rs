use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{BackendError, KvBackend, Scope, StoreMap};

/// In-process backend with fault injection, used by tests and dry runs.
#[derive(Default)]
pub struct MemoryBackend {
    scopes: Mutex<HashMap<Scope, StoreMap>>,
    invalidated: AtomicBool,
    failing_writes: AtomicBool,
    failing_reads: AtomicU32,
    failing_scope: Mutex<Option<Scope>>,
    calls: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a scope with initial contents.
    pub fn with_scope(self, scope: Scope, items: StoreMap) -> Self {
        self.lock().insert(scope, items);
        self
    }

    /// Current contents of a scope.
    pub fn snapshot(&self, scope: Scope) -> StoreMap {
        self.lock().get(&scope).cloned().unwrap_or_default()
    }

    /// Make every call report `ContextInvalidated` until [`restore`](Self::restore).
    pub fn invalidate(&self) {
        self.invalidated.store(true, Ordering::SeqCst);
    }

    pub fn restore(&self) {
        self.invalidated.store(false, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.failing_writes.store(fail, Ordering::SeqCst);
    }

    /// Report `NotReady` for the next `count` reads.
    pub fn fail_next_reads(&self, count: u32) {
        self.failing_reads.store(count, Ordering::SeqCst);
    }

    /// Make every read of `scope` fail; `None` clears it.
    pub fn fail_scope(&self, scope: Option<Scope>) {
        *self
            .failing_scope
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = scope;
    }

    /// Number of backend calls of any kind.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of successful `set`/`remove` calls.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Scope, StoreMap>> {
        self.scopes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn enter(&self) -> Result<(), BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.invalidated.load(Ordering::SeqCst) {
            return Err(BackendError::ContextInvalidated);
        }
        Ok(())
    }

    fn enter_write(&self) -> Result<(), BackendError> {
        self.enter()?;
        if self.failing_writes.load(Ordering::SeqCst) {
            return Err(BackendError::Failed("quota exceeded".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl KvBackend for MemoryBackend {
    async fn get(&self, scope: Scope) -> Result<StoreMap, BackendError> {
        self.enter()?;
        let pending = self.failing_reads.load(Ordering::SeqCst);
        if pending > 0 {
            self.failing_reads.store(pending - 1, Ordering::SeqCst);
            return Err(BackendError::NotReady);
        }
        let failing = *self
            .failing_scope
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if failing == Some(scope) {
            return Err(BackendError::Failed(format!("{} scope unreadable", scope)));
        }
        Ok(self.snapshot(scope))
    }

    async fn set(&self, scope: Scope, items: StoreMap) -> Result<(), BackendError> {
        self.enter_write()?;
        let mut scopes = self.lock();
        let target = scopes.entry(scope).or_default();
        for (key, value) in items {
            target.insert(key, value);
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn remove(&self, scope: Scope, keys: &[String]) -> Result<(), BackendError> {
        self.enter_write()?;
        let mut scopes = self.lock();
        if let Some(target) = scopes.get_mut(&scope) {
            for key in keys {
                target.remove(key);
            }
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
