//! Debounced persistence of one page registry.
//!
//! Mutations hand a snapshot of the page to [`Synchronizer::schedule`]. A
//! background task keeps only the newest snapshot and writes it once no new
//! snapshot has arrived for the debounce window, so a burst of drag, resize
//! or typing events becomes a single write. One timer serves the whole page,
//! so edits to different notes coalesce too.
//!
//! Each write is read-merge-write on the full local scope: fetch every page,
//! replace this page's entry, write everything back. Two writers on the same
//! store race and the last full write wins. A session that never managed to
//! load the page sends a merging snapshot instead, which only touches the
//! note ids it knows about.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{PostitError, Result};
use crate::page::{all_pages, replace_page, PageUrl};
use crate::storage::{Scope, StorageAdapter, StoreMap, POSTITS_KEY};

/// What one save writes for the page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageSnapshot {
    /// Every note held in memory, by id.
    pub notes: StoreMap,
    /// Keep stored notes that are not in `notes`.
    pub merge: bool,
    /// Ids to drop from the stored page when merging.
    pub closed: Vec<String>,
}

impl PageSnapshot {
    /// The stored page becomes exactly `notes`.
    pub fn replace(notes: StoreMap) -> Self {
        Self {
            notes,
            ..Self::default()
        }
    }

    /// `notes` are written over the stored page and `closed` are removed
    /// from it; anything else stored for the page stays.
    pub fn merge(notes: StoreMap, closed: Vec<String>) -> Self {
        Self {
            notes,
            merge: true,
            closed,
        }
    }

    fn apply(self, stored: Option<&Value>) -> StoreMap {
        if !self.merge {
            return self.notes;
        }
        let mut page = match stored {
            Some(Value::Object(page)) => page.clone(),
            _ => StoreMap::new(),
        };
        for id in &self.closed {
            page.remove(id);
        }
        page.extend(self.notes);
        page
    }
}

impl From<StoreMap> for PageSnapshot {
    fn from(notes: StoreMap) -> Self {
        Self::replace(notes)
    }
}

enum Command {
    Save { snapshot: PageSnapshot, immediate: bool },
    Flush(oneshot::Sender<()>),
}

/// Handle to the background save loop of one page.
pub struct Synchronizer {
    tx: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl Synchronizer {
    /// Spawn the save loop. Must be called inside a tokio runtime.
    pub fn spawn(storage: Arc<StorageAdapter>, url: PageUrl, debounce: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_loop(storage, url, rx, debounce));
        Self { tx, task }
    }

    /// Queue a debounced save, replacing any queued one.
    pub fn schedule(&self, snapshot: impl Into<PageSnapshot>) {
        self.send(Command::Save {
            snapshot: snapshot.into(),
            immediate: false,
        });
    }

    /// Save without waiting for the debounce window. Any queued debounced
    /// save is superseded.
    pub fn save_now(&self, snapshot: impl Into<PageSnapshot>) {
        self.send(Command::Save {
            snapshot: snapshot.into(),
            immediate: true,
        });
    }

    /// Wait until everything handed over so far has been written (or dropped).
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        self.send(Command::Flush(ack));
        let _ = done.await;
    }

    /// Flush and stop the save loop.
    pub async fn shutdown(self) {
        self.flush().await;
        drop(self.tx);
        if let Err(e) = self.task.await {
            tracing::warn!("Save loop ended abnormally: {}", e);
        }
    }

    fn send(&self, command: Command) {
        if self.tx.send(command).is_err() {
            tracing::warn!("Save loop is gone; dropping save request");
        }
    }
}

async fn run_loop(
    storage: Arc<StorageAdapter>,
    url: PageUrl,
    mut rx: mpsc::UnboundedReceiver<Command>,
    debounce: Duration,
) {
    let mut pending: Option<PageSnapshot> = None;

    loop {
        let command = if pending.is_some() {
            match tokio::time::timeout(debounce, rx.recv()).await {
                Ok(Some(command)) => command,
                Ok(None) => {
                    if let Some(snapshot) = pending.take() {
                        persist(&storage, &url, snapshot).await;
                    }
                    return;
                }
                // quiet period elapsed
                Err(_) => {
                    if let Some(snapshot) = pending.take() {
                        persist(&storage, &url, snapshot).await;
                    }
                    continue;
                }
            }
        } else {
            match rx.recv().await {
                Some(command) => command,
                None => return,
            }
        };

        match command {
            Command::Save {
                snapshot,
                immediate: false,
            } => pending = Some(snapshot),
            Command::Save {
                snapshot,
                immediate: true,
            } => {
                pending = None;
                persist(&storage, &url, snapshot).await;
            }
            Command::Flush(ack) => {
                if let Some(snapshot) = pending.take() {
                    persist(&storage, &url, snapshot).await;
                }
                let _ = ack.send(());
            }
        }
    }
}

/// Write failures are logged and dropped; memory is never rolled back.
async fn persist(storage: &StorageAdapter, url: &PageUrl, snapshot: PageSnapshot) {
    let count = snapshot.notes.len();
    match write_page(storage, url, snapshot).await {
        Ok(()) => tracing::debug!("Saved {} notes for {}", count, url),
        Err(PostitError::StorageUnavailable) => {
            tracing::debug!("Storage unavailable; save for {} skipped", url)
        }
        Err(e) => tracing::warn!("Save error for {}: {}", url, e),
    }
}

/// Read-merge-write of one page's notes into the full local scope.
pub async fn write_page(
    storage: &StorageAdapter,
    url: &PageUrl,
    snapshot: impl Into<PageSnapshot>,
) -> Result<()> {
    let local = storage.read(Scope::Local).await?;
    let mut pages = all_pages(&local);
    let notes = snapshot.into().apply(pages.get(url.as_str()));
    replace_page(&mut pages, url.as_str(), notes);

    let mut items = StoreMap::new();
    items.insert(POSTITS_KEY.to_string(), Value::Object(pages));
    storage.write(Scope::Local, items).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;
    use serde_json::json;

    fn setup() -> (Arc<MemoryBackend>, Arc<StorageAdapter>, PageUrl) {
        let backend = Arc::new(MemoryBackend::new());
        let storage = Arc::new(StorageAdapter::new(backend.clone()));
        let url = PageUrl::parse("https://a.com/page").unwrap();
        (backend, storage, url)
    }

    fn notes(text: &str) -> StoreMap {
        let mut map = StoreMap::new();
        map.insert("note-1".to_string(), json!({ "text": text }));
        map
    }

    fn stored_text(backend: &MemoryBackend) -> Option<Value> {
        backend.snapshot(Scope::Local)["postIts"]["https://a.com/page"]["note-1"]
            .get("text")
            .cloned()
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_coalesces_into_one_write() {
        let (backend, storage, url) = setup();
        let sync = Synchronizer::spawn(storage, url, Duration::from_millis(300));

        for i in 0..10 {
            sync.schedule(notes(&format!("draft {}", i)));
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(backend.write_count(), 0);

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(backend.write_count(), 1);
        assert_eq!(stored_text(&backend), Some(json!("draft 9")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_bursts_write_separately() {
        let (backend, storage, url) = setup();
        let sync = Synchronizer::spawn(storage, url, Duration::from_millis(300));

        sync.schedule(notes("one"));
        tokio::time::sleep(Duration::from_millis(500)).await;
        sync.schedule(notes("two"));
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(backend.write_count(), 2);
        assert_eq!(stored_text(&backend), Some(json!("two")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_now_skips_debounce_and_supersedes_pending() {
        let (backend, storage, url) = setup();
        let sync = Synchronizer::spawn(storage, url, Duration::from_millis(300));

        sync.schedule(notes("stale"));
        sync.save_now(StoreMap::new());
        sync.flush().await;

        assert_eq!(backend.write_count(), 1);
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(backend.write_count(), 1, "superseded save must not fire");

        let local = backend.snapshot(Scope::Local);
        assert_eq!(local["postIts"], json!({}));
    }

    #[tokio::test]
    async fn test_write_keeps_other_pages() {
        let mut local = StoreMap::new();
        local.insert(
            "postIts".to_string(),
            json!({"https://b.com/": {"n": {"text": "other"}}}),
        );
        let backend = Arc::new(MemoryBackend::new().with_scope(Scope::Local, local));
        let storage = StorageAdapter::new(backend.clone());
        let url = PageUrl::parse("https://a.com/page").unwrap();

        write_page(&storage, &url, notes("mine")).await.unwrap();

        let pages = &backend.snapshot(Scope::Local)["postIts"];
        assert_eq!(pages["https://b.com/"]["n"]["text"], json!("other"));
        assert_eq!(pages["https://a.com/page"]["note-1"]["text"], json!("mine"));
    }

    #[tokio::test]
    async fn test_merge_keeps_stored_notes_it_does_not_hold() {
        let mut local = StoreMap::new();
        local.insert(
            "postIts".to_string(),
            json!({"https://a.com/page": {
                "old": {"text": "precious"},
                "gone": {"text": "closed here"}
            }}),
        );
        let backend = Arc::new(MemoryBackend::new().with_scope(Scope::Local, local));
        let storage = StorageAdapter::new(backend.clone());
        let url = PageUrl::parse("https://a.com/page").unwrap();

        let snapshot = PageSnapshot::merge(notes("new"), vec!["gone".to_string()]);
        write_page(&storage, &url, snapshot).await.unwrap();

        let page = &backend.snapshot(Scope::Local)["postIts"]["https://a.com/page"];
        assert_eq!(page["old"]["text"], json!("precious"));
        assert_eq!(page["note-1"]["text"], json!("new"));
        assert!(page.get("gone").is_none());

        let closed = vec!["old".to_string(), "note-1".to_string()];
        let snapshot = PageSnapshot::merge(StoreMap::new(), closed);
        write_page(&storage, &url, snapshot).await.unwrap();
        assert_eq!(backend.snapshot(Scope::Local)["postIts"], json!({}));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_write_is_dropped() {
        let (backend, storage, url) = setup();
        let sync = Synchronizer::spawn(storage, url, Duration::from_millis(300));

        backend.fail_writes(true);
        sync.schedule(notes("lost"));
        sync.flush().await;
        assert_eq!(backend.write_count(), 0);

        backend.fail_writes(false);
        sync.schedule(notes("kept"));
        sync.flush().await;
        assert_eq!(backend.write_count(), 1);
        assert_eq!(stored_text(&backend), Some(json!("kept")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_flushes_pending() {
        let (backend, storage, url) = setup();
        let sync = Synchronizer::spawn(storage, url, Duration::from_millis(300));

        sync.schedule(notes("last words"));
        sync.shutdown().await;

        assert_eq!(backend.write_count(), 1);
        assert_eq!(stored_text(&backend), Some(json!("last words")));
    }
}
