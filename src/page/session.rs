use std::sync::Arc;

use super::{all_pages, PageRegistry, PageUrl};
use crate::config::{PageMessage, Settings, SyncConfig};
use crate::error::Result;
use crate::note::{now_millis, Dimension, ElementInfo, Note, NoteId, NotePart, Point};
use crate::storage::{Scope, StorageAdapter};
use crate::sync::{PageSnapshot, Synchronizer};

/// Which key acts as the note-creation modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Cmd
    Mac,
    /// Ctrl
    Other,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Platform::Mac
        } else {
            Platform::Other
        }
    }

    pub fn modifier_held(&self, modifiers: Modifiers) -> bool {
        match self {
            Platform::Mac => modifiers.meta,
            Platform::Other => modifiers.ctrl,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Auxiliary,
    Secondary,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub ctrl: bool,
    pub meta: bool,
}

/// What the pointer was over.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// Page content outside any note.
    Page(Option<ElementInfo>),
    Note { id: NoteId, part: NotePart },
}

/// A pointer event in document coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct PointerEvent {
    pub position: Point,
    pub button: PointerButton,
    pub modifiers: Modifiers,
    pub target: Target,
}

/// Everything a live page context owns: its registry, the settings it
/// renders with, and the save loop. Pointer-move and pointer-up are
/// page-wide and fan out to every note.
///
/// Until the stored notes for the page have been loaded, saves merge into
/// the stored page by note id instead of replacing it, so notes this session
/// never saw are kept.
pub struct PageSession {
    registry: PageRegistry,
    hydrated: bool,
    closed: Vec<String>,
    settings: Settings,
    platform: Platform,
    storage: Arc<StorageAdapter>,
    sync: Synchronizer,
    config: SyncConfig,
}

impl PageSession {
    /// Start a session for `url`. Spawns the save loop, so this must run
    /// inside a tokio runtime.
    pub fn open(url: PageUrl, storage: Arc<StorageAdapter>, config: SyncConfig) -> Self {
        let sync = Synchronizer::spawn(storage.clone(), url.clone(), config.debounce);
        Self {
            registry: PageRegistry::new(url),
            hydrated: false,
            closed: Vec::new(),
            settings: Settings::default(),
            platform: Platform::current(),
            storage,
            sync,
            config,
        }
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Fetch this page's notes, retrying with backoff, then the settings.
    /// On failure the page keeps working with no saved notes.
    pub async fn load(&mut self) -> Result<usize> {
        tracing::info!("Loading notes for: {}", self.registry.url());

        let local = self
            .storage
            .read_with_retry(
                Scope::Local,
                self.config.max_load_attempts,
                self.config.retry_step,
            )
            .await;
        // read once the store has answered, so settings share the retry
        self.settings = Settings::load(&self.storage).await;
        let local = local?;

        let pages = all_pages(&local);
        let count = self
            .registry
            .hydrate(pages.get(self.registry.url().as_str()), now_millis());
        self.hydrated = true;
        self.closed.clear();
        tracing::debug!("Displaying {} notes", count);
        Ok(count)
    }

    /// Whether the stored notes for this page were loaded.
    pub fn is_hydrated(&self) -> bool {
        self.hydrated
    }

    pub fn url(&self) -> &PageUrl {
        self.registry.url()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn registry(&self) -> &PageRegistry {
        &self.registry
    }

    pub fn notes(&self) -> impl Iterator<Item = &Note> {
        self.registry.notes()
    }

    pub fn note(&self, id: &NoteId) -> Option<&Note> {
        self.registry.get(id)
    }

    pub fn title(&self, id: &NoteId) -> Option<String> {
        self.registry.get(id).map(|n| n.title(&self.settings))
    }

    /// Start a drag or resize when a note body is pressed, with any button.
    pub fn pointer_down(&mut self, event: &PointerEvent) -> bool {
        match &event.target {
            Target::Note { id, part } => match self.registry.note_mut(id) {
                Ok(note) => note.pointer_down(event.position, *part),
                Err(_) => false,
            },
            Target::Page(_) => false,
        }
    }

    /// Page-wide pointer-move: every dragging note follows the pointer.
    pub fn pointer_move(&mut self, position: Point) {
        let now = now_millis();
        let mut moved = false;
        for note in self.registry.notes_mut() {
            moved |= note.pointer_move(position, now);
        }
        if moved {
            self.schedule_save();
        }
    }

    /// Page-wide pointer-up: ends every interaction, then checks for the
    /// create gesture (secondary button + platform modifier, off any note).
    pub fn pointer_up(&mut self, event: &PointerEvent) -> Option<NoteId> {
        for note in self.registry.notes_mut() {
            note.pointer_up();
        }

        if event.button != PointerButton::Secondary || !self.platform.modifier_held(event.modifiers) {
            return None;
        }
        match &event.target {
            Target::Note { .. } => None,
            Target::Page(element) => Some(self.create_note(event.position, element.as_ref())),
        }
    }

    /// The native context menu is suppressed only while the modifier is held.
    pub fn suppress_context_menu(&self, modifiers: Modifiers) -> bool {
        self.platform.modifier_held(modifiers)
    }

    pub fn create_note(&mut self, at: Point, element: Option<&ElementInfo>) -> NoteId {
        let id = self.registry.create(at, element, now_millis());
        self.schedule_save();
        id
    }

    pub fn edit_text(&mut self, id: &NoteId, text: impl Into<String>) -> Result<()> {
        self.registry.edit_text(id, text.into(), now_millis())?;
        self.schedule_save();
        Ok(())
    }

    pub fn move_note(&mut self, id: &NoteId, to: Point) -> Result<()> {
        self.registry.move_note(id, to, now_millis())?;
        self.schedule_save();
        Ok(())
    }

    pub fn resize_note(&mut self, id: &NoteId, width: Dimension, height: Dimension) -> Result<()> {
        self.registry.resize(id, width, height, now_millis())?;
        self.schedule_save();
        Ok(())
    }

    /// Size-change notification from the rendering layer.
    pub fn observe_resize(&mut self, id: &NoteId, width: Dimension, height: Dimension) -> Result<bool> {
        let changed = self
            .registry
            .note_mut(id)?
            .observe_size(width, height, now_millis());
        if changed {
            self.schedule_save();
        }
        Ok(changed)
    }

    pub fn toggle_collapse(&mut self, id: &NoteId) -> Result<bool> {
        let collapsed = self.registry.toggle_collapsed(id, now_millis())?;
        self.schedule_save();
        Ok(collapsed)
    }

    /// Close button: drop the note now and save without debouncing.
    /// Closing an absent note does nothing.
    pub fn close_note(&mut self, id: &NoteId) -> bool {
        if !self.registry.delete(id) {
            return false;
        }
        if !self.hydrated {
            self.closed.push(id.to_string());
        }
        self.sync.save_now(self.snapshot());
        true
    }

    pub fn handle_message(&mut self, message: PageMessage) {
        match message {
            PageMessage::UpdateSettings { settings } => {
                tracing::debug!("Applying settings update: {:?}", settings);
                self.settings = settings;
            }
        }
    }

    /// Wait for queued saves to reach storage.
    pub async fn flush(&self) {
        self.sync.flush().await;
    }

    /// Tear the page context down, writing anything still queued.
    pub async fn close(self) {
        self.sync.shutdown().await;
    }

    fn schedule_save(&self) {
        self.sync.schedule(self.snapshot());
    }

    fn snapshot(&self) -> PageSnapshot {
        if self.hydrated {
            PageSnapshot::replace(self.registry.to_store())
        } else {
            PageSnapshot::merge(self.registry.to_store(), self.closed.clone())
        }
    }
}
