//! Cross-site view of every stored note.
//!
//! Reads both storage scopes independently of any page session, flattens
//! them into [`NormalizedNote`]s and deletes from the right nested location.

mod display;
mod view;

pub use display::{display_label, preview, remove_query_parameters, split_url};
pub use view::{AgeFilter, DomainGroup, NotesView, SortOrder, Stats};

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::note::{first_line, migrate_record, parse_timestamp};
use crate::page::{all_pages, remove_from_page};
use crate::storage::{Scope, StorageAdapter, StoreMap, POSTITS_KEY};

/// Prefix of individually synced note keys in the sync scope.
pub const SYNC_NOTE_PREFIX: &str = "note_";

const TITLE_MAX_CHARS: usize = 50;
const TITLE_CUT_CHARS: usize = 47;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteSource {
    Local,
    Sync,
}

impl fmt::Display for NoteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoteSource::Local => f.write_str("local"),
            NoteSource::Sync => f.write_str("sync"),
        }
    }
}

/// One note as the management view sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedNote {
    pub id: String,
    pub title: String,
    pub content: String,
    pub url: String,
    pub created_at: i64,
    pub modified_at: i64,
    pub source: NoteSource,
}

/// Title for the list view: first line, trimmed and shortened.
pub fn extract_title(text: &str) -> String {
    let line = first_line(text).trim();
    if line.is_empty() {
        return "Untitled Note".to_string();
    }
    if line.chars().count() > TITLE_MAX_CHARS {
        let cut: String = line.chars().take(TITLE_CUT_CHARS).collect();
        return format!("{}...", cut);
    }
    line.to_string()
}

/// Flatten both scopes, newest first. A scope that could not be read is
/// passed as `None` and simply contributes nothing.
pub fn collect_notes(local: Option<&StoreMap>, sync: Option<&StoreMap>, now: i64) -> Vec<NormalizedNote> {
    let mut notes = Vec::new();

    if let Some(local) = local {
        for (url, page) in all_pages(local) {
            let Value::Object(entries) = page else {
                continue;
            };
            for (id, raw) in entries {
                let record = migrate_record(&raw, now);
                notes.push(NormalizedNote {
                    id,
                    title: extract_title(&record.text),
                    content: record.text,
                    url: url.clone(),
                    created_at: record.created_at,
                    modified_at: record.modified_at,
                    source: NoteSource::Local,
                });
            }
        }
    }

    if let Some(sync) = sync {
        for (key, value) in sync {
            if !key.starts_with(SYNC_NOTE_PREFIX) || !value.is_object() {
                continue;
            }
            let content = value
                .get("content")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let url = value
                .get("url")
                .and_then(Value::as_str)
                .unwrap_or("Unknown")
                .to_string();

            // the same note may live in both scopes
            if notes.iter().any(|n| n.content == content && n.url == url) {
                continue;
            }

            let title = value
                .get("title")
                .and_then(Value::as_str)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| extract_title(&content));
            let created_at = parse_timestamp(value.get("createdAt")).unwrap_or(now);
            let modified_at =
                parse_timestamp(value.get("modifiedAt")).unwrap_or(created_at);

            notes.push(NormalizedNote {
                id: key.clone(),
                title,
                content,
                url,
                created_at,
                modified_at,
                source: NoteSource::Sync,
            });
        }
    }

    notes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    notes
}

/// Read both scopes concurrently and build the full note list.
pub async fn load_all(storage: &StorageAdapter, now: i64) -> Vec<NormalizedNote> {
    let (local, sync) = tokio::join!(storage.read(Scope::Local), storage.read(Scope::Sync));

    let local = local
        .map_err(|e| tracing::warn!("Error loading local notes: {}", e))
        .ok();
    let sync = sync
        .map_err(|e| tracing::warn!("Error loading synced notes: {}", e))
        .ok();

    collect_notes(local.as_ref(), sync.as_ref(), now)
}

/// Remove a note from the scope it came from. Local notes are removed from
/// their page entry, and the page entry goes when it empties.
///
/// Returns false when the note was already gone.
pub async fn delete_note(storage: &StorageAdapter, note: &NormalizedNote) -> Result<bool> {
    match note.source {
        NoteSource::Sync => {
            let sync = storage.read(Scope::Sync).await?;
            if !sync.contains_key(&note.id) {
                return Ok(false);
            }
            storage.remove(Scope::Sync, &[note.id.clone()]).await?;
            Ok(true)
        }
        NoteSource::Local => {
            let local = storage.read(Scope::Local).await?;
            let mut pages = all_pages(&local);
            if !remove_from_page(&mut pages, &note.url, &note.id) {
                return Ok(false);
            }
            let mut items = StoreMap::new();
            items.insert(POSTITS_KEY.to_string(), Value::Object(pages));
            storage.write(Scope::Local, items).await?;
            Ok(true)
        }
    }
}
