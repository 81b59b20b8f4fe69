use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a note within its page registry, e.g. `note-1718000000000`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NoteId {
    fn from(s: &str) -> Self {
        NoteId(s.to_string())
    }
}

impl From<String> for NoteId {
    fn from(s: String) -> Self {
        NoteId(s)
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hands out `note-<millis>` ids, suffixing `-<n>` when several notes are
/// created in the same millisecond (or the clock steps backwards).
#[derive(Debug, Default)]
pub struct NoteIdGenerator {
    last_millis: Option<i64>,
    repeats: u32,
}

impl NoteIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self, now_millis: i64) -> NoteId {
        match self.last_millis {
            Some(last) if now_millis <= last => {
                self.repeats += 1;
                NoteId(format!("note-{}-{}", last, self.repeats))
            }
            _ => {
                self.last_millis = Some(now_millis);
                self.repeats = 0;
                NoteId(format!("note-{}", now_millis))
            }
        }
    }
}
