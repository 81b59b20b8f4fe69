//! A single sticky note: its persisted record, its geometry and the
//! drag/resize interaction driving it.

mod element;
mod id;
mod interaction;
mod schema;

pub use element::{element_path, ElementInfo};
pub use id::{NoteId, NoteIdGenerator};
pub use interaction::{Interaction, NotePart, Point, Rect, RESIZE_HANDLE_SIZE};
pub use schema::{migrate_record, parse_timestamp, SCHEMA_VERSION};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::Settings;

pub const DEFAULT_X: f64 = 10.0;
pub const DEFAULT_Y: f64 = 10.0;
pub const DEFAULT_WIDTH_PX: f64 = 200.0;
pub const DEFAULT_HEIGHT_PX: f64 = 100.0;

pub const EXPANDED_GLYPH: char = '▼';
pub const COLLAPSED_GLYPH: char = '▶';

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A width or height exactly as the page stored it: either a CSS length
/// string such as `"200px"` or a bare number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Dimension {
    Number(serde_json::Number),
    Text(String),
}

impl Dimension {
    /// A pixel length in the `"<n>px"` form.
    pub fn px(value: f64) -> Self {
        Dimension::Text(format!("{}px", value))
    }

    /// Pixel value, if the stored form can be read as one.
    pub fn as_pixels(&self) -> Option<f64> {
        match self {
            Dimension::Number(n) => n.as_f64(),
            Dimension::Text(s) => {
                let trimmed = s.trim();
                trimmed
                    .strip_suffix("px")
                    .unwrap_or(trimmed)
                    .trim()
                    .parse()
                    .ok()
            }
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dimension::Number(n) => write!(f, "{}", n),
            Dimension::Text(s) => f.write_str(s),
        }
    }
}

/// The persisted shape of one note, as stored under its page URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteRecord {
    pub schema_version: u32,
    pub x: f64,
    pub y: f64,
    pub width: Dimension,
    pub height: Dimension,
    pub text: String,
    pub collapsed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_path: Option<String>,
    pub created_at: i64,
    pub modified_at: i64,
}

impl NoteRecord {
    pub fn new(x: f64, y: f64, now: i64) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            x,
            y,
            width: Dimension::px(DEFAULT_WIDTH_PX),
            height: Dimension::px(DEFAULT_HEIGHT_PX),
            text: String::new(),
            collapsed: false,
            element: None,
            element_path: None,
            created_at: now,
            modified_at: now,
        }
    }
}

/// Text up to the first `\n`, without a trailing `\r`. Every title is cut
/// from this.
pub fn first_line(text: &str) -> &str {
    let line = text.split('\n').next().unwrap_or_default();
    line.strip_suffix('\r').unwrap_or(line)
}

/// Title shown in a note's header bar.
pub fn derive_title(text: &str, settings: &Settings) -> String {
    if !settings.show_first_line_as_title {
        return "Note".to_string();
    }
    match first_line(text) {
        "" => "New Note".to_string(),
        line => line.to_string(),
    }
}

/// A live note on the current page.
#[derive(Debug, Clone)]
pub struct Note {
    id: NoteId,
    record: NoteRecord,
    interaction: Interaction,
}

impl Note {
    pub fn new(id: NoteId, record: NoteRecord) -> Self {
        Self {
            id,
            record,
            interaction: Interaction::Idle,
        }
    }

    pub fn id(&self) -> &NoteId {
        &self.id
    }

    pub fn record(&self) -> &NoteRecord {
        &self.record
    }

    pub fn interaction(&self) -> &Interaction {
        &self.interaction
    }

    pub fn position(&self) -> Point {
        Point::new(self.record.x, self.record.y)
    }

    /// Document-relative box, falling back to the default size when the
    /// stored dimensions are not pixel lengths.
    pub fn bounds(&self) -> Rect {
        Rect {
            x: self.record.x,
            y: self.record.y,
            width: self.record.width.as_pixels().unwrap_or(DEFAULT_WIDTH_PX),
            height: self.record.height.as_pixels().unwrap_or(DEFAULT_HEIGHT_PX),
        }
    }

    pub fn title(&self, settings: &Settings) -> String {
        derive_title(&self.record.text, settings)
    }

    pub fn glyph(&self) -> char {
        if self.record.collapsed {
            COLLAPSED_GLYPH
        } else {
            EXPANDED_GLYPH
        }
    }

    /// Returns true when a drag or resize started.
    pub fn pointer_down(&mut self, pointer: Point, part: NotePart) -> bool {
        let bounds = self.bounds();
        self.interaction.begin(pointer, bounds, part)
    }

    /// Follow the pointer while dragging. Returns true when the note moved.
    pub fn pointer_move(&mut self, pointer: Point, now: i64) -> bool {
        match self.interaction.drag_target(pointer) {
            Some(target) if target != self.position() => {
                self.move_to(target, now);
                true
            }
            _ => false,
        }
    }

    pub fn pointer_up(&mut self) {
        self.interaction.end();
    }

    /// Size-change notification from the rendering layer.
    ///
    /// Only changes observed during an interaction are taken; the rest come
    /// from page layout, not the user.
    pub fn observe_size(&mut self, width: Dimension, height: Dimension, now: i64) -> bool {
        if self.interaction.is_idle() {
            return false;
        }
        if width == self.record.width && height == self.record.height {
            return false;
        }
        self.resize(width, height, now);
        true
    }

    pub fn move_to(&mut self, to: Point, now: i64) {
        self.record.x = to.x;
        self.record.y = to.y;
        self.record.modified_at = now;
    }

    pub fn resize(&mut self, width: Dimension, height: Dimension, now: i64) {
        self.record.width = width;
        self.record.height = height;
        self.record.modified_at = now;
    }

    pub fn set_text(&mut self, text: String, now: i64) {
        self.record.text = text;
        self.record.modified_at = now;
    }

    /// Flip the collapsed flag and return the new value.
    pub fn toggle_collapsed(&mut self, now: i64) -> bool {
        self.record.collapsed = !self.record.collapsed;
        self.record.modified_at = now;
        self.record.collapsed
    }

    pub(crate) fn set_provenance(&mut self, element: Option<String>, path: Option<String>) {
        self.record.element = element;
        self.record.element_path = path;
    }
}
