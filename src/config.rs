//! Process-wide settings and synchronizer timing.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::storage::{Scope, StorageAdapter, StoreMap};

pub const DEFAULT_FONT_SIZE: u32 = 12;
pub const MIN_FONT_SIZE: u32 = 8;
pub const MAX_FONT_SIZE: u32 = 32;

const FONT_SIZE_KEY: &str = "fontSize";
const SHOW_TITLE_KEY: &str = "showFirstLineAsTitle";

/// Display settings shared by every page context.
///
/// Stored flat in the sync scope, one key per field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub font_size: u32,
    pub show_first_line_as_title: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            font_size: DEFAULT_FONT_SIZE,
            show_first_line_as_title: true,
        }
    }
}

impl Settings {
    /// Pick the settings keys out of a sync-scope map, defaulting what is missing.
    pub fn from_store(map: &StoreMap) -> Self {
        let defaults = Self::default();
        let font_size = map
            .get(FONT_SIZE_KEY)
            .and_then(Value::as_u64)
            .map(|n| clamp_font_size(u32::try_from(n).unwrap_or(MAX_FONT_SIZE)))
            .unwrap_or(defaults.font_size);
        let show_first_line_as_title = map
            .get(SHOW_TITLE_KEY)
            .and_then(Value::as_bool)
            .unwrap_or(defaults.show_first_line_as_title);

        Self {
            font_size,
            show_first_line_as_title,
        }
    }

    pub fn to_store(&self) -> StoreMap {
        let mut map = StoreMap::new();
        map.insert(FONT_SIZE_KEY.to_string(), Value::from(self.font_size));
        map.insert(
            SHOW_TITLE_KEY.to_string(),
            Value::Bool(self.show_first_line_as_title),
        );
        map
    }

    /// Load from the sync scope; any failure yields the defaults.
    pub async fn load(storage: &StorageAdapter) -> Self {
        match storage.read(Scope::Sync).await {
            Ok(map) => Self::from_store(&map),
            Err(e) => {
                tracing::warn!("Error loading settings, using defaults: {}", e);
                Self::default()
            }
        }
    }

    pub async fn save(&self, storage: &StorageAdapter) -> Result<()> {
        storage.write(Scope::Sync, self.to_store()).await
    }

    /// Out-of-range sizes are pulled to the nearest bound.
    pub fn with_font_size(mut self, font_size: u32) -> Self {
        self.font_size = clamp_font_size(font_size);
        self
    }
}

fn clamp_font_size(font_size: u32) -> u32 {
    font_size.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE)
}

/// Message broadcast from the settings surface to every live page context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum PageMessage {
    UpdateSettings { settings: Settings },
}

/// Timing for the persistence synchronizer and the initial load.
#[derive(Debug, Clone, Copy)]
pub struct SyncConfig {
    /// Quiet period after the last mutation before writing.
    pub debounce: Duration,
    /// Initial-load attempts before giving up for this session.
    pub max_load_attempts: u32,
    /// Backoff unit; attempt `n` waits `retry_step * n`.
    pub retry_step: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            max_load_attempts: 5,
            retry_step: Duration::from_millis(500),
        }
    }
}
