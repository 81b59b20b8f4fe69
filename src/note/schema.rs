//! Read-side migration for stored note records.
//!
//! Records written before versioning carry no `schemaVersion` and may miss
//! any field. They are upgraded on every read; nothing is ever rejected.

use serde_json::Value;

use super::{Dimension, NoteRecord, DEFAULT_HEIGHT_PX, DEFAULT_WIDTH_PX, DEFAULT_X, DEFAULT_Y};

pub const SCHEMA_VERSION: u32 = 1;

/// Turn whatever is stored for a note into a current [`NoteRecord`].
pub fn migrate_record(raw: &Value, now: i64) -> NoteRecord {
    let version = raw
        .get("schemaVersion")
        .and_then(Value::as_u64)
        .unwrap_or(0);

    if version >= u64::from(SCHEMA_VERSION) {
        match serde_json::from_value::<NoteRecord>(raw.clone()) {
            Ok(mut record) => {
                record.schema_version = SCHEMA_VERSION;
                return record;
            }
            Err(e) => {
                tracing::warn!("Malformed v{} note record, upgrading field by field: {}", version, e);
            }
        }
    }

    upgrade_v0(raw, now)
}

fn upgrade_v0(raw: &Value, now: i64) -> NoteRecord {
    let created_at = parse_timestamp(raw.get("createdAt")).unwrap_or(now);
    let modified_at = parse_timestamp(raw.get("modifiedAt")).unwrap_or(created_at);

    NoteRecord {
        schema_version: SCHEMA_VERSION,
        x: raw.get("x").and_then(Value::as_f64).unwrap_or(DEFAULT_X),
        y: raw.get("y").and_then(Value::as_f64).unwrap_or(DEFAULT_Y),
        width: dimension(raw.get("width")).unwrap_or_else(|| Dimension::px(DEFAULT_WIDTH_PX)),
        height: dimension(raw.get("height")).unwrap_or_else(|| Dimension::px(DEFAULT_HEIGHT_PX)),
        text: raw
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        collapsed: raw
            .get("collapsed")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        element: string(raw.get("element")),
        element_path: string(raw.get("elementPath")),
        created_at,
        modified_at,
    }
}

fn dimension(value: Option<&Value>) -> Option<Dimension> {
    match value? {
        Value::Number(n) => Some(Dimension::Number(n.clone())),
        Value::String(s) if !s.is_empty() => Some(Dimension::Text(s.clone())),
        _ => None,
    }
}

fn string(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(str::to_string)
}

/// Millisecond timestamps may have been stored as integers or floats.
pub fn parse_timestamp(value: Option<&Value>) -> Option<i64> {
    let value = value?;
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))
        .filter(|t| *t > 0)
}
