use std::collections::BTreeMap;

use serde_json::Value;

use super::PageUrl;
use crate::error::{PostitError, Result};
use crate::note::{
    element_path, migrate_record, Dimension, ElementInfo, Note, NoteId, NoteIdGenerator,
    NoteRecord, Point,
};
use crate::storage::{StoreMap, POSTITS_KEY};

/// In-memory notes of one page, keyed by note id.
#[derive(Debug)]
pub struct PageRegistry {
    url: PageUrl,
    notes: BTreeMap<NoteId, Note>,
    ids: NoteIdGenerator,
}

impl PageRegistry {
    pub fn new(url: PageUrl) -> Self {
        Self {
            url,
            notes: BTreeMap::new(),
            ids: NoteIdGenerator::new(),
        }
    }

    pub fn url(&self) -> &PageUrl {
        &self.url
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn get(&self, id: &NoteId) -> Option<&Note> {
        self.notes.get(id)
    }

    pub fn notes(&self) -> impl Iterator<Item = &Note> {
        self.notes.values()
    }

    pub(crate) fn notes_mut(&mut self) -> impl Iterator<Item = &mut Note> {
        self.notes.values_mut()
    }

    pub(crate) fn note_mut(&mut self, id: &NoteId) -> Result<&mut Note> {
        self.notes
            .get_mut(id)
            .ok_or_else(|| PostitError::NoteNotFound(id.to_string()))
    }

    /// Replace the registry contents with what storage holds for this page.
    ///
    /// Anything already present is dropped first, so reloading never doubles
    /// notes up.
    pub fn hydrate(&mut self, stored: Option<&Value>, now: i64) -> usize {
        self.notes.clear();

        let Some(Value::Object(entries)) = stored else {
            return 0;
        };

        for (id, raw) in entries {
            let record = migrate_record(raw, now);
            let id = NoteId::from(id.as_str());
            self.notes.insert(id.clone(), Note::new(id, record));
        }
        self.notes.len()
    }

    /// Create a note with its origin at `at`.
    pub fn create(&mut self, at: Point, element: Option<&ElementInfo>, now: i64) -> NoteId {
        let mut id = self.ids.next(now);
        while self.notes.contains_key(&id) {
            id = self.ids.next(now);
        }

        let mut note = Note::new(id.clone(), NoteRecord::new(at.x, at.y, now));
        if let Some(element) = element {
            note.set_provenance(Some(element.tag.clone()), element_path(element));
        }

        self.notes.insert(id.clone(), note);
        id
    }

    pub fn edit_text(&mut self, id: &NoteId, text: String, now: i64) -> Result<()> {
        self.note_mut(id)?.set_text(text, now);
        Ok(())
    }

    pub fn move_note(&mut self, id: &NoteId, to: Point, now: i64) -> Result<()> {
        self.note_mut(id)?.move_to(to, now);
        Ok(())
    }

    pub fn resize(&mut self, id: &NoteId, width: Dimension, height: Dimension, now: i64) -> Result<()> {
        self.note_mut(id)?.resize(width, height, now);
        Ok(())
    }

    pub fn toggle_collapsed(&mut self, id: &NoteId, now: i64) -> Result<bool> {
        Ok(self.note_mut(id)?.toggle_collapsed(now))
    }

    /// Remove a note. Deleting an absent id is a no-op returning false.
    pub fn delete(&mut self, id: &NoteId) -> bool {
        self.notes.remove(id).is_some()
    }

    /// Persisted form of this page: note id -> record.
    pub fn to_store(&self) -> StoreMap {
        self.notes
            .iter()
            .filter_map(|(id, note)| match serde_json::to_value(note.record()) {
                Ok(value) => Some((id.to_string(), value)),
                Err(e) => {
                    tracing::warn!("Skipping unserializable note {}: {}", id, e);
                    None
                }
            })
            .collect()
    }
}

/// The `postIts` mapping (page URL -> notes) out of a local-scope map.
pub fn all_pages(local: &StoreMap) -> StoreMap {
    match local.get(POSTITS_KEY) {
        Some(Value::Object(pages)) => pages.clone(),
        _ => StoreMap::new(),
    }
}

/// Set one page's notes, dropping the page entry when it has none left.
pub fn replace_page(pages: &mut StoreMap, url: &str, notes: StoreMap) {
    if notes.is_empty() {
        pages.remove(url);
    } else {
        pages.insert(url.to_string(), Value::Object(notes));
    }
}

/// Remove one note from a page, pruning the page when it becomes empty.
pub fn remove_from_page(pages: &mut StoreMap, url: &str, id: &str) -> bool {
    let Some(Value::Object(notes)) = pages.get_mut(url) else {
        return false;
    };
    let removed = notes.remove(id).is_some();
    if notes.is_empty() {
        pages.remove(url);
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> PageRegistry {
        PageRegistry::new(PageUrl::parse("https://a.com/page").unwrap())
    }

    #[test]
    fn test_hydrate_from_missing_or_empty() {
        let mut reg = registry();
        assert_eq!(reg.hydrate(None, 1), 0);
        assert_eq!(reg.hydrate(Some(&json!({})), 1), 0);
        assert!(reg.is_empty());
    }

    #[test]
    fn test_hydrate_replaces_existing_notes() {
        let mut reg = registry();
        reg.create(Point::new(1.0, 1.0), None, 100);

        let stored = json!({
            "note-1": {"x": 5, "y": 6, "text": "a"},
            "note-2": {"text": "b", "collapsed": true}
        });
        assert_eq!(reg.hydrate(Some(&stored), 1), 2);
        assert_eq!(reg.len(), 2);

        let second = reg.get(&NoteId::from("note-2")).unwrap();
        assert!(second.record().collapsed);
        assert_eq!(second.position(), Point::new(10.0, 10.0));
    }

    #[test]
    fn test_create_records_provenance() {
        let mut reg = registry();
        let target = ElementInfo::new("P")
            .with_classes(["intro"])
            .within(ElementInfo::new("BODY").within(ElementInfo::new("HTML")));

        let id = reg.create(Point::new(100.0, 100.0), Some(&target), 1000);
        let record = reg.get(&id).unwrap().record();

        assert_eq!(id.as_str(), "note-1000");
        assert_eq!(record.element.as_deref(), Some("P"));
        assert_eq!(record.element_path.as_deref(), Some("body > p.intro"));
        assert_eq!(record.width, Dimension::px(200.0));
    }

    #[test]
    fn test_create_avoids_hydrated_ids() {
        let mut reg = registry();
        reg.hydrate(Some(&json!({"note-1000": {"text": "old"}})), 1);

        let id = reg.create(Point::new(0.0, 0.0), None, 1000);
        assert_ne!(id.as_str(), "note-1000");
        assert_eq!(reg.len(), 2);
        assert_eq!(
            reg.get(&NoteId::from("note-1000")).unwrap().record().text,
            "old"
        );
    }

    #[test]
    fn test_mutations_on_missing_note() {
        let mut reg = registry();
        let missing = NoteId::from("note-9");
        assert!(matches!(
            reg.edit_text(&missing, "x".to_string(), 1),
            Err(PostitError::NoteNotFound(_))
        ));
        assert!(reg.toggle_collapsed(&missing, 1).is_err());
    }

    #[test]
    fn test_delete_is_idempotent() {
        let mut reg = registry();
        let id = reg.create(Point::new(0.0, 0.0), None, 1);
        assert!(reg.delete(&id));
        assert!(!reg.delete(&id));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_to_store_shape() {
        let mut reg = registry();
        let id = reg.create(Point::new(3.0, 4.0), None, 77);
        reg.edit_text(&id, "hi".to_string(), 78).unwrap();

        let store = reg.to_store();
        let value = store.get("note-77").unwrap();
        assert_eq!(value["text"], json!("hi"));
        assert_eq!(value["width"], json!("200px"));
        assert_eq!(value["createdAt"], json!(77));
        assert_eq!(value["modifiedAt"], json!(78));
    }

    #[test]
    fn test_page_map_helpers_prune_empty_pages() {
        let mut pages = StoreMap::new();
        let mut notes = StoreMap::new();
        notes.insert("n1".to_string(), json!({"text": "hi"}));
        replace_page(&mut pages, "https://a.com/", notes);
        assert!(pages.contains_key("https://a.com/"));

        assert!(!remove_from_page(&mut pages, "https://a.com/", "n2"));
        assert!(remove_from_page(&mut pages, "https://a.com/", "n1"));
        assert!(pages.is_empty());

        replace_page(&mut pages, "https://b.com/", StoreMap::new());
        assert!(!pages.contains_key("https://b.com/"));
    }

    #[test]
    fn test_all_pages_tolerates_bad_shapes() {
        let mut local = StoreMap::new();
        assert!(all_pages(&local).is_empty());
        local.insert("postIts".to_string(), json!("garbage"));
        assert!(all_pages(&local).is_empty());
    }
}
