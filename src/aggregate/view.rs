use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;

use serde::Serialize;

use super::display::display_label;
use super::NormalizedNote;
use crate::page::hostname;

/// Notes younger than this count as recent.
pub const RECENT_WINDOW_MS: i64 = 7 * 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Title,
    Url,
    /// Newest first.
    #[default]
    Date,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "title" => Ok(SortOrder::Title),
            "url" => Ok(SortOrder::Url),
            "date" => Ok(SortOrder::Date),
            _ => Err(format!("Unknown sort order: {} (expected title, url or date)", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AgeFilter {
    Recent,
    Older,
    #[default]
    All,
}

impl AgeFilter {
    pub fn matches(&self, note: &NormalizedNote, now: i64) -> bool {
        let cutoff = now - RECENT_WINDOW_MS;
        match self {
            AgeFilter::Recent => note.created_at > cutoff,
            AgeFilter::Older => note.created_at <= cutoff,
            AgeFilter::All => true,
        }
    }
}

impl FromStr for AgeFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "recent" => Ok(AgeFilter::Recent),
            "older" => Ok(AgeFilter::Older),
            "all" => Ok(AgeFilter::All),
            _ => Err(format!("Unknown filter: {} (expected recent, older or all)", s)),
        }
    }
}

/// Notes sharing one hostname.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainGroup {
    /// Raw hostname, `www.` included.
    pub hostname: String,
    /// Hostname as shown, `www.` stripped.
    pub label: String,
    pub notes: Vec<NormalizedNote>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_notes: usize,
    pub total_websites: usize,
    pub recent_notes: usize,
}

/// The management list: every loaded note plus the subset currently shown.
///
/// Search and age filter each start again from the full list; sorting
/// reorders whatever is currently shown.
#[derive(Debug, Clone, Default)]
pub struct NotesView {
    all: Vec<NormalizedNote>,
    visible: Vec<NormalizedNote>,
}

impl NotesView {
    pub fn new(notes: Vec<NormalizedNote>) -> Self {
        Self {
            visible: notes.clone(),
            all: notes,
        }
    }

    pub fn all(&self) -> &[NormalizedNote] {
        &self.all
    }

    pub fn visible(&self) -> &[NormalizedNote] {
        &self.visible
    }

    pub fn find(&self, id: &str) -> Option<&NormalizedNote> {
        self.all.iter().find(|n| n.id == id)
    }

    /// Case-insensitive substring match on title, content and URL. A blank
    /// term shows everything.
    pub fn search(&mut self, term: &str) {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            self.visible = self.all.clone();
            return;
        }
        self.visible = self
            .all
            .iter()
            .filter(|n| {
                n.title.to_lowercase().contains(&term)
                    || n.content.to_lowercase().contains(&term)
                    || n.url.to_lowercase().contains(&term)
            })
            .cloned()
            .collect();
    }

    pub fn sort(&mut self, order: SortOrder) {
        match order {
            SortOrder::Title => self.visible.sort_by(|a, b| a.title.cmp(&b.title)),
            SortOrder::Url => self.visible.sort_by(|a, b| a.url.cmp(&b.url)),
            SortOrder::Date => self.visible.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        }
    }

    pub fn filter(&mut self, filter: AgeFilter, now: i64) {
        self.visible = self
            .all
            .iter()
            .filter(|n| filter.matches(n, now))
            .cloned()
            .collect();
    }

    /// Drop a note from both lists after it was deleted from storage.
    pub fn remove(&mut self, id: &str) {
        self.all.retain(|n| n.id != id);
        self.visible.retain(|n| n.id != id);
    }

    /// Visible notes grouped by raw hostname, hostnames ascending. Groups
    /// keep the current note order.
    pub fn groups(&self) -> Vec<DomainGroup> {
        let mut grouped: BTreeMap<String, Vec<NormalizedNote>> = BTreeMap::new();
        for note in &self.visible {
            grouped
                .entry(hostname(&note.url))
                .or_default()
                .push(note.clone());
        }

        grouped
            .into_iter()
            .map(|(host, notes)| DomainGroup {
                label: display_label(&host).to_string(),
                hostname: host,
                notes,
            })
            .collect()
    }

    /// Counters over every loaded note, independent of search or filter.
    pub fn stats(&self, now: i64) -> Stats {
        let websites: HashSet<String> = self.all.iter().map(|n| hostname(&n.url)).collect();
        Stats {
            total_notes: self.all.len(),
            total_websites: websites.len(),
            recent_notes: self
                .all
                .iter()
                .filter(|n| AgeFilter::Recent.matches(n, now))
                .count(),
        }
    }

    /// Heading for the list: "No Notes", the single site shown, or a site count.
    pub fn heading(&self) -> String {
        let groups = self.groups();
        match groups.as_slice() {
            [] => "No Notes".to_string(),
            [only] => only.label.clone(),
            many => format!("{} Websites", many.len()),
        }
    }
}
