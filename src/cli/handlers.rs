use std::env;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use super::commands::{PageAction, PageCommand};
use crate::aggregate::{self, preview, split_url, AgeFilter, NormalizedNote, NotesView, SortOrder};
use crate::config::{PageMessage, Settings, SyncConfig};
use crate::error::{PostitError, Result};
use crate::note::{now_millis, Dimension, ElementInfo, NoteId, NoteRecord, Point};
use crate::page::{PageSession, PageUrl};
use crate::storage::{JsonFileBackend, StorageAdapter, POSTIT_DIR};

/// Find the store root by looking for .postit/ from `start` (or the cwd) upward.
fn find_project_root(start: Option<PathBuf>) -> PathBuf {
    let start = start.unwrap_or_else(|| env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let mut current = start.as_path();
    loop {
        if current.join(POSTIT_DIR).exists() {
            return current.to_path_buf();
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => return start,
        }
    }
}

async fn open_storage(root: Option<PathBuf>) -> Result<Arc<StorageAdapter>> {
    let root = find_project_root(root);
    let backend = JsonFileBackend::open(&root).await?;
    tracing::debug!("Using store at {}", backend.dir().display());
    Ok(Arc::new(StorageAdapter::new(Arc::new(backend))))
}

pub async fn handle_init(root: Option<PathBuf>) -> Result<()> {
    let root = match root {
        Some(root) => root,
        None => env::current_dir()?,
    };

    let _backend = JsonFileBackend::init(&root).await?;

    println!("Initialized postit store in {}", root.display());
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PageNoteJson<'a> {
    id: &'a str,
    title: String,
    #[serde(flatten)]
    record: &'a NoteRecord,
}

pub async fn handle_page(root: Option<PathBuf>, command: PageCommand) -> Result<()> {
    let storage = open_storage(root).await?;
    let url = PageUrl::parse(&command.url)?;

    let mut session = PageSession::open(url, storage, SyncConfig::default());
    let result = run_page_action(&mut session, command.action).await;

    // queued saves are written even when the action itself failed
    session.close().await;
    result
}

async fn run_page_action(session: &mut PageSession, action: PageAction) -> Result<()> {
    session.load().await?;

    match action {
        PageAction::Add {
            x,
            y,
            text,
            element,
            json,
        } => {
            let element = element.as_deref().and_then(parse_element_path);
            let id = session.create_note(Point::new(x, y), element.as_ref());
            if let Some(text) = text {
                session.edit_text(&id, text)?;
            }

            if json {
                print_page_notes(session, Some(&id))?;
            } else {
                println!("Added note {} to {}", id, session.url());
            }
        }
        PageAction::Show { json } => {
            if json {
                print_page_notes(session, None)?;
            } else if session.registry().is_empty() {
                println!("No notes on {}.", session.url());
            } else {
                println!("Notes on {}:\n", session.url());
                for note in session.notes() {
                    let record = note.record();
                    println!(
                        "  {} {} ({}, {}) {}x{} {}",
                        note.glyph(),
                        note.id(),
                        record.x,
                        record.y,
                        record.width,
                        record.height,
                        note.title(session.settings())
                    );
                    if let Some(path) = &record.element_path {
                        println!("      element: {}", path);
                    }
                    if !record.collapsed && !record.text.is_empty() {
                        for line in record.text.lines() {
                            println!("      {}", line);
                        }
                    }
                }
            }
        }
        PageAction::Edit { id, text, stdin } => {
            let text = if stdin {
                let mut content = String::new();
                io::stdin().read_to_string(&mut content)?;
                content.trim_end_matches('\n').to_string()
            } else {
                text.unwrap_or_default()
            };
            let id = NoteId::from(id);
            session.edit_text(&id, text)?;
            println!("Updated note {}", id);
        }
        PageAction::Move { id, x, y } => {
            let id = NoteId::from(id);
            session.move_note(&id, Point::new(x, y))?;
            println!("Moved note {} to ({}, {})", id, x, y);
        }
        PageAction::Resize { id, width, height } => {
            let id = NoteId::from(id);
            let (width, height) = (parse_dimension(&width), parse_dimension(&height));
            session.resize_note(&id, width.clone(), height.clone())?;
            println!("Resized note {} to {}x{}", id, width, height);
        }
        PageAction::Collapse { id } => {
            let id = NoteId::from(id);
            let collapsed = session.toggle_collapse(&id)?;
            println!(
                "Note {} {}",
                id,
                if collapsed { "collapsed" } else { "expanded" }
            );
        }
        PageAction::Close { id } => {
            let id = NoteId::from(id);
            if !session.close_note(&id) {
                return Err(PostitError::NoteNotFound(id.to_string()));
            }
            println!("Closed note {}", id);
        }
    }

    Ok(())
}

fn print_page_notes(session: &PageSession, only: Option<&NoteId>) -> Result<()> {
    let rows: Vec<PageNoteJson<'_>> = session
        .notes()
        .filter(|note| only.map_or(true, |id| note.id() == id))
        .map(|note| PageNoteJson {
            id: note.id().as_str(),
            title: note.title(session.settings()),
            record: note.record(),
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}

/// Bare numbers are pixel lengths; anything else is kept as given.
fn parse_dimension(raw: &str) -> Dimension {
    let raw = raw.trim();
    match raw.parse::<f64>() {
        Ok(pixels) => Dimension::px(pixels),
        Err(_) => Dimension::Text(raw.to_string()),
    }
}

/// Build an element chain from a selector path such as
/// `body > div#main > p.intro.lead`, under an implicit document root.
fn parse_element_path(path: &str) -> Option<ElementInfo> {
    let mut current = ElementInfo::new("html");
    let mut found = false;

    for segment in path.split('>').map(str::trim).filter(|s| !s.is_empty()) {
        current = parse_selector(segment).within(current);
        found = true;
    }

    if !found {
        tracing::warn!("Ignoring empty element path");
    }
    found.then_some(current)
}

fn parse_selector(segment: &str) -> ElementInfo {
    let (head, id_part) = match segment.split_once('#') {
        Some((head, rest)) => (head, Some(rest)),
        None => (segment, None),
    };

    let mut head = head.split('.');
    let tag = head.next().unwrap_or_default();
    let mut classes: Vec<&str> = head.collect();

    let mut element = ElementInfo::new(tag);
    if let Some(rest) = id_part {
        let mut rest = rest.split('.');
        if let Some(id) = rest.next().filter(|id| !id.is_empty()) {
            element = element.with_id(id);
        }
        classes.extend(rest);
    }
    element.with_classes(classes.into_iter().filter(|c| !c.is_empty()))
}

pub async fn handle_list(
    root: Option<PathBuf>,
    search: Option<String>,
    sort: SortOrder,
    filter: AgeFilter,
    json: bool,
) -> Result<()> {
    let storage = open_storage(root).await?;
    let now = now_millis();
    // the age filter narrows what the search runs over
    let notes: Vec<NormalizedNote> = aggregate::load_all(&storage, now)
        .await
        .into_iter()
        .filter(|n| filter.matches(n, now))
        .collect();
    let mut view = NotesView::new(notes);

    if let Some(term) = search.as_deref() {
        view.search(term);
    }
    view.sort(sort);

    if json {
        println!("{}", serde_json::to_string_pretty(view.visible())?);
        return Ok(());
    }

    let groups = view.groups();
    if groups.is_empty() {
        match search {
            Some(term) => println!("No notes found for '{}'.", term),
            None => println!("No notes found."),
        }
        return Ok(());
    }

    println!("{}\n", view.heading());
    for group in groups {
        println!("{} ({})", group.label, group.notes.len());
        for note in &group.notes {
            print_list_entry(note);
        }
        println!();
    }

    Ok(())
}

fn print_list_entry(note: &NormalizedNote) {
    let (domain, path) = split_url(&note.url);
    let created = chrono::DateTime::from_timestamp_millis(note.created_at)
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default();

    println!("  {} [{}] {}", note.id, note.source, note.title);
    println!("      {}{}  {}", domain, path.unwrap_or_default(), created);
    let content = preview(&note.content).replace('\n', " ");
    if !content.trim().is_empty() {
        println!("      {}", content);
    }
}

pub async fn handle_stats(root: Option<PathBuf>, json: bool) -> Result<()> {
    let storage = open_storage(root).await?;
    let now = now_millis();
    let view = NotesView::new(aggregate::load_all(&storage, now).await);
    let stats = view.stats(now);

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("Total notes: {}", stats.total_notes);
        println!("Websites:    {}", stats.total_websites);
        println!("This week:   {}", stats.recent_notes);
    }
    Ok(())
}

async fn find_note(storage: &StorageAdapter, id: &str) -> Result<NormalizedNote> {
    let notes = aggregate::load_all(storage, now_millis()).await;
    NotesView::new(notes)
        .find(id)
        .cloned()
        .ok_or_else(|| PostitError::NoteNotFound(id.to_string()))
}

pub async fn handle_visit(root: Option<PathBuf>, id: String) -> Result<()> {
    let storage = open_storage(root).await?;
    let note = find_note(&storage, &id).await?;
    println!("{}", note.url);
    Ok(())
}

pub async fn handle_delete(root: Option<PathBuf>, id: String, force: bool) -> Result<()> {
    let storage = open_storage(root).await?;
    let note = find_note(&storage, &id).await?;

    // Confirm deletion unless --force is used
    if !force {
        eprintln!("Delete note {} - {}? [y/N] ", note.id, note.title);

        if atty::is(atty::Stream::Stdin) {
            let mut input = String::new();
            io::stdin().read_line(&mut input)?;
            if !input.trim().eq_ignore_ascii_case("y") {
                println!("Cancelled.");
                return Ok(());
            }
        } else {
            return Err(PostitError::StorageOpFailed(
                "Use --force to delete in non-interactive mode".to_string(),
            ));
        }
    }

    if aggregate::delete_note(&storage, &note).await? {
        println!("Deleted note {} - {}", note.id, note.title);
    } else {
        println!("Note {} was already gone.", note.id);
    }
    Ok(())
}

pub async fn handle_settings(
    root: Option<PathBuf>,
    font_size: Option<u32>,
    show_first_line_as_title: Option<bool>,
    json: bool,
) -> Result<()> {
    let storage = open_storage(root).await?;
    let mut settings = Settings::load(&storage).await;

    let changed = font_size.is_some() || show_first_line_as_title.is_some();
    if let Some(size) = font_size {
        settings = settings.with_font_size(size);
    }
    if let Some(show) = show_first_line_as_title {
        settings.show_first_line_as_title = show;
    }
    if changed {
        settings.save(&storage).await?;
        tracing::info!("Settings saved");
    }

    if json {
        let message = PageMessage::UpdateSettings { settings };
        println!("{}", serde_json::to_string_pretty(&message)?);
    } else {
        println!("Font size:                {}px", settings.font_size);
        println!(
            "Show first line as title: {}",
            if settings.show_first_line_as_title { "yes" } else { "no" }
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::element_path;
    use tempfile::TempDir;

    #[test]
    fn test_parse_dimension() {
        assert_eq!(parse_dimension("300"), Dimension::Text("300px".to_string()));
        assert_eq!(parse_dimension(" 250px "), Dimension::Text("250px".to_string()));
        assert_eq!(parse_dimension("auto"), Dimension::Text("auto".to_string()));
    }

    #[test]
    fn test_parse_element_path() {
        let element = parse_element_path("body > div#main.wide > P.intro.lead").unwrap();
        assert_eq!(element.tag, "P");
        assert_eq!(
            element_path(&element).as_deref(),
            Some("body > div#main > p.intro.lead")
        );

        assert!(parse_element_path("  >  ").is_none());
    }

    #[test]
    fn test_find_project_root_walks_up() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join(POSTIT_DIR)).unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_project_root(Some(nested)), dir.path().to_path_buf());
    }
}
