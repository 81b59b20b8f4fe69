use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use serde_json::{json, Value};
use tempfile::TempDir;

fn postit_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_postit"));
    cmd.current_dir(dir).env_remove("POSTIT_ROOT").env_remove("RUST_LOG");
    cmd
}

fn run(dir: &Path, args: &[&str]) -> Output {
    postit_cmd(dir).args(args).output().unwrap()
}

fn run_ok(dir: &Path, args: &[&str]) -> String {
    let output = run(dir, args);
    assert!(
        output.status.success(),
        "postit {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn run_json(dir: &Path, args: &[&str]) -> Value {
    serde_json::from_str(&run_ok(dir, args)).unwrap()
}

fn init() -> TempDir {
    let tmp = TempDir::new().unwrap();
    run_ok(tmp.path(), &["init"]);
    tmp
}

fn read_store(dir: &Path, file: &str) -> Value {
    let raw = std::fs::read_to_string(dir.join(".postit").join(file)).unwrap();
    serde_json::from_str(&raw).unwrap()
}

fn add_note(dir: &Path, url: &str, text: &str) -> String {
    let added = run_json(dir, &["page", url, "add", "--text", text, "--json"]);
    added[0]["id"].as_str().unwrap().to_string()
}

#[test]
fn test_init_creates_store_files() {
    let tmp = init();

    assert!(tmp.path().join(".postit").is_dir());
    assert_eq!(read_store(tmp.path(), "local.json"), json!({}));
    assert_eq!(read_store(tmp.path(), "sync.json"), json!({}));
}

#[test]
fn test_init_twice_fails() {
    let tmp = init();

    let output = run(tmp.path(), &["init"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Already initialized"));
}

#[test]
fn test_commands_without_init_fail() {
    let tmp = TempDir::new().unwrap();

    let output = run(tmp.path(), &["page", "https://a.com/", "show"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Not in a postit workspace"));
}

#[test]
fn test_store_found_from_subdirectory_and_root_flag() {
    let tmp = init();
    let nested = tmp.path().join("deep").join("er");
    std::fs::create_dir_all(&nested).unwrap();

    add_note(&nested, "https://a.com/", "from below");

    let other = TempDir::new().unwrap();
    let root = tmp.path().to_str().unwrap();
    let notes = run_json(other.path(), &["--root", root, "list", "--json"]);
    assert_eq!(notes.as_array().unwrap().len(), 1);
    assert_eq!(notes[0]["content"], "from below");
}

#[test]
fn test_page_workflow_persists_by_normalized_url() {
    let tmp = init();
    let dir = tmp.path();
    let url = "https://example.com/docs?session=42#top";

    let id = add_note(dir, url, "Hello\nWorld");
    assert!(id.starts_with("note-"));

    let local = read_store(dir, "local.json");
    let stored = &local["postIts"]["https://example.com/docs"][&id];
    assert_eq!(stored["text"], "Hello\nWorld");
    assert_eq!(stored["x"], json!(10.0));
    assert_eq!(stored["width"], "200px");
    assert_eq!(stored["collapsed"], false);
    assert_eq!(stored["schemaVersion"], 1);

    run_ok(dir, &["page", url, "move", &id, "120", "-5"]);
    run_ok(dir, &["page", url, "resize", &id, "300", "150px"]);
    let collapsed = run_ok(dir, &["page", url, "collapse", &id]);
    assert!(collapsed.contains("collapsed"));

    let shown = run_json(dir, &["page", "https://example.com/docs", "show", "--json"]);
    let note = &shown[0];
    assert_eq!(note["id"], id.as_str());
    assert_eq!(note["title"], "Hello");
    assert_eq!(note["x"], json!(120.0));
    assert_eq!(note["y"], json!(-5.0));
    assert_eq!(note["width"], "300px");
    assert_eq!(note["height"], "150px");
    assert_eq!(note["collapsed"], true);
    assert!(note["modifiedAt"].as_i64().unwrap() >= note["createdAt"].as_i64().unwrap());

    run_ok(dir, &["page", url, "close", &id]);
    let local = read_store(dir, "local.json");
    assert_eq!(local["postIts"], json!({}));
}

#[test]
fn test_page_add_records_element_path() {
    let tmp = init();
    let dir = tmp.path();

    let added = run_json(
        dir,
        &[
            "page",
            "https://a.com/",
            "add",
            "--x",
            "40",
            "--y",
            "60",
            "--element",
            "body > div#main > p.intro",
            "--json",
        ],
    );
    assert_eq!(added[0]["element"], "p");
    assert_eq!(added[0]["elementPath"], "body > div#main > p.intro");
    assert_eq!(added[0]["x"], json!(40.0));
}

#[test]
fn test_page_edit_from_stdin() {
    let tmp = init();
    let dir = tmp.path();
    let id = add_note(dir, "https://a.com/", "old");

    let mut child = postit_cmd(dir)
        .args(["page", "https://a.com/", "edit", &id, "--stdin"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"piped text\nline two\n")
        .unwrap();
    assert!(child.wait_with_output().unwrap().status.success());

    let shown = run_json(dir, &["page", "https://a.com/", "show", "--json"]);
    assert_eq!(shown[0]["text"], "piped text\nline two");
}

#[test]
fn test_missing_note_is_reported() {
    let tmp = init();

    let output = run(tmp.path(), &["page", "https://a.com/", "edit", "note-1", "x"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Note not found"));

    let output = run(tmp.path(), &["page", "https://a.com/", "close", "note-1"]);
    assert!(!output.status.success());
}

#[test]
fn test_list_search_and_sort_across_pages() {
    let tmp = init();
    let dir = tmp.path();

    add_note(dir, "https://www.example.com/a", "Zebra crossing");
    add_note(dir, "https://docs.rs/serde", "apple pie");
    add_note(dir, "https://example.com/b", "Mango\nbody text");

    let all = run_json(dir, &["list", "--json"]);
    assert_eq!(all.as_array().unwrap().len(), 3);

    let found = run_json(dir, &["list", "--search", "MANGO", "--json"]);
    assert_eq!(found.as_array().unwrap().len(), 1);
    assert_eq!(found[0]["title"], "Mango");
    assert_eq!(found[0]["url"], "https://example.com/b");
    assert_eq!(found[0]["source"], "local");

    let by_title = run_json(dir, &["list", "--sort", "title", "--json"]);
    let titles: Vec<&str> = by_title
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Mango", "Zebra crossing", "apple pie"]);

    let older = run_json(dir, &["list", "--filter", "older", "--json"]);
    assert!(older.as_array().unwrap().is_empty());

    let text = run_ok(dir, &["list"]);
    assert!(text.contains("3 Websites"));
    assert!(text.contains("docs.rs"));
}

#[test]
fn test_synced_notes_are_listed_deduplicated_and_deleted() {
    let tmp = init();
    let dir = tmp.path();
    add_note(dir, "https://a.com/page", "shared text");

    let sync = json!({
        "fontSize": 14,
        "note_1": {"content": "shared text", "url": "https://a.com/page", "createdAt": 1000},
        "note_2": {"content": "only synced", "title": "Synced title", "createdAt": 2000},
        "unrelated": {"content": "ignored"}
    });
    std::fs::write(dir.join(".postit/sync.json"), sync.to_string()).unwrap();

    let notes = run_json(dir, &["list", "--json"]);
    let notes = notes.as_array().unwrap();
    assert_eq!(notes.len(), 2);
    let synced = notes.iter().find(|n| n["source"] == "sync").unwrap();
    assert_eq!(synced["id"], "note_2");
    assert_eq!(synced["title"], "Synced title");
    assert_eq!(synced["url"], "Unknown");

    let stats = run_json(dir, &["stats", "--json"]);
    assert_eq!(stats["totalNotes"], 2);
    assert_eq!(stats["totalWebsites"], 2);

    run_ok(dir, &["delete", "note_2", "--force"]);
    let sync = read_store(dir, "sync.json");
    assert!(sync.get("note_2").is_none());
    assert_eq!(sync["fontSize"], 14);
}

#[test]
fn test_visit_and_delete_local_note() {
    let tmp = init();
    let dir = tmp.path();
    let id = add_note(dir, "https://a.com/page?q=1", "visit me");

    let visited = run_ok(dir, &["visit", &id]);
    assert_eq!(visited.trim(), "https://a.com/page");

    // stdin is not a terminal here, so --force is required
    let output = run(dir, &["delete", &id]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--force"));

    let deleted = run_ok(dir, &["delete", &id, "--force"]);
    assert!(deleted.contains("Deleted note"));
    assert_eq!(read_store(dir, "local.json")["postIts"], json!({}));

    let output = run(dir, &["visit", &id]);
    assert!(!output.status.success());
}

#[test]
fn test_settings_update_and_broadcast_payload() {
    let tmp = init();
    let dir = tmp.path();

    let clamped = run_json(dir, &["settings", "--font-size", "40", "--json"]);
    assert_eq!(clamped["settings"]["fontSize"], 32);
    assert_eq!(read_store(dir, "sync.json")["fontSize"], 32);

    let message = run_json(
        dir,
        &[
            "settings",
            "--font-size",
            "16",
            "--show-first-line-as-title",
            "false",
            "--json",
        ],
    );
    assert_eq!(
        message,
        json!({
            "action": "updateSettings",
            "settings": {"fontSize": 16, "showFirstLineAsTitle": false}
        })
    );

    let sync = read_store(dir, "sync.json");
    assert_eq!(sync["fontSize"], 16);
    assert_eq!(sync["showFirstLineAsTitle"], false);

    let id = add_note(dir, "https://a.com/", "First line");
    let shown = run_json(dir, &["page", "https://a.com/", "show", "--json"]);
    assert_eq!(shown[0]["id"], id.as_str());
    assert_eq!(shown[0]["title"], "Note");
}
