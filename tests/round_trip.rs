use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::{Path, PathBuf};
use todour::model::TaskLine;
use todour::ops::history::HistoryLog;
use todour::ops::store::{StoreOptions, TaskStore};
use todour::parse::{join_lines, pretty_print, set_completed, split_lines};

fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn read_fixture(name: &str) -> String {
    fs::read_to_string(fixture_path(name))
        .unwrap_or_else(|e| panic!("Could not read fixture {}: {}", name, e))
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()
}

/// Copy a fixture into a temp dir and open a store on the copy.
fn open_copy(dir: &Path, name: &str) -> TaskStore {
    let path = dir.join("todo.txt");
    fs::copy(fixture_path(name), &path).unwrap();
    let options = StoreOptions::new(dir.join("done.txt"));
    TaskStore::open(path, options).with_history(HistoryLog::new())
}

// ============================================================================
// Line codec
// ============================================================================

#[test]
fn split_and_join_preserve_file() {
    let source = read_fixture("todo.txt");
    let lines = split_lines(&source);
    assert_eq!(lines.len(), 9);
    assert_eq!(join_lines(&lines), source);
}

#[test]
fn complete_then_reopen_restores_active_lines() {
    let source = read_fixture("todo.txt");
    for raw in split_lines(&source) {
        let task = TaskLine::new(raw.as_str());
        if task.is_completed() {
            continue;
        }
        let done = set_completed(&raw, true, today());
        assert!(done.starts_with("x 2024-06-10 "), "not completed: {}", done);
        assert!(!done.contains("(A) ") && !done.contains("(B) ") && !done.contains("(C) "));
        assert_eq!(set_completed(&done, false, today()), raw);
    }
}

#[test]
fn pretty_print_hides_bookkeeping() {
    let source = read_fixture("todo.txt");
    let pretty: Vec<String> = split_lines(&source).iter().map(|l| pretty_print(l)).collect();
    assert_eq!(pretty[0], "(A) call mom @phone due:2024-06-09");
    assert_eq!(pretty[4], "paid rent +bills");
    assert_eq!(pretty[8], "sent invoice +work");
    for line in &pretty {
        assert!(!line.starts_with("x "), "marker left in: {}", line);
        assert!(!line.contains("pri:"), "pri tag left in: {}", line);
    }
}

// ============================================================================
// Task store
// ============================================================================

#[test]
fn store_loads_fixture_unchanged() {
    let tmp = tempfile::TempDir::new().unwrap();
    let store = open_copy(tmp.path(), "todo.txt");
    assert_eq!(store.count(), 9);
    assert_eq!(store.content(), read_fixture("todo.txt"));
}

#[test]
fn add_remove_leaves_file_as_it_was() {
    let tmp = tempfile::TempDir::new().unwrap();
    let mut store = open_copy(tmp.path(), "todo.txt");
    let raw = store.add("scratch task").unwrap().unwrap();
    store.remove(&raw).unwrap();
    assert_eq!(fs::read_to_string(store.path()).unwrap(), read_fixture("todo.txt"));
}

#[test]
fn undo_walks_back_to_fixture() {
    let tmp = tempfile::TempDir::new().unwrap();
    let mut store = open_copy(tmp.path(), "todo.txt");
    store.add("one").unwrap();
    store.toggle_row("buy milk @store @today").unwrap();
    store.archive().unwrap();

    while store.undo().unwrap() {}
    assert_eq!(fs::read_to_string(store.path()).unwrap(), read_fixture("todo.txt"));
    assert!(store.redo_possible());
}
