use std::cmp::Reverse;

use chrono::NaiveDate;

use crate::model::settings::Settings;
use crate::model::task::{DateValue, TaskLine};
use crate::ops::search::SearchFilter;
use crate::ops::store::{StoreError, TaskStore};
use crate::parse::{
    DateTag, append_text, lower_priority, normalize_whitespace, raise_priority, remove_text,
    set_date_tag, strip_newlines, toggle_today,
};

/// A per-row edit applied to every selected row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditCommand {
    RaisePriority,
    LowerPriority,
    /// Set `due:`; relative offsets are resolved, empty clears
    SetDue(String),
    /// Set `t:`; relative offsets are resolved, empty clears
    SetThreshold(String),
    Append(String),
    RemoveText(String),
    ToggleToday,
    ToggleDone,
    /// Replace the whole text, keeping the completion state
    Replace(String),
}

impl EditCommand {
    /// The new raw text and completion state for one row.
    pub fn apply(&self, raw: &str, today: NaiveDate) -> (String, bool) {
        let done = TaskLine::new(raw).is_completed();
        let text = match self {
            EditCommand::RaisePriority => raise_priority(raw),
            EditCommand::LowerPriority => lower_priority(raw),
            EditCommand::SetDue(value) => {
                set_date_tag(raw, DateTag::Due, &resolve_date_input(value, today))
            }
            EditCommand::SetThreshold(value) => {
                set_date_tag(raw, DateTag::Threshold, &resolve_date_input(value, today))
            }
            EditCommand::Append(text) => append_text(raw, &strip_newlines(text)),
            EditCommand::RemoveText(text) => remove_text(raw, text),
            EditCommand::ToggleToday => toggle_today(raw),
            EditCommand::ToggleDone => return (raw.to_string(), !done),
            EditCommand::Replace(text) => strip_newlines(text),
        };
        (text, done)
    }
}

/// Turn what the user typed for a date into the value written to the line.
/// Relative offsets become ISO dates; anything else is kept as typed.
pub fn resolve_date_input(value: &str, today: NaiveDate) -> String {
    let value = value.trim();
    match DateValue::parse(value).and_then(|d| d.resolve(today)) {
        Some(date) => date.format("%Y-%m-%d").to_string(),
        None => value.to_string(),
    }
}

/// The value a date prompt starts with: the row's current value for `tag`,
/// otherwise today.
pub fn date_prefill(raw: &str, tag: DateTag, today: NaiveDate) -> String {
    match tag.value_in(raw) {
        Some(value) => value.to_string(),
        None => today.format("%Y-%m-%d").to_string(),
    }
}

/// The rows a command applies to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Raw text of every selected row
    pub rows: Vec<String>,
    /// Raw text of the row with focus
    pub current: Option<String>,
}

impl Selection {
    pub fn single(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        Selection {
            rows: vec![raw.clone()],
            current: Some(raw),
        }
    }

    pub fn many(rows: Vec<String>) -> Self {
        let current = rows.first().cloned();
        Selection { rows, current }
    }
}

/// Apply `command` to every selected row as one batch.
///
/// Rows are matched to file positions before anything is edited, so an
/// edit that produces the text of another selected row cannot redirect a
/// later edit. Repeated texts claim successive rows. The store persists,
/// records history and notifies once at the end. Returns the new raw text
/// of the row that had focus (or of the last selected row) so the caller
/// can select it again.
pub fn apply_to_selection(
    store: &mut TaskStore,
    selection: &Selection,
    command: &EditCommand,
    today: NaiveDate,
) -> Result<Option<String>, StoreError> {
    store.batch(|store| {
        let targets = claim_rows(store.lines(), &selection.rows)?;

        // bottom-up, so a removed row never shifts one still to be edited
        let mut order: Vec<usize> = (0..targets.len()).collect();
        order.sort_by_key(|&k| Reverse(targets[k]));

        let mut results: Vec<Option<String>> = vec![None; targets.len()];
        for k in order {
            let (text, done) = command.apply(&selection.rows[k], today);
            results[k] = store.update_at(targets[k], done, &text)?;
        }

        let focus = selection
            .current
            .as_deref()
            .and_then(|cur| selection.rows.iter().position(|r| r == cur))
            .and_then(|k| results[k].clone());
        Ok(focus.or_else(|| results.last().cloned().flatten()))
    })
}

/// File positions of `rows`, each matched to the first line with that text
/// not already claimed.
fn claim_rows(lines: &[String], rows: &[String]) -> Result<Vec<usize>, StoreError> {
    let mut claimed: Vec<usize> = Vec::with_capacity(rows.len());
    for raw in rows {
        let idx = (0..lines.len())
            .find(|i| lines[*i] == *raw && !claimed.contains(i))
            .ok_or_else(|| StoreError::NotFound(raw.clone()))?;
        claimed.push(idx);
    }
    Ok(claimed)
}

/// Build the text of a new task from what was typed.
///
/// The configured default prefix goes in front. With the context lock on,
/// every required term of the current search that the text does not
/// already contain (ignoring case) is appended.
pub fn compose_new_task(input: &str, settings: &Settings, phrase: &str) -> String {
    let mut text = strip_newlines(input).trim().to_string();
    if text.is_empty() {
        return text;
    }

    let prefix = settings.tasks.default_prefix.trim();
    if !prefix.is_empty() && !text.starts_with(prefix) {
        text = format!("{prefix} {text}");
    }

    if settings.search.context_lock {
        let filter = SearchFilter::compile(phrase);
        for term in filter.required_terms() {
            if !text.to_lowercase().contains(term) {
                text.push(' ');
                text.push_str(original_case(phrase, term));
            }
        }
    }
    normalize_whitespace(&text)
}

/// The word of `phrase` that lowercases to `term`, as the user typed it
fn original_case<'a>(phrase: &'a str, term: &'a str) -> &'a str {
    phrase
        .split_whitespace()
        .find(|w| w.to_lowercase() == term)
        .unwrap_or(term)
}

/// Remembers the focused row across a reload so it can be found again.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionMemory {
    raw: Option<String>,
    row: usize,
}

impl SelectionMemory {
    pub fn save(raw: Option<&str>, row: usize) -> Self {
        SelectionMemory {
            raw: raw.map(str::to_string),
            row,
        }
    }

    /// Row index to select in `rows`: the same raw text if it still exists,
    /// else the saved index clamped to the new length. None when empty.
    pub fn restore(&self, rows: &[String]) -> Option<usize> {
        if rows.is_empty() {
            return None;
        }
        if let Some(raw) = &self.raw
            && let Some(idx) = rows.iter().position(|r| r == raw)
        {
            return Some(idx);
        }
        Some(self.row.min(rows.len() - 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::store::{ChangeKind, StoreOptions};
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn store_with(dir: &TempDir, content: &str) -> TaskStore {
        let path = dir.path().join("todo.txt");
        fs::write(&path, content).unwrap();
        let mut options = StoreOptions::new(dir.path().join("done.txt"));
        options.today = Some(today());
        TaskStore::open(path, options)
    }

    #[test]
    fn buy_milk_scenario() {
        let cmds = [
            (EditCommand::RaisePriority, "(A) Buy milk @home"),
            (EditCommand::ToggleToday, "(A) Buy milk @home @today"),
            (EditCommand::ToggleToday, "(A) Buy milk @home"),
        ];
        let mut raw = "Buy milk @home".to_string();
        for (cmd, expected) in cmds {
            let (next, done) = cmd.apply(&raw, today());
            assert!(!done);
            assert_eq!(next, expected);
            raw = next;
        }
    }

    #[test]
    fn relative_due_is_resolved() {
        let (text, _) = EditCommand::SetDue("3d".into()).apply("pay rent", today());
        assert_eq!(text, "pay rent due:2024-06-04");
        let (text, _) = EditCommand::SetDue("2024-07-01".into()).apply(&text, today());
        assert_eq!(text, "pay rent due:2024-07-01");
        let (text, _) = EditCommand::SetDue(String::new()).apply(&text, today());
        assert_eq!(text, "pay rent");
    }

    #[test]
    fn unparseable_date_is_written_as_typed() {
        assert_eq!(resolve_date_input(" someday ", today()), "someday");
        let (text, _) = EditCommand::SetThreshold("1w".into()).apply("x", today());
        assert_eq!(text, "x t:2024-06-08");
    }

    #[test]
    fn prefill_uses_existing_value_or_today() {
        assert_eq!(date_prefill("a due:2024-09-09", DateTag::Due, today()), "2024-09-09");
        assert_eq!(date_prefill("a t:5d", DateTag::Threshold, today()), "5d");
        assert_eq!(date_prefill("a", DateTag::Due, today()), "2024-06-01");
    }

    #[test]
    fn replace_keeps_completion() {
        let (text, done) =
            EditCommand::Replace("new words".into()).apply("x 2024-05-01 old", today());
        assert_eq!(text, "new words");
        assert!(done);
    }

    #[test]
    fn batch_over_selection_notifies_once() {
        let dir = TempDir::new().unwrap();
        let mut store = store_with(&dir, "(B) a\nb\n(Z) c\nd\n");
        let rx = store.subscribe();
        let snapshots = store.history().len();

        let selection = Selection {
            rows: vec!["(B) a".into(), "b".into(), "(Z) c".into()],
            current: Some("b".into()),
        };
        let focus =
            apply_to_selection(&mut store, &selection, &EditCommand::LowerPriority, today())
                .unwrap();

        assert_eq!(focus.as_deref(), Some("(A) b"));
        assert_eq!(
            fs::read_to_string(store.path()).unwrap(),
            "(C) a\n(A) b\n(Z) c\nd\n"
        );
        let notices: Vec<_> = rx.try_iter().collect();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].kind, ChangeKind::Batch);
        assert_eq!(store.history().len(), snapshots + 1);

        assert!(store.undo().unwrap());
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "(B) a\nb\n(Z) c\nd\n");
    }

    #[test]
    fn toggle_done_on_selection() {
        let dir = TempDir::new().unwrap();
        let mut store = store_with(&dir, "(B) call mom\nwalk\n");
        let focus = apply_to_selection(
            &mut store,
            &Selection::many(vec!["(B) call mom".into(), "walk".into()]),
            &EditCommand::ToggleDone,
            today(),
        )
        .unwrap();
        assert_eq!(focus.as_deref(), Some("x 2024-06-01 call mom pri:B"));
        assert_eq!(store.lines(), ["x 2024-06-01 call mom pri:B", "x 2024-06-01 walk"]);
    }

    #[test]
    fn edit_producing_a_later_rows_text_stays_on_its_row() {
        let dir = TempDir::new().unwrap();
        let mut store = store_with(&dir, "a\na b\n");
        let focus = apply_to_selection(
            &mut store,
            &Selection::many(vec!["a".into(), "a b".into()]),
            &EditCommand::Append("b".into()),
            today(),
        )
        .unwrap();
        assert_eq!(store.lines(), ["a b", "a b b"]);
        assert_eq!(focus.as_deref(), Some("a b"));
    }

    #[test]
    fn duplicate_rows_are_each_edited_once() {
        let dir = TempDir::new().unwrap();
        let mut store = store_with(&dir, "walk\nread\nwalk\n");
        apply_to_selection(
            &mut store,
            &Selection::many(vec!["walk".into(), "walk".into()]),
            &EditCommand::ToggleToday,
            today(),
        )
        .unwrap();
        assert_eq!(store.lines(), ["walk @today", "read", "walk @today"]);
    }

    #[test]
    fn blanked_row_does_not_shift_the_others() {
        let dir = TempDir::new().unwrap();
        let mut store = store_with(&dir, "a\nb\nc\n");
        let selection = Selection::many(vec!["a".into(), "c".into()]);
        apply_to_selection(&mut store, &selection, &EditCommand::RemoveText("a".into()), today())
            .unwrap();
        assert_eq!(store.lines(), ["b", "c"]);
    }

    #[test]
    fn stale_selection_rolls_back() {
        let dir = TempDir::new().unwrap();
        let mut store = store_with(&dir, "a\nb\n");
        let result = apply_to_selection(
            &mut store,
            &Selection::many(vec!["a".into(), "gone".into()]),
            &EditCommand::ToggleToday,
            today(),
        );
        assert!(matches!(result, Err(StoreError::NotFound(_))));
        assert_eq!(store.lines(), ["a", "b"]);
    }

    #[test]
    fn compose_with_prefix_and_context_lock() {
        let mut settings = Settings::default();
        assert_eq!(compose_new_task("  buy\nbread ", &settings, "@Shop"), "buy bread");

        settings.tasks.default_prefix = "(C)".into();
        settings.search.context_lock = true;
        assert_eq!(
            compose_new_task("buy bread", &settings, "@Shop !@work +errands"),
            "(C) buy bread @Shop +errands"
        );
        assert_eq!(
            compose_new_task("buy bread @shop", &settings, "@Shop"),
            "(C) buy bread @shop"
        );
        assert_eq!(compose_new_task("   ", &settings, "@Shop"), "");
    }

    #[test]
    fn selection_memory_prefers_text_then_index() {
        let rows: Vec<String> = vec!["a".into(), "b".into(), "c".into()];
        assert_eq!(SelectionMemory::save(Some("c"), 0).restore(&rows), Some(2));
        assert_eq!(SelectionMemory::save(Some("zzz"), 9).restore(&rows), Some(2));
        assert_eq!(SelectionMemory::save(None, 1).restore(&rows), Some(1));
        assert_eq!(SelectionMemory::save(Some("a"), 0).restore(&[]), None);
    }
}
