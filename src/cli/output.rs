use serde::Serialize;

use crate::io::recovery::RecoveryEntry;
use crate::model::settings::Settings;
use crate::ops::view::{RowStyle, View, ViewRow};
use crate::util::unicode::{display_width, pad_to_width, truncate_to_width};

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct RowJson {
    /// 1-based line number in the task file
    pub row: usize,
    pub raw: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_in: Option<i64>,
    pub inactive: bool,
    pub style: RowStyle,
    pub color: String,
}

#[derive(Serialize)]
pub struct ListJson {
    pub shown: usize,
    pub total: usize,
    pub rows: Vec<RowJson>,
}

#[derive(Serialize)]
pub struct RecoveryEntryJson {
    pub timestamp: String,
    pub category: String,
    pub description: String,
    pub fields: Vec<(String, String)>,
    pub body: String,
}

pub fn row_to_json(row: &ViewRow, settings: &Settings) -> RowJson {
    RowJson {
        row: row.row + 1,
        raw: row.raw.clone(),
        text: row.text.clone(),
        due_in: row.due_in,
        inactive: row.inactive,
        style: row.style,
        color: row.style.color(settings).to_string(),
    }
}

pub fn view_to_json(view: &View, settings: &Settings) -> ListJson {
    ListJson {
        shown: view.rows.len(),
        total: view.total,
        rows: view.rows.iter().map(|r| row_to_json(r, settings)).collect(),
    }
}

pub fn recovery_to_json(entry: &RecoveryEntry) -> RecoveryEntryJson {
    RecoveryEntryJson {
        timestamp: entry.timestamp.to_rfc3339(),
        category: entry.category.to_string(),
        description: entry.description.clone(),
        fields: entry.fields.clone(),
        body: entry.body.clone(),
    }
}

// ---------------------------------------------------------------------------
// Text formatting
// ---------------------------------------------------------------------------

fn style_marker(row: &ViewRow) -> &'static str {
    match row.style {
        RowStyle::Done => "x",
        RowStyle::Late => "!",
        RowStyle::DueSoon => "~",
        RowStyle::Inactive => "-",
        RowStyle::Active => " ",
    }
}

/// Format the rows of a view, one per line: row number, style marker, text.
/// With `width`, lines are cut to fit that many columns.
pub fn format_view(view: &View, width: Option<usize>) -> Vec<String> {
    let num_width = view
        .rows
        .iter()
        .map(|r| display_width(&(r.row + 1).to_string()))
        .max()
        .unwrap_or(1);

    view.rows
        .iter()
        .map(|r| {
            let number = pad_to_width(&(r.row + 1).to_string(), num_width, true);
            let line = format!("{} {} {}", number, style_marker(r), r.text);
            match width {
                Some(w) => truncate_to_width(&line, w),
                None => line,
            }
        })
        .collect()
}

/// `3 of 7 tasks`
pub fn format_summary(view: &View) -> String {
    let noun = if view.total == 1 { "task" } else { "tasks" };
    format!("{} of {} {}", view.rows.len(), view.total, noun)
}

pub fn format_recovery_entry(entry: &RecoveryEntry) -> Vec<String> {
    let mut lines = vec![format!(
        "{}  {}: {}",
        entry.timestamp.format("%Y-%m-%d %H:%M"),
        entry.category,
        entry.description
    )];
    for (key, value) in &entry.fields {
        lines.push(format!("  {}: {}", key, value));
    }
    for body_line in entry.body.lines() {
        lines.push(format!("  | {}", body_line));
    }
    lines
}
