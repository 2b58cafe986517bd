use chrono::NaiveDate;
use serde::Serialize;

use crate::model::settings::Settings;
use crate::model::task::{DateValue, TaskLine};
use crate::ops::search::SearchFilter;
use crate::parse::pretty_print;

/// How a row should be drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowStyle {
    /// Due today or earlier
    Late,
    /// Due within the warning window
    DueSoon,
    /// Threshold date still in the future
    Inactive,
    Active,
    Done,
}

impl RowStyle {
    pub fn color(self, settings: &Settings) -> &str {
        let colors = &settings.colors;
        match self {
            RowStyle::Late => &colors.due_late,
            RowStyle::DueSoon => &colors.due_warning,
            RowStyle::Inactive | RowStyle::Done => &colors.inactive,
            RowStyle::Active => &colors.active,
        }
    }

    pub fn font(self, settings: &Settings) -> &str {
        match self {
            RowStyle::Inactive | RowStyle::Done => &settings.fonts.inactive,
            _ => &settings.fonts.active,
        }
    }
}

/// Settings that shape the view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewOptions {
    pub show_all: bool,
    pub threshold_hides: bool,
    pub sort_alphabetical: bool,
    pub due_warning_days: i64,
}

impl ViewOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        ViewOptions {
            show_all: settings.search.show_all,
            threshold_hides: settings.view.threshold_hides,
            sort_alphabetical: settings.view.sort_alphabetical,
            due_warning_days: settings.view.due_warning_days,
        }
    }
}

impl Default for ViewOptions {
    fn default() -> Self {
        ViewOptions::from_settings(&Settings::default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewRow {
    /// Index into the store's rows
    pub row: usize,
    pub raw: String,
    /// Display text, see [`pretty_print`]
    pub text: String,
    /// Days until due; negative when late
    pub due_in: Option<i64>,
    pub inactive: bool,
    pub style: RowStyle,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct View {
    pub rows: Vec<ViewRow>,
    /// Rows in the store, shown or not
    pub total: usize,
}

/// Relative dates in the file count from the task's creation date when it
/// has one, otherwise from today.
fn resolve_on(value: Option<DateValue>, task: &TaskLine, today: NaiveDate) -> Option<NaiveDate> {
    let anchor = task.fields().creation_date.unwrap_or(today);
    value?.resolve(anchor)
}

/// Filter, classify and order `rows` for display.
pub fn build_view(
    rows: &[TaskLine],
    filter: &SearchFilter,
    options: &ViewOptions,
    today: NaiveDate,
) -> View {
    let mut shown: Vec<ViewRow> = Vec::new();

    for (idx, task) in rows.iter().enumerate() {
        let done = task.is_completed();
        if done && !options.show_all {
            continue;
        }
        if !filter.matches(task.raw()) {
            continue;
        }

        let inactive = !done
            && resolve_on(task.threshold(), task, today).is_some_and(|t| t > today);
        if inactive && options.threshold_hides && !options.show_all {
            continue;
        }

        let due_in = resolve_on(task.due(), task, today).map(|d| (d - today).num_days());
        let style = if done {
            RowStyle::Done
        } else if due_in.is_some_and(|d| d <= 0) {
            RowStyle::Late
        } else if due_in.is_some_and(|d| d <= options.due_warning_days) {
            RowStyle::DueSoon
        } else if inactive {
            RowStyle::Inactive
        } else {
            RowStyle::Active
        };

        shown.push(ViewRow {
            row: idx,
            raw: task.raw().to_string(),
            text: pretty_print(task.raw()),
            due_in,
            inactive,
            style,
        });
    }

    if options.sort_alphabetical {
        shown.sort_by_cached_key(|r| (r.style == RowStyle::Done, r.text.to_lowercase()));
    }

    View {
        rows: shown,
        total: rows.len(),
    }
}
