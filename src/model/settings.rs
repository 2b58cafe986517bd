use serde::{Deserialize, Serialize};

/// Configuration from settings.toml.
///
/// Every section and field has a default, so an empty or missing file is a
/// valid configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub files: FileSettings,
    #[serde(default)]
    pub search: SearchSettings,
    #[serde(default)]
    pub view: ViewSettings,
    #[serde(default)]
    pub tasks: TaskSettings,
    #[serde(default)]
    pub colors: ColorSettings,
    #[serde(default)]
    pub fonts: FontSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSettings {
    /// Task file, relative to the settings file's directory unless absolute
    #[serde(default = "default_todo_file")]
    pub todo: String,
    /// Archive file for completed tasks
    #[serde(default = "default_archive_file")]
    pub archive: String,
}

impl Default for FileSettings {
    fn default() -> Self {
        FileSettings {
            todo: default_todo_file(),
            archive: default_archive_file(),
        }
    }
}

fn default_todo_file() -> String {
    "todo.txt".to_string()
}

fn default_archive_file() -> String {
    "done.txt".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSettings {
    /// Re-filter on every keystroke instead of on enter
    #[serde(default = "default_true")]
    pub live_update: bool,
    /// Show completed tasks too
    #[serde(default)]
    pub show_all: bool,
    /// Append the current search terms to new tasks
    #[serde(default)]
    pub context_lock: bool,
    #[serde(default)]
    pub last_search: String,
    #[serde(default)]
    pub last_context_filter: String,
}

impl SearchSettings {
    /// The saved search phrase: `last_search`, or `last_context_filter`
    /// when no search has been saved.
    pub fn saved_phrase(&self) -> &str {
        if self.last_search.trim().is_empty() {
            &self.last_context_filter
        } else {
            &self.last_search
        }
    }
}

impl Default for SearchSettings {
    fn default() -> Self {
        SearchSettings {
            live_update: true,
            show_all: false,
            context_lock: false,
            last_search: String::new(),
            last_context_filter: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewSettings {
    #[serde(default)]
    pub sort_alphabetical: bool,
    /// Hide tasks whose `t:` date is in the future (otherwise show them as inactive)
    #[serde(default = "default_true")]
    pub threshold_hides: bool,
    /// Tasks due within this many days are highlighted
    #[serde(default = "default_due_warning_days")]
    pub due_warning_days: i64,
}

impl Default for ViewSettings {
    fn default() -> Self {
        ViewSettings {
            sort_alphabetical: false,
            threshold_hides: true,
            due_warning_days: default_due_warning_days(),
        }
    }
}

fn default_due_warning_days() -> i64 {
    3
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSettings {
    /// Text put in front of every new task
    #[serde(default)]
    pub default_prefix: String,
    /// Prefix new tasks with today's date
    #[serde(default)]
    pub add_creation_date: bool,
    /// Reload when the task file changes on disk
    #[serde(default = "default_true")]
    pub auto_refresh: bool,
}

impl Default for TaskSettings {
    fn default() -> Self {
        TaskSettings {
            default_prefix: String::new(),
            add_creation_date: false,
            auto_refresh: true,
        }
    }
}

/// Row colours as `#rrggbb`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorSettings {
    #[serde(default = "default_active_color")]
    pub active: String,
    #[serde(default = "default_inactive_color")]
    pub inactive: String,
    #[serde(default = "default_due_warning_color")]
    pub due_warning: String,
    #[serde(default = "default_due_late_color")]
    pub due_late: String,
}

impl Default for ColorSettings {
    fn default() -> Self {
        ColorSettings {
            active: default_active_color(),
            inactive: default_inactive_color(),
            due_warning: default_due_warning_color(),
            due_late: default_due_late_color(),
        }
    }
}

fn default_active_color() -> String {
    "#000000".to_string()
}

fn default_inactive_color() -> String {
    "#808080".to_string()
}

fn default_due_warning_color() -> String {
    "#c08000".to_string()
}

fn default_due_late_color() -> String {
    "#c00000".to_string()
}

/// Font descriptions handed through to the front end untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FontSettings {
    #[serde(default)]
    pub active: String,
    #[serde(default)]
    pub inactive: String,
}

fn default_true() -> bool {
    true
}
