use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "td", about = concat!("todour v", env!("CARGO_PKG_VERSION"), " - a todo.txt list"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Settings file (default: $XDG_CONFIG_HOME/todour/settings.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub settings: Option<String>,

    /// Task file to use instead of the one named in settings
    #[arg(short = 'f', long, global = true, value_name = "PATH")]
    pub file: Option<String>,

    /// Pretend today is this date (YYYY-MM-DD)
    #[arg(long, global = true, hide = true)]
    pub today: Option<NaiveDate>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the settings file and an empty task file
    Init(InitArgs),
    /// List tasks, optionally filtered by a search phrase
    List(ListArgs),
    /// Add a task
    Add(AddArgs),
    /// Delete tasks
    Rm(RowsArgs),
    /// Toggle tasks done / not done
    Do(RowsArgs),
    /// Replace the text of a task
    Edit(EditArgs),
    /// Raise (or with --down, lower) priority
    Pri(PriArgs),
    /// Set, clear or show the due date
    Due(DateArgs),
    /// Set, clear or show the threshold date
    T(DateArgs),
    /// Append text to tasks
    Append(TextArgs),
    /// Remove text from tasks
    Strip(TextArgs),
    /// Toggle @today on tasks
    Today(RowsArgs),
    /// Move completed tasks to the archive file
    Archive,
    /// Undo the last change
    Undo,
    /// Redo the last undone change
    Redo,
    /// Suggest quick-filter tags, or toggle one in the saved search
    Tags(TagsArgs),
    /// Print the list again whenever the task file changes
    Watch(WatchArgs),
    /// Read or change settings
    Config(ConfigCmd),
    /// View the recovery log
    Recovery(RecoveryCmd),
}

// ---------------------------------------------------------------------------
// Setup
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct InitArgs {
    /// Overwrite an existing settings file
    #[arg(long)]
    pub force: bool,
}

// ---------------------------------------------------------------------------
// Read command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ListArgs {
    /// Search terms; prefix a term with ! to exclude it
    #[arg(allow_hyphen_values = true)]
    pub terms: Vec<String>,
    /// Use the saved search instead of TERMS
    #[arg(long, conflicts_with = "terms")]
    pub last: bool,
    /// Include completed tasks
    #[arg(short, long)]
    pub all: bool,
    /// Sort alphabetically
    #[arg(long)]
    pub sort: bool,
    /// Truncate lines to this many columns
    #[arg(long)]
    pub width: Option<usize>,
}

#[derive(Args)]
pub struct TagsArgs {
    /// Search phrase the suggestions are for (default: the saved search)
    #[arg(allow_hyphen_values = true)]
    pub terms: Vec<String>,
    /// Cycle this tag in the saved search: add, negate, remove
    #[arg(long, value_name = "TAG")]
    pub toggle: Option<String>,
}

#[derive(Args)]
pub struct WatchArgs {
    /// Search terms for the printed list (default: the saved search)
    #[arg(allow_hyphen_values = true)]
    pub terms: Vec<String>,
    /// Stop after this many reloads
    #[arg(long)]
    pub count: Option<usize>,
}

// ---------------------------------------------------------------------------
// Write command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct AddArgs {
    /// Task text
    #[arg(required = true, allow_hyphen_values = true)]
    pub text: Vec<String>,
}

/// Row numbers as shown by `td list`
#[derive(Args)]
pub struct RowsArgs {
    /// Row numbers (e.g. 3 or 1,4,5)
    #[arg(required = true, value_delimiter = ',')]
    pub rows: Vec<usize>,
}

#[derive(Args)]
pub struct EditArgs {
    /// Row number
    pub row: usize,
    /// New text
    #[arg(required = true, allow_hyphen_values = true)]
    pub text: Vec<String>,
}

#[derive(Args)]
pub struct PriArgs {
    /// Row numbers (e.g. 3 or 1,4,5)
    #[arg(required = true, value_delimiter = ',')]
    pub rows: Vec<usize>,
    /// Lower instead of raise
    #[arg(long)]
    pub down: bool,
}

#[derive(Args)]
pub struct DateArgs {
    /// Row numbers (e.g. 3 or 1,4,5)
    #[arg(required = true, value_delimiter = ',')]
    pub rows: Vec<usize>,
    /// YYYY-MM-DD or an offset like 3d, 2w, 1m, 1y, 5b
    #[arg(long, conflicts_with = "clear")]
    pub set: Option<String>,
    /// Remove the date
    #[arg(long)]
    pub clear: bool,
}

#[derive(Args)]
pub struct TextArgs {
    /// Row numbers (e.g. 3 or 1,4,5)
    #[arg(required = true, value_delimiter = ',')]
    pub rows: Vec<usize>,
    /// Text to append or remove
    #[arg(required = true, last = true)]
    pub text: Vec<String>,
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ConfigCmd {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print one setting (section.key)
    Get(ConfigGetArgs),
    /// Change one setting (section.key value)
    Set(ConfigSetArgs),
    /// Print the settings file path
    Path,
}

#[derive(Args)]
pub struct ConfigGetArgs {
    pub key: String,
}

#[derive(Args)]
pub struct ConfigSetArgs {
    pub key: String,
    #[arg(allow_hyphen_values = true)]
    pub value: String,
}

// ---------------------------------------------------------------------------
// Recovery log
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct RecoveryCmd {
    #[command(subcommand)]
    pub action: Option<RecoveryAction>,
    /// Maximum number of entries to show (default: 10)
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Subcommand)]
pub enum RecoveryAction {
    /// Print the path to the recovery log
    Path,
}
