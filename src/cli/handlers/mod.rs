mod init;
pub use init::cmd_init;

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{Local, NaiveDate};
use indexmap::IndexSet;
use serde::Serialize;

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::history_io;
use crate::io::recovery::{read_recovery_entries, recovery_log_path};
use crate::io::settings_io;
use crate::io::watcher::TaskFileWatcher;
use crate::model::settings::Settings;
use crate::ops::edit::{
    EditCommand, Selection, SelectionMemory, apply_to_selection, compose_new_task, date_prefill,
};
use crate::ops::search::{SearchFilter, suggest_tags, toggle_term};
use crate::ops::store::{RetryPolicy, StoreError, StoreOptions, TaskStore};
use crate::ops::view::{ViewOptions, build_view};
use crate::parse::DateTag;

type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Options shared by every command
pub struct Globals {
    pub json: bool,
    pub settings_path: PathBuf,
    pub file: Option<PathBuf>,
    pub today: NaiveDate,
}

impl Globals {
    pub fn from_cli(cli: &Cli) -> Self {
        Globals {
            json: cli.json,
            settings_path: cli
                .settings
                .as_ref()
                .map(PathBuf::from)
                .unwrap_or_else(settings_io::settings_path),
            file: cli.file.as_ref().map(PathBuf::from),
            today: cli.today.unwrap_or_else(|| Local::now().date_naive()),
        }
    }

    /// The task file: `--file`, else `files.todo` next to the settings file
    fn task_file(&self, settings: &Settings) -> PathBuf {
        self.file
            .clone()
            .unwrap_or_else(|| settings_io::resolve_file(&self.settings_path, &settings.files.todo))
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> CmdResult {
    let g = Globals::from_cli(&cli);

    match cli.command {
        Commands::Init(args) => cmd_init(args, &g),
        Commands::Config(cmd) => cmd_config(cmd, &g),
        Commands::Recovery(cmd) => cmd_recovery(cmd, &g),

        // Read commands
        Commands::List(args) => cmd_list(args, &g),
        Commands::Tags(args) => cmd_tags(args, &g),
        Commands::Watch(args) => cmd_watch(args, &g),

        // Write commands
        Commands::Add(args) => cmd_add(args, &g),
        Commands::Rm(args) => cmd_rm(args, &g),
        Commands::Do(args) => cmd_edit_rows(&args.rows, EditCommand::ToggleDone, &g),
        Commands::Edit(args) => cmd_edit_rows(&[args.row], EditCommand::Replace(args.text.join(" ")), &g),
        Commands::Pri(args) => {
            let command = if args.down {
                EditCommand::LowerPriority
            } else {
                EditCommand::RaisePriority
            };
            cmd_edit_rows(&args.rows, command, &g)
        }
        Commands::Due(args) => cmd_date(args, DateTag::Due, &g),
        Commands::T(args) => cmd_date(args, DateTag::Threshold, &g),
        Commands::Append(args) => cmd_edit_rows(&args.rows, EditCommand::Append(args.text.join(" ")), &g),
        Commands::Strip(args) => {
            cmd_edit_rows(&args.rows, EditCommand::RemoveText(args.text.join(" ")), &g)
        }
        Commands::Today(args) => cmd_edit_rows(&args.rows, EditCommand::ToggleToday, &g),
        Commands::Archive => cmd_archive(&g),
        Commands::Undo => cmd_undo(true, &g),
        Commands::Redo => cmd_undo(false, &g),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Settings plus the opened task store
struct Session {
    settings: Settings,
    store: TaskStore,
    today: NaiveDate,
}

fn load_settings(g: &Globals) -> Result<Settings, settings_io::SettingsError> {
    settings_io::read_settings(&g.settings_path).map(|(settings, _)| settings)
}

fn open_session(g: &Globals) -> Result<Session, Box<dyn std::error::Error>> {
    let settings = load_settings(g)?;
    let path = g.task_file(&settings);
    let archive = settings_io::resolve_file(&path, &settings.files.archive);

    let mut options = StoreOptions::new(archive);
    options.add_creation_date = settings.tasks.add_creation_date;
    options.today = Some(g.today);

    let history = history_io::read_history(&path).unwrap_or_default();
    let store = TaskStore::open(path, options).with_history(history);
    Ok(Session {
        settings,
        store,
        today: g.today,
    })
}

/// Raw text of the given 1-based rows, duplicates dropped.
fn select_rows(store: &TaskStore, rows: &[usize]) -> Result<Selection, String> {
    let unique: IndexSet<usize> = rows.iter().copied().collect();
    let lines = store.lines();
    let mut picked = Vec::with_capacity(unique.len());
    for n in unique {
        let raw = n
            .checked_sub(1)
            .and_then(|i| lines.get(i))
            .ok_or_else(|| format!("no task at row {} (the list has {})", n, lines.len()))?;
        picked.push(raw.clone());
    }
    Ok(Selection::many(picked))
}

/// Save `value` under `key` if a settings file exists. Never fails the command.
fn remember_setting(g: &Globals, key: &str, value: &str) {
    if !g.settings_path.exists() {
        return;
    }
    if let Err(e) = settings_io::update_setting(&g.settings_path, key, value) {
        tracing::warn!(key, error = %e, "could not save setting");
    }
}

#[derive(Serialize)]
struct ChangedJson {
    #[serde(skip_serializing_if = "Option::is_none")]
    row: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    raw: Option<String>,
}

fn print_changed(store: &TaskStore, raw: Option<&str>, json: bool) -> CmdResult {
    let row = raw.and_then(|r| store.position(r)).map(|i| i + 1);
    if json {
        let out = ChangedJson {
            row,
            raw: raw.map(str::to_string),
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else if let (Some(row), Some(raw)) = (row, raw) {
        println!("{} {}", row, raw);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

fn cmd_list(args: ListArgs, g: &Globals) -> CmdResult {
    let session = open_session(g)?;
    let phrase = if args.last {
        session.settings.search.saved_phrase().to_string()
    } else {
        args.terms.join(" ")
    };
    if !args.last && !args.terms.is_empty() && phrase != session.settings.search.last_search {
        remember_setting(g, "search.last_search", &phrase);
    }

    let mut options = ViewOptions::from_settings(&session.settings);
    options.show_all |= args.all;
    options.sort_alphabetical |= args.sort;

    let view = build_view(
        session.store.get_all(),
        &SearchFilter::compile(&phrase),
        &options,
        session.today,
    );

    if g.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&view_to_json(&view, &session.settings))?
        );
    } else {
        for line in format_view(&view, args.width) {
            println!("{}", line);
        }
    }
    Ok(())
}

fn cmd_tags(args: TagsArgs, g: &Globals) -> CmdResult {
    let session = open_session(g)?;

    if let Some(tag) = args.toggle {
        let phrase = toggle_term(&session.settings.search.last_search, &tag);
        remember_setting(g, "search.last_search", &phrase);
        println!("{}", phrase);
        return Ok(());
    }

    let phrase = if args.terms.is_empty() {
        session.settings.search.saved_phrase().to_string()
    } else {
        args.terms.join(" ")
    };
    let view = build_view(
        session.store.get_all(),
        &SearchFilter::compile(&phrase),
        &ViewOptions::from_settings(&session.settings),
        session.today,
    );
    let suggestions = suggest_tags(view.rows.iter().map(|r| r.raw.as_str()), &phrase);

    if g.json {
        println!("{}", serde_json::to_string_pretty(&suggestions)?);
    } else {
        for s in &suggestions {
            println!("{}", s);
        }
    }
    Ok(())
}

fn cmd_watch(args: WatchArgs, g: &Globals) -> CmdResult {
    let mut session = open_session(g)?;
    if !session.settings.tasks.auto_refresh {
        return Err("auto refresh is turned off (tasks.auto_refresh = false)".into());
    }

    // without terms the saved search is followed; with live_update it is
    // re-read from the settings file on every reload
    let follow_saved = args.terms.is_empty();
    let mut phrase = if follow_saved {
        session.settings.search.saved_phrase().to_string()
    } else {
        args.terms.join(" ")
    };
    let mut filter = SearchFilter::compile(&phrase);
    let options = ViewOptions::from_settings(&session.settings);
    let watcher = TaskFileWatcher::start(session.store.path())?;
    let changes = session.store.subscribe();

    let mut view = build_view(session.store.get_all(), &filter, &options, session.today);
    println!("-- {}", format_summary(&view));
    for line in format_view(&view, None) {
        println!("{}", line);
    }

    let mut reloads = 0;
    while args.count.is_none_or(|n| reloads < n) {
        if watcher.wait(Duration::from_secs(1)).is_empty() {
            continue;
        }

        let memory = SelectionMemory::save(
            view.rows.first().map(|r| r.raw.as_str()),
            view.rows.first().map_or(0, |r| r.row),
        );
        session.store.refresh_with_retry(RetryPolicy::default());
        for notice in changes.try_iter() {
            tracing::debug!(kind = ?notice.kind, "store changed");
        }
        if let Err(e) = session.store.save_history() {
            tracing::warn!(error = %e, "could not save history");
        }

        if follow_saved && session.settings.search.live_update {
            match load_settings(g) {
                Ok(settings) if settings.search.saved_phrase() != phrase => {
                    phrase = settings.search.saved_phrase().to_string();
                    filter = SearchFilter::compile(&phrase);
                    tracing::debug!(%phrase, "saved search changed");
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "could not re-read settings"),
            }
        }

        view = build_view(session.store.get_all(), &filter, &options, session.today);
        match memory.restore(session.store.lines()) {
            Some(idx) => println!("-- {} (focus: row {})", format_summary(&view), idx + 1),
            None => println!("-- {}", format_summary(&view)),
        }
        for line in format_view(&view, None) {
            println!("{}", line);
        }
        reloads += 1;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Write commands
// ---------------------------------------------------------------------------

fn cmd_add(args: AddArgs, g: &Globals) -> CmdResult {
    let mut session = open_session(g)?;
    let input = args.text.join(" ");
    let text = compose_new_task(&input, &session.settings, session.settings.search.saved_phrase());
    let Some(raw) = session.store.add(&text)? else {
        return Err("nothing to add: the task text is empty".into());
    };
    session.store.save_history()?;
    print_changed(&session.store, Some(&raw), g.json)
}

fn cmd_rm(args: RowsArgs, g: &Globals) -> CmdResult {
    let mut session = open_session(g)?;
    let selection = select_rows(&session.store, &args.rows)?;
    session.store.batch(|store| -> Result<(), StoreError> {
        for raw in &selection.rows {
            store.remove(raw)?;
        }
        Ok(())
    })?;
    session.store.save_history()?;
    if !g.json {
        let n = selection.rows.len();
        println!("removed {} task{}", n, if n == 1 { "" } else { "s" });
    }
    Ok(())
}

fn cmd_edit_rows(rows: &[usize], command: EditCommand, g: &Globals) -> CmdResult {
    let mut session = open_session(g)?;
    let selection = select_rows(&session.store, rows)?;
    let focus = apply_to_selection(&mut session.store, &selection, &command, session.today)?;
    session.store.save_history()?;
    print_changed(&session.store, focus.as_deref(), g.json)
}

fn cmd_date(args: DateArgs, tag: DateTag, g: &Globals) -> CmdResult {
    let value = match (args.set, args.clear) {
        (Some(value), _) => value,
        (None, true) => String::new(),
        (None, false) => {
            // no change requested: show what a date prompt would start with
            let session = open_session(g)?;
            let selection = select_rows(&session.store, &args.rows)?;
            for raw in &selection.rows {
                println!("{}", date_prefill(raw, tag, session.today));
            }
            return Ok(());
        }
    };
    let command = match tag {
        DateTag::Due => EditCommand::SetDue(value),
        DateTag::Threshold => EditCommand::SetThreshold(value),
    };
    cmd_edit_rows(&args.rows, command, g)
}

fn cmd_archive(g: &Globals) -> CmdResult {
    let mut session = open_session(g)?;
    let moved = session.store.archive()?;
    session.store.save_history()?;
    if g.json {
        println!("{}", serde_json::json!({ "archived": moved }));
    } else {
        println!(
            "archived {} task{} to {}",
            moved,
            if moved == 1 { "" } else { "s" },
            session.store.archive_path().display()
        );
    }
    Ok(())
}

fn cmd_undo(undo: bool, g: &Globals) -> CmdResult {
    let mut session = open_session(g)?;
    let moved = if undo {
        session.store.undo()?
    } else {
        session.store.redo()?
    };
    if moved {
        session.store.save_history()?;
    }
    if g.json {
        println!("{}", serde_json::json!({ "changed": moved }));
    } else if moved {
        println!("{} ({} tasks)", if undo { "undone" } else { "redone" }, session.store.count());
    } else {
        println!("nothing to {}", if undo { "undo" } else { "redo" });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Settings and recovery
// ---------------------------------------------------------------------------

fn cmd_config(cmd: ConfigCmd, g: &Globals) -> CmdResult {
    match cmd.action {
        ConfigAction::Get(args) => {
            let settings = load_settings(g)?;
            println!("{}", settings_io::get_value(&settings, &args.key)?);
        }
        ConfigAction::Set(args) => {
            settings_io::update_setting(&g.settings_path, &args.key, &args.value)?;
        }
        ConfigAction::Path => println!("{}", g.settings_path.display()),
    }
    Ok(())
}

fn cmd_recovery(cmd: RecoveryCmd, g: &Globals) -> CmdResult {
    let settings = load_settings(g)?;
    let task_file = g.task_file(&settings);

    if let Some(RecoveryAction::Path) = cmd.action {
        println!("{}", absolute(&recovery_log_path(&task_file)).display());
        return Ok(());
    }

    let entries = read_recovery_entries(&task_file, Some(cmd.limit.unwrap_or(10)));
    if g.json {
        let out: Vec<_> = entries.iter().map(recovery_to_json).collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else if entries.is_empty() {
        println!("recovery log is empty");
    } else {
        for (i, entry) in entries.iter().enumerate() {
            if i > 0 {
                println!();
            }
            for line in format_recovery_entry(entry) {
                println!("{}", line);
            }
        }
    }
    Ok(())
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
