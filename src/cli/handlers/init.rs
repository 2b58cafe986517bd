use std::fs;

use super::Globals;
use crate::cli::commands::InitArgs;
use crate::io::recovery::atomic_write;
use crate::io::settings_io;
use crate::io::task_file;

const SETTINGS_TEMPLATE: &str = r##"# todour settings
# Change values here or with: td config set <section.key> <value>

[files]
# task file, relative to this file unless absolute
todo = "todo.txt"
# completed tasks are moved here by `td archive`
archive = "done.txt"

[search]
live_update = true
# include completed tasks in lists
show_all = false
# append the saved search words to new tasks
context_lock = false
last_search = ""
last_context_filter = ""

[view]
sort_alphabetical = false
# hide tasks whose t: date is still in the future
threshold_hides = true
due_warning_days = 3

[tasks]
# put in front of every new task, e.g. "(C) "
default_prefix = ""
add_creation_date = false
auto_refresh = true

[colors]
active = "#000000"
inactive = "#808080"
due_warning = "#c08000"
due_late = "#c00000"

[fonts]
active = ""
inactive = ""
"##;

pub fn cmd_init(args: InitArgs, g: &Globals) -> Result<(), Box<dyn std::error::Error>> {
    let settings_path = &g.settings_path;
    if settings_path.exists() && !args.force {
        return Err(format!(
            "settings already exist at {} (use --force to overwrite)",
            settings_path.display()
        )
        .into());
    }

    if let Some(dir) = settings_path.parent()
        && !dir.as_os_str().is_empty()
    {
        fs::create_dir_all(dir)?;
    }
    atomic_write(settings_path, SETTINGS_TEMPLATE.as_bytes())?;
    println!("wrote {}", settings_path.display());

    let (settings, _) = settings_io::read_settings(settings_path)?;
    let todo = g.task_file(&settings);
    if task_file::ensure_exists(&todo)? {
        println!("created {}", todo.display());
    }
    Ok(())
}
