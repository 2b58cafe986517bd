pub mod history_io;
pub mod recovery;
pub mod settings_io;
pub mod task_file;
pub mod watcher;
