use std::fs;
use std::path::{Path, PathBuf};

use crate::io::recovery::atomic_write;
use crate::ops::history::HistoryLog;

/// Error type for the history sidecar file
#[derive(Debug, thiserror::Error)]
pub enum HistoryIoError {
    #[error("history io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("history json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The history sidecar sits next to the task file: `todo.txt` keeps its
/// history in `.todo.txt.history.json`.
pub fn history_path(task_file: &Path) -> PathBuf {
    let name = task_file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "todo.txt".to_string());
    let dir = task_file.parent().unwrap_or(Path::new("."));
    dir.join(format!(".{}.history.json", name))
}

/// Read the saved history for `task_file`. A missing or malformed sidecar
/// yields None; the caller starts a fresh log.
pub fn read_history(task_file: &Path) -> Option<HistoryLog> {
    let path = history_path(task_file);
    let content = fs::read_to_string(&path).ok()?;
    match serde_json::from_str::<HistoryLog>(&content) {
        Ok(mut log) => {
            log.clamp_cursor();
            Some(log)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring malformed history file");
            None
        }
    }
}

/// Write the history sidecar for `task_file`.
pub fn write_history(task_file: &Path, log: &HistoryLog) -> Result<(), HistoryIoError> {
    let path = history_path(task_file);
    let content = serde_json::to_string(log)?;
    atomic_write(&path, content.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_and_read_round_trip() {
        let dir = TempDir::new().unwrap();
        let task_file = dir.path().join("todo.txt");
        let mut log = HistoryLog::with_initial("a\n");
        log.record("a\nb\n");
        log.undo();

        write_history(&task_file, &log).unwrap();
        assert!(dir.path().join(".todo.txt.history.json").exists());

        let loaded = read_history(&task_file).unwrap();
        assert_eq!(loaded, log);
        assert_eq!(loaded.cursor(), 0);
        assert!(loaded.redo_possible());
    }

    #[test]
    fn read_missing_file_returns_none() {
        let dir = TempDir::new().unwrap();
        assert!(read_history(&dir.path().join("todo.txt")).is_none());
    }

    #[test]
    fn read_malformed_json_returns_none() {
        let dir = TempDir::new().unwrap();
        let task_file = dir.path().join("todo.txt");
        fs::write(history_path(&task_file), "not json {{{").unwrap();
        assert!(read_history(&task_file).is_none());
    }
}
