use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

/// Events sent from the file watcher to the command loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEvent {
    /// The task file was created, modified or removed on disk.
    Changed(PathBuf),
}

/// Watches a single task file for changes made by other programs.
///
/// Editors commonly replace files by renaming a temp file over them, so the
/// parent directory is watched and events are filtered on the file name.
pub struct TaskFileWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<FileEvent>,
}

impl TaskFileWatcher {
    /// Start watching `task_file`.
    pub fn start(task_file: &Path) -> Result<Self, notify::Error> {
        let (tx, rx) = mpsc::channel();
        let target: OsString = task_file
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        let dir = match task_file.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut watcher = RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| {
                let event = match result {
                    Ok(e) => e,
                    Err(e) => {
                        tracing::warn!(error = %e, "file watcher error");
                        return;
                    }
                };

                match event.kind {
                    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {}
                    _ => return,
                }

                if let Some(path) = event
                    .paths
                    .into_iter()
                    .find(|p| p.file_name() == Some(target.as_os_str()))
                {
                    let _ = tx.send(FileEvent::Changed(path));
                }
            },
            Config::default(),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        tracing::debug!(dir = %dir.display(), "watching for task file changes");
        Ok(TaskFileWatcher {
            _watcher: watcher,
            rx,
        })
    }

    /// Non-blocking poll for pending file events.
    /// Returns all queued events (may be empty).
    pub fn poll(&self) -> Vec<FileEvent> {
        let mut events = Vec::new();
        while let Ok(evt) = self.rx.try_recv() {
            events.push(evt);
        }
        events
    }

    /// Block until an event arrives or `timeout` passes, then drain the
    /// queue so a burst of writes collapses into one batch.
    pub fn wait(&self, timeout: Duration) -> Vec<FileEvent> {
        match self.rx.recv_timeout(timeout) {
            Ok(first) => {
                let mut events = vec![first];
                events.extend(self.poll());
                events
            }
            Err(_) => Vec::new(),
        }
    }
}
