use std::cell::OnceCell;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use chrono::{Local, NaiveDate};

use crate::io::history_io::{HistoryIoError, write_history};
use crate::io::recovery::{RecoveryCategory, RecoveryEntry, log_recovery};
use crate::io::task_file::{self, TaskFileError};
use crate::model::task::TaskLine;
use crate::ops::history::HistoryLog;
use crate::parse::{join_lines, set_completed, split_lines, strip_newlines, with_creation_date};

/// Error type for task store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("task not found: {0}")]
    NotFound(String),
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write {path}: {source} (unsaved tasks kept in the recovery log)")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not save history: {0}")]
    History(#[from] HistoryIoError),
}

impl From<TaskFileError> for StoreError {
    fn from(e: TaskFileError) -> Self {
        match e {
            TaskFileError::ReadError { path, source } => StoreError::Read { path, source },
            TaskFileError::WriteError { path, source } => StoreError::Write { path, source },
        }
    }
}

/// What kind of change a notification reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Removed,
    Updated,
    Archived,
    Reloaded,
    Undo,
    Redo,
    /// Several edits committed together by [`TaskStore::batch`]
    Batch,
}

/// Sent to subscribers after every committed change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotice {
    pub kind: ChangeKind,
    /// Raw text of the affected row after the change, for restoring the
    /// selection. None when the change has no single surviving row.
    pub row: Option<String>,
}

/// Retry schedule for reloading a file that reads as empty.
///
/// Another program may have truncated the file and not yet written the new
/// content. Each retry waits twice as long as the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            attempts: 3,
            initial_delay: Duration::from_millis(250),
        }
    }
}

/// Options for opening a store
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub archive: PathBuf,
    /// Prefix new tasks with today's date
    pub add_creation_date: bool,
    /// Fixed "today"; None means the local date at the time of each edit
    pub today: Option<NaiveDate>,
}

impl StoreOptions {
    pub fn new(archive: impl Into<PathBuf>) -> Self {
        StoreOptions {
            archive: archive.into(),
            add_creation_date: false,
            today: None,
        }
    }
}

/// Parsed rows, built lazily from the raw lines and dropped on every change.
#[derive(Debug, Default)]
pub struct RowCache {
    rows: OnceCell<Vec<TaskLine>>,
}

impl RowCache {
    pub fn invalidate(&mut self) {
        self.rows.take();
    }

    pub fn ensure_loaded(&self, lines: &[String]) -> &[TaskLine] {
        self.rows
            .get_or_init(|| lines.iter().map(|l| TaskLine::new(l.as_str())).collect())
    }

    pub fn is_loaded(&self) -> bool {
        self.rows.get().is_some()
    }
}

#[derive(Debug, Default)]
struct PendingBatch {
    dirty: bool,
    row: Option<String>,
}

/// The ordered task lines of one file, kept in step with the file on disk.
///
/// Every mutation persists immediately (temp file + rename), records an
/// undo snapshot and notifies subscribers, unless it runs inside
/// [`TaskStore::batch`], which does all three once at the end.
#[derive(Debug)]
pub struct TaskStore {
    path: PathBuf,
    options: StoreOptions,
    lines: Vec<String>,
    cache: RowCache,
    history: HistoryLog,
    subscribers: Vec<mpsc::Sender<ChangeNotice>>,
    batch: Option<PendingBatch>,
}

impl TaskStore {
    /// Open the task file at `path`. A missing or unreadable file gives an
    /// empty store; the problem is logged, not returned.
    pub fn open(path: impl Into<PathBuf>, options: StoreOptions) -> Self {
        let path = path.into();
        let lines = load_or_empty(&path);
        tracing::debug!(path = %path.display(), rows = lines.len(), "opened task file");
        let history = HistoryLog::with_initial(join_lines(&lines));
        TaskStore {
            path,
            options,
            lines,
            cache: RowCache::default(),
            history,
            subscribers: Vec::new(),
            batch: None,
        }
    }

    /// Continue a previously saved history. If the file was edited outside
    /// the log since then, its current content becomes a new snapshot so an
    /// undo steps back over the outside edit instead of losing it.
    pub fn with_history(mut self, mut history: HistoryLog) -> Self {
        if history.record(join_lines(&self.lines)) {
            tracing::debug!("file changed outside the history log, recorded new snapshot");
        }
        self.history = history;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn archive_path(&self) -> &Path {
        &self.options.archive
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    /// Write the history log to its sidecar file next to the task file.
    pub fn save_history(&self) -> Result<(), StoreError> {
        write_history(&self.path, &self.history)?;
        Ok(())
    }

    fn today(&self) -> NaiveDate {
        self.options
            .today
            .unwrap_or_else(|| Local::now().date_naive())
    }

    /// Receive a [`ChangeNotice`] for every committed change from now on.
    pub fn subscribe(&mut self) -> mpsc::Receiver<ChangeNotice> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn get_all(&self) -> &[TaskLine] {
        self.cache.ensure_loaded(&self.lines)
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn count(&self) -> usize {
        self.lines.len()
    }

    pub fn position(&self, identity: &str) -> Option<usize> {
        self.lines.iter().position(|l| l == identity)
    }

    pub fn content(&self) -> String {
        join_lines(&self.lines)
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Append a new task. Line breaks become spaces and a blank task is
    /// ignored. Returns the raw text that was stored.
    pub fn add(&mut self, text: &str) -> Result<Option<String>, StoreError> {
        let text = strip_newlines(text);
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        let raw = if self.options.add_creation_date {
            with_creation_date(text, self.today())
        } else {
            text.to_string()
        };
        self.lines.push(raw.clone());
        self.commit(ChangeKind::Added, Some(raw.clone()))?;
        Ok(Some(raw))
    }

    /// Delete the first row whose raw text is `identity`.
    pub fn remove(&mut self, identity: &str) -> Result<(), StoreError> {
        let idx = self.find(identity)?;
        self.lines.remove(idx);
        self.commit(ChangeKind::Removed, None)
    }

    /// Replace the row `old_identity` with `new_text` in the given completion
    /// state. Blank `new_text` removes the row. Returns the new raw text.
    pub fn update(
        &mut self,
        old_identity: &str,
        completed: bool,
        new_text: &str,
    ) -> Result<Option<String>, StoreError> {
        let idx = self.find(old_identity)?;
        self.update_at(idx, completed, new_text)
    }

    /// [`update`](Self::update) for the row at `idx`. Used when several
    /// rows are edited in one batch and an earlier edit may have produced
    /// the text of a later row.
    pub fn update_at(
        &mut self,
        idx: usize,
        completed: bool,
        new_text: &str,
    ) -> Result<Option<String>, StoreError> {
        if idx >= self.lines.len() {
            return Err(StoreError::NotFound(format!("row {}", idx + 1)));
        }
        let text = strip_newlines(new_text);
        let text = text.trim();
        if text.is_empty() {
            self.lines.remove(idx);
            self.commit(ChangeKind::Removed, None)?;
            return Ok(None);
        }
        let raw = set_completed(text, completed, self.today());
        if self.lines[idx] == raw {
            return Ok(Some(raw));
        }
        self.lines[idx] = raw.clone();
        self.commit(ChangeKind::Updated, Some(raw.clone()))?;
        Ok(Some(raw))
    }

    /// Flip the completion state of the row `identity`.
    pub fn toggle_row(&mut self, identity: &str) -> Result<Option<String>, StoreError> {
        let done = TaskLine::new(identity).is_completed();
        self.update(identity, !done, identity)
    }

    /// Move every completed row to the end of the archive file.
    ///
    /// The archive is written before the task file. If the second write
    /// fails the archived rows exist in both files, never in neither.
    /// Returns the number of rows moved.
    pub fn archive(&mut self) -> Result<usize, StoreError> {
        let (done, keep): (Vec<String>, Vec<String>) = self
            .lines
            .iter()
            .cloned()
            .partition(|l| TaskLine::new(l.as_str()).is_completed());
        if done.is_empty() {
            return Ok(0);
        }

        if let Err(e) = task_file::append_lines(&self.options.archive, &done) {
            log_recovery(
                &self.path,
                RecoveryEntry::new(RecoveryCategory::Archive, "archive write failed", join_lines(&done))
                    .with_field("Archive", self.options.archive.display().to_string()),
            );
            return Err(e.into());
        }

        let moved = done.len();
        self.lines = keep;
        self.commit(ChangeKind::Archived, None)?;
        tracing::debug!(rows = moved, archive = %self.options.archive.display(), "archived completed tasks");
        Ok(moved)
    }

    /// Re-read the task file, discarding in-memory state.
    pub fn refresh(&mut self) -> usize {
        self.refresh_with_retry(RetryPolicy {
            attempts: 0,
            initial_delay: Duration::ZERO,
        })
    }

    /// Reload after an outside change. An empty read is retried with
    /// exponential backoff before it is accepted as real. Returns the
    /// number of rows loaded.
    pub fn refresh_with_retry(&mut self, policy: RetryPolicy) -> usize {
        let mut lines = load_or_empty(&self.path);
        let mut delay = policy.initial_delay;
        let mut attempt = 0;
        while lines.is_empty() && attempt < policy.attempts {
            attempt += 1;
            tracing::warn!(attempt, delay_ms = delay.as_millis() as u64, "task file read empty, retrying");
            std::thread::sleep(delay);
            delay = delay.saturating_mul(2);
            lines = load_or_empty(&self.path);
        }
        self.lines = lines;
        self.cache.invalidate();
        if self.history.record(join_lines(&self.lines)) {
            tracing::debug!("outside change recorded in history");
        }
        self.notify(ChangeKind::Reloaded, None);
        self.lines.len()
    }

    // -----------------------------------------------------------------------
    // Undo / redo
    // -----------------------------------------------------------------------

    pub fn undo_possible(&self) -> bool {
        self.history.undo_possible()
    }

    pub fn redo_possible(&self) -> bool {
        self.history.redo_possible()
    }

    /// Restore the previous snapshot. Returns false when there is none.
    pub fn undo(&mut self) -> Result<bool, StoreError> {
        let Some(snapshot) = self.history.undo().map(str::to_string) else {
            return Ok(false);
        };
        if let Err(e) = self.apply_snapshot(&snapshot) {
            self.history.redo();
            return Err(e);
        }
        self.notify(ChangeKind::Undo, None);
        Ok(true)
    }

    /// Re-apply the next snapshot. Returns false when there is none.
    pub fn redo(&mut self) -> Result<bool, StoreError> {
        let Some(snapshot) = self.history.redo().map(str::to_string) else {
            return Ok(false);
        };
        if let Err(e) = self.apply_snapshot(&snapshot) {
            self.history.undo();
            return Err(e);
        }
        self.notify(ChangeKind::Redo, None);
        Ok(true)
    }

    fn apply_snapshot(&mut self, content: &str) -> Result<(), StoreError> {
        if let Err(e) = task_file::write_content(&self.path, content) {
            log_recovery(
                &self.path,
                RecoveryEntry::new(RecoveryCategory::Undo, "restoring snapshot failed", content.to_string())
                    .with_field("Target", self.path.display().to_string()),
            );
            return Err(e.into());
        }
        self.lines = split_lines(content);
        self.cache.invalidate();
        tracing::debug!(cursor = self.history.cursor(), "applied history snapshot");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Batching
    // -----------------------------------------------------------------------

    /// Run several edits as one.
    ///
    /// Inside `f`, mutations only change the in-memory lines. When `f`
    /// succeeds the file is written once, one snapshot is recorded and one
    /// notification is sent (if anything changed). When `f` fails the lines
    /// are put back as they were and nothing is written or sent. A batch
    /// started inside another batch joins the outer one.
    pub fn batch<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut TaskStore) -> Result<T, E>,
        E: From<StoreError>,
    {
        if self.batch.is_some() {
            return f(self);
        }

        let before = self.lines.clone();
        self.batch = Some(PendingBatch::default());
        let result = f(self);
        let pending = self.batch.take().unwrap_or_default();

        match result {
            Ok(value) => {
                if pending.dirty {
                    self.persist()?;
                    self.history.record(join_lines(&self.lines));
                    self.notify(ChangeKind::Batch, pending.row);
                }
                Ok(value)
            }
            Err(e) => {
                self.lines = before;
                self.cache.invalidate();
                Err(e)
            }
        }
    }

    pub fn in_batch(&self) -> bool {
        self.batch.is_some()
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn find(&self, identity: &str) -> Result<usize, StoreError> {
        self.position(identity)
            .ok_or_else(|| StoreError::NotFound(identity.to_string()))
    }

    fn commit(&mut self, kind: ChangeKind, row: Option<String>) -> Result<(), StoreError> {
        self.cache.invalidate();
        if let Some(pending) = self.batch.as_mut() {
            pending.dirty = true;
            if row.is_some() {
                pending.row = row;
            }
            return Ok(());
        }
        self.persist()?;
        self.history.record(join_lines(&self.lines));
        self.notify(kind, row);
        Ok(())
    }

    /// Write the lines to disk. On failure the content goes to the recovery
    /// log and the in-memory lines are kept.
    fn persist(&self) -> Result<(), StoreError> {
        match task_file::write_lines(&self.path, &self.lines) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), rows = self.lines.len(), "saved task file");
                Ok(())
            }
            Err(e) => {
                log_recovery(
                    &self.path,
                    RecoveryEntry::new(RecoveryCategory::Write, "saving task file failed", self.content())
                        .with_field("Target", self.path.display().to_string())
                        .with_field("Error", e.to_string()),
                );
                Err(e.into())
            }
        }
    }

    fn notify(&mut self, kind: ChangeKind, row: Option<String>) {
        let notice = ChangeNotice { kind, row };
        self.subscribers.retain(|tx| tx.send(notice.clone()).is_ok());
    }
}

fn load_or_empty(path: &Path) -> Vec<String> {
    match task_file::read_lines(path) {
        Ok(lines) => {
            if lines.is_empty() && !path.exists() {
                tracing::warn!(path = %path.display(), "task file does not exist, starting empty");
            }
            lines
        }
        Err(e) => {
            tracing::warn!(error = %e, "could not load task file, starting empty");
            Vec::new()
        }
    }
}
