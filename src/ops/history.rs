use serde::{Deserialize, Serialize};

/// Maximum number of snapshots kept. Older ones are dropped from the front.
pub const HISTORY_LIMIT: usize = 100;

/// Linear undo/redo history over whole-file snapshots.
///
/// `cursor` always indexes the snapshot that is currently applied to the
/// backing file. An empty log has no current snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryLog {
    #[serde(default)]
    snapshots: Vec<String>,
    #[serde(default)]
    cursor: usize,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a log whose only snapshot is `content`.
    pub fn with_initial(content: impl Into<String>) -> Self {
        HistoryLog {
            snapshots: vec![content.into()],
            cursor: 0,
        }
    }

    /// Record a committed state. Discards anything beyond the cursor.
    /// Recording content equal to the current snapshot is a no-op.
    /// Returns true if a snapshot was added.
    pub fn record(&mut self, content: impl Into<String>) -> bool {
        let content = content.into();
        if self.current() == Some(content.as_str()) {
            return false;
        }
        if !self.snapshots.is_empty() {
            self.snapshots.truncate(self.cursor + 1);
        }
        self.snapshots.push(content);
        if self.snapshots.len() > HISTORY_LIMIT {
            let excess = self.snapshots.len() - HISTORY_LIMIT;
            self.snapshots.drain(..excess);
        }
        self.cursor = self.snapshots.len() - 1;
        true
    }

    /// Step back one snapshot and return it, or None at the oldest one.
    pub fn undo(&mut self) -> Option<&str> {
        if !self.undo_possible() {
            return None;
        }
        self.cursor -= 1;
        self.current()
    }

    /// Step forward one snapshot and return it, or None at the newest one.
    pub fn redo(&mut self) -> Option<&str> {
        if !self.redo_possible() {
            return None;
        }
        self.cursor += 1;
        self.current()
    }

    pub fn undo_possible(&self) -> bool {
        !self.snapshots.is_empty() && self.cursor > 0
    }

    pub fn redo_possible(&self) -> bool {
        self.cursor + 1 < self.snapshots.len()
    }

    /// The currently applied snapshot
    pub fn current(&self) -> Option<&str> {
        self.snapshots.get(self.cursor).map(String::as_str)
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Put the cursor back in range after deserializing a hand-edited log.
    pub(crate) fn clamp_cursor(&mut self) {
        self.cursor = self.cursor.min(self.snapshots.len().saturating_sub(1));
    }
}
