use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use tempfile::NamedTempFile;

/// The log is moved aside to `<name>.old` once it grows past this (1 MB).
const ROTATE_AT_BYTES: u64 = 1 << 20;

const LOG_NAME: &str = ".todour-recovery.log";

/// Written at the top of a new recovery log.
const PREAMBLE: &str = "\
<!-- todour recovery log: task file content that could not be saved.
     List entries with `td recovery`. Delete the file when done. -->
";

/// Entries are separated by a line holding only this.
const SEPARATOR: &str = "---";

/// Which operation could not save its content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryCategory {
    /// Saving the task file
    Write,
    /// Appending completed tasks to the archive
    Archive,
    /// Writing an undo/redo snapshot back
    Undo,
}

impl RecoveryCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            RecoveryCategory::Write => "write",
            RecoveryCategory::Archive => "archive",
            RecoveryCategory::Undo => "undo",
        }
    }
}

impl fmt::Display for RecoveryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecoveryCategory {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        [
            RecoveryCategory::Write,
            RecoveryCategory::Archive,
            RecoveryCategory::Undo,
        ]
        .into_iter()
        .find(|c| c.as_str() == s)
        .ok_or(())
    }
}

/// One saved piece of content plus what it was for
#[derive(Debug, Clone)]
pub struct RecoveryEntry {
    pub timestamp: DateTime<Utc>,
    pub category: RecoveryCategory,
    pub description: String,
    /// `key: value` notes such as the target path or the error
    pub fields: Vec<(String, String)>,
    /// The content that was not written
    pub body: String,
}

impl RecoveryEntry {
    pub fn new(category: RecoveryCategory, description: impl Into<String>, body: String) -> Self {
        RecoveryEntry {
            timestamp: Utc::now(),
            category,
            description: description.into(),
            fields: Vec::new(),
            body,
        }
    }

    pub fn with_field(mut self, key: &str, value: impl Into<String>) -> Self {
        self.fields.push((key.to_string(), value.into()));
        self
    }

    /// Markdown block: heading, `- key: value` bullets, then the body as an
    /// indented code block.
    fn render(&self) -> String {
        let mut out = format!(
            "\n## {} | {}: {}\n",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.category,
            self.description
        );
        for (key, value) in &self.fields {
            out.push_str(&format!("- {key}: {value}\n"));
        }
        if !self.body.is_empty() {
            out.push('\n');
            for line in self.body.lines() {
                out.push_str("    ");
                out.push_str(line);
                out.push('\n');
            }
        }
        out.push('\n');
        out.push_str(SEPARATOR);
        out.push('\n');
        out
    }

    /// Inverse of [`render`](Self::render). None for anything that is not an
    /// entry, such as the preamble.
    fn parse(block: &str) -> Option<RecoveryEntry> {
        let mut lines = block.lines().skip_while(|l| !l.starts_with("## "));
        let heading = lines.next()?.strip_prefix("## ")?;
        let (timestamp, category, description) = parse_heading(heading)?;

        let mut fields = Vec::new();
        let mut body: Vec<&str> = Vec::new();
        for line in lines {
            if let Some(code) = line.strip_prefix("    ") {
                body.push(code);
            } else if let Some((key, value)) = line.strip_prefix("- ").and_then(|l| l.split_once(": ")) {
                fields.push((key.to_string(), value.to_string()));
            }
        }

        Some(RecoveryEntry {
            timestamp,
            category,
            description,
            fields,
            body: body.join("\n"),
        })
    }
}

/// `<rfc3339> | <category>: <description>`
fn parse_heading(heading: &str) -> Option<(DateTime<Utc>, RecoveryCategory, String)> {
    let (stamp, rest) = heading.split_once(" | ")?;
    let (category, description) = rest.split_once(": ")?;
    Some((
        DateTime::parse_from_rfc3339(stamp).ok()?.with_timezone(&Utc),
        category.parse().ok()?,
        description.to_string(),
    ))
}

/// The recovery log sits in the same directory as the task file.
pub fn recovery_log_path(task_file: &Path) -> PathBuf {
    task_file
        .parent()
        .filter(|d| !d.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
        .join(LOG_NAME)
}

/// Replace `path` with `content` via a temp file in the same directory and
/// a rename, so readers see the old file or the new one and nothing between.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = path
        .parent()
        .filter(|d| !d.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;
    Ok(())
}

/// Append `entry` to the log next to `task_file`. Never fails; a log that
/// cannot be written is reported through tracing.
pub fn log_recovery(task_file: &Path, entry: RecoveryEntry) {
    let path = recovery_log_path(task_file);
    match append_entry(&path, &entry) {
        Ok(()) => {
            tracing::warn!(log = %path.display(), category = %entry.category, "content saved to recovery log")
        }
        Err(e) => tracing::error!(log = %path.display(), error = %e, "could not write recovery log"),
    }
}

fn append_entry(path: &Path, entry: &RecoveryEntry) -> io::Result<()> {
    let size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    let size = if size > ROTATE_AT_BYTES {
        let mut old = path.as_os_str().to_owned();
        old.push(".old");
        fs::rename(path, &old)?;
        0
    } else {
        size
    };

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    if size == 0 {
        file.write_all(PREAMBLE.as_bytes())?;
    }
    file.write_all(entry.render().as_bytes())
}

/// Entries from the log next to `task_file`, newest first, at most `limit`.
/// A missing or unreadable log has no entries.
pub fn read_recovery_entries(task_file: &Path, limit: Option<usize>) -> Vec<RecoveryEntry> {
    let Ok(content) = fs::read_to_string(recovery_log_path(task_file)) else {
        return Vec::new();
    };
    let entries: Vec<RecoveryEntry> = content
        .split(&format!("\n{SEPARATOR}\n"))
        .filter_map(RecoveryEntry::parse)
        .collect();
    entries
        .into_iter()
        .rev()
        .take(limit.unwrap_or(usize::MAX))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(category: RecoveryCategory, desc: &str, body: &str) -> RecoveryEntry {
        RecoveryEntry::new(category, desc, body.to_string()).with_field("Target", "todo.txt")
    }

    #[test]
    fn rendered_entry_shape() {
        let md = entry(RecoveryCategory::Write, "save failed", "(A) call mom\nbuy milk").render();
        assert!(md.contains(" | write: save failed\n"));
        assert!(md.contains("- Target: todo.txt\n"));
        assert!(md.contains("\n    (A) call mom\n    buy milk\n"));
        assert!(md.ends_with("\n---\n"));
    }

    #[test]
    fn log_then_read_newest_first() {
        let tmp = TempDir::new().unwrap();
        let task_file = tmp.path().join("todo.txt");

        log_recovery(&task_file, entry(RecoveryCategory::Write, "first", "one\ntwo"));
        log_recovery(&task_file, entry(RecoveryCategory::Archive, "second", ""));

        let entries = read_recovery_entries(&task_file, None);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].description, "second");
        assert_eq!(entries[0].category, RecoveryCategory::Archive);
        assert_eq!(entries[0].body, "");
        assert_eq!(entries[1].body, "one\ntwo");
        assert_eq!(
            entries[1].fields,
            vec![("Target".to_string(), "todo.txt".to_string())]
        );

        let content = fs::read_to_string(recovery_log_path(&task_file)).unwrap();
        assert!(content.starts_with("<!-- todour recovery log"));
        assert_eq!(content.matches("<!--").count(), 1);
    }

    #[test]
    fn body_lines_that_look_like_fields_stay_in_body() {
        let tmp = TempDir::new().unwrap();
        let task_file = tmp.path().join("todo.txt");
        log_recovery(&task_file, entry(RecoveryCategory::Undo, "undo", "- note: not a field\n---"));

        let entries = read_recovery_entries(&task_file, None);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].body, "- note: not a field\n---");
        assert_eq!(entries[0].fields.len(), 1);
    }

    #[test]
    fn limit_keeps_most_recent() {
        let tmp = TempDir::new().unwrap();
        let task_file = tmp.path().join("todo.txt");
        for i in 0..4 {
            log_recovery(&task_file, entry(RecoveryCategory::Undo, &format!("entry {i}"), "x"));
        }
        let descriptions: Vec<String> = read_recovery_entries(&task_file, Some(2))
            .into_iter()
            .map(|e| e.description)
            .collect();
        assert_eq!(descriptions, vec!["entry 3", "entry 2"]);
    }

    #[test]
    fn missing_log_is_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(read_recovery_entries(&tmp.path().join("todo.txt"), None).is_empty());
    }

    #[test]
    fn large_log_is_rotated() {
        let tmp = TempDir::new().unwrap();
        let task_file = tmp.path().join("todo.txt");
        let log = recovery_log_path(&task_file);
        fs::write(&log, vec![b'#'; (ROTATE_AT_BYTES + 1) as usize]).unwrap();

        log_recovery(&task_file, entry(RecoveryCategory::Write, "after rotate", "x"));
        assert!(tmp.path().join(".todour-recovery.log.old").exists());
        assert_eq!(read_recovery_entries(&task_file, None).len(), 1);
    }

    #[test]
    fn atomic_write_replaces_content() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("todo.txt");
        atomic_write(&path, b"call mom\n").unwrap();
        atomic_write(&path, b"buy milk\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "buy milk\n");
    }

    #[test]
    fn heading_parsing() {
        let (ts, cat, desc) =
            parse_heading("2024-06-01T10:00:00Z | archive: 3 tasks not archived").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-06-01T10:00:00+00:00");
        assert_eq!(cat, RecoveryCategory::Archive);
        assert_eq!(desc, "3 tasks not archived");
        assert!(parse_heading("garbage").is_none());
        assert!(parse_heading("2024-06-01T10:00:00Z | nope: x").is_none());
    }
}
