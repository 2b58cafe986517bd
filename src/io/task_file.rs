use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::io::recovery::atomic_write;
use crate::parse::{join_lines, split_lines};

/// Error type for task file I/O
#[derive(Debug, thiserror::Error)]
pub enum TaskFileError {
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl TaskFileError {
    pub fn path(&self) -> &Path {
        match self {
            TaskFileError::ReadError { path, .. } | TaskFileError::WriteError { path, .. } => path,
        }
    }
}

/// Read the raw task lines of `path`.
///
/// A missing file is not an error: it is simply an empty list, so a fresh
/// store can be opened on a file that does not exist yet.
pub fn read_lines(path: &Path) -> Result<Vec<String>, TaskFileError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(split_lines(&content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(TaskFileError::ReadError {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Replace the contents of `path` with `lines` (temp file + rename).
pub fn write_lines(path: &Path, lines: &[String]) -> Result<(), TaskFileError> {
    write_content(path, &join_lines(lines))
}

/// Replace the contents of `path` with already-joined content.
pub fn write_content(path: &Path, content: &str) -> Result<(), TaskFileError> {
    atomic_write(path, content.as_bytes()).map_err(|e| TaskFileError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Append `lines` to the end of the archive file, creating it if needed.
///
/// The existing archive is rewritten as a whole through `atomic_write`, so a
/// crash leaves either the old or the new archive on disk.
pub fn append_lines(path: &Path, lines: &[String]) -> Result<(), TaskFileError> {
    if lines.is_empty() {
        return Ok(());
    }
    let mut content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => {
            return Err(TaskFileError::ReadError {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };
    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    content.push_str(&join_lines(lines));
    write_content(path, &content)
}

/// Create an empty task file if none exists. Returns true if created.
pub fn ensure_exists(path: &Path) -> Result<bool, TaskFileError> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        fs::create_dir_all(dir).map_err(|e| TaskFileError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(path)
        .and_then(|mut f| f.flush())
        .map_err(|e| TaskFileError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_reads_as_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(read_lines(&tmp.path().join("todo.txt")).unwrap().is_empty());
    }

    #[test]
    fn reading_a_directory_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let err = read_lines(tmp.path()).unwrap_err();
        assert_eq!(err.path(), tmp.path());
    }

    #[test]
    fn write_then_read() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("todo.txt");
        let lines = vec!["(A) one".to_string(), "two +p".to_string()];
        write_lines(&path, &lines).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "(A) one\ntwo +p\n");
        assert_eq!(read_lines(&path).unwrap(), lines);
    }

    #[test]
    fn append_keeps_existing_archive() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("done.txt");
        fs::write(&path, "x 2024-01-01 old").unwrap();
        append_lines(&path, &["x 2024-02-02 new".to_string()]).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "x 2024-01-01 old\nx 2024-02-02 new\n"
        );
    }

    #[test]
    fn append_creates_archive() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("done.txt");
        append_lines(&path, &["x a".to_string(), "x b".to_string()]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "x a\nx b\n");
        append_lines(&path, &[]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "x a\nx b\n");
    }

    #[test]
    fn ensure_exists_only_creates_once() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("todo.txt");
        assert!(ensure_exists(&path).unwrap());
        fs::write(&path, "keep\n").unwrap();
        assert!(!ensure_exists(&path).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "keep\n");
    }
}
