//! File-backed log store reading an append-only JSON-lines file.
//!
//! Each line holds one serialized `LogEntry`. The file is re-read on every
//! query; lines that fail to parse are skipped with a warning.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::entry::LogEntry;
use crate::error::StoreError;

use super::traits::LogStore;

/// Log store over a JSON-lines file written by another process.
#[derive(Debug, Clone)]
pub struct JsonLinesLogStore {
    path: PathBuf,
}

impl JsonLinesLogStore {
    /// Opens the store, checking that the file is readable.
    ///
    /// # Errors
    ///
    /// `StoreError::Unavailable` if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        File::open(&path).map_err(|e| {
            StoreError::unavailable(
                format!("cannot open log file {}: {e}", path.display()),
                "check that the log file exists and is readable by this process, or pass a store override",
            )
        })?;
        Ok(Self { path })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogStore for JsonLinesLogStore {
    fn query(&self, after: Option<DateTime<Utc>>) -> Result<Vec<LogEntry>, StoreError> {
        let file = File::open(&self.path)
            .map_err(|e| StoreError::query(format!("open {}: {e}", self.path.display())))?;

        let mut reader = BufReader::new(file);
        let mut buf = Vec::new();
        let mut out = Vec::new();
        let mut line_no = 0usize;
        loop {
            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .map_err(|e| StoreError::query(format!("read {}: {e}", self.path.display())))?;
            if read == 0 {
                break;
            }
            line_no += 1;
            if buf.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            // Raw bytes: a line that is not UTF-8 is malformed, not a read failure.
            match serde_json::from_slice::<LogEntry>(&buf) {
                Ok(entry) => {
                    if after.map_or(true, |bound| entry.timestamp > bound) {
                        out.push(entry);
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        line = line_no,
                        error = %e,
                        "skipping malformed log line"
                    );
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::LogLevel;
    use chrono::Duration;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn missing_file_is_unavailable() {
        let dir = tempdir().unwrap();
        let err = JsonLinesLogStore::open(dir.path().join("nope.jsonl")).unwrap_err();
        assert!(matches!(err, StoreError::Unavailable { .. }));
    }

    #[test]
    fn reads_entries_and_skips_garbage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        let t0 = Utc::now();

        let mut file = File::create(&path).unwrap();
        for (i, msg) in ["a", "b"].iter().enumerate() {
            let entry = LogEntry::new(
                t0 + Duration::seconds(i as i64),
                "sys",
                "cat",
                LogLevel::Info,
                *msg,
            );
            writeln!(file, "{}", serde_json::to_string(&entry).unwrap()).unwrap();
        }
        writeln!(file, "not json").unwrap();
        writeln!(file).unwrap();
        drop(file);

        let store = JsonLinesLogStore::open(&path).unwrap();
        assert_eq!(store.query(None).unwrap().len(), 2);

        let newer = store.query(Some(t0)).unwrap();
        assert_eq!(newer.len(), 1);
        assert_eq!(newer[0].message, "b");
    }

    #[test]
    fn invalid_utf8_line_is_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        let t0 = Utc::now();

        let mut file = File::create(&path).unwrap();
        let first = LogEntry::new(t0, "sys", "cat", LogLevel::Info, "before");
        writeln!(file, "{}", serde_json::to_string(&first).unwrap()).unwrap();
        file.write_all(b"\xff\xfe garbage\n").unwrap();
        let second = LogEntry::new(t0 + Duration::seconds(1), "sys", "cat", LogLevel::Info, "after");
        write!(file, "{}", serde_json::to_string(&second).unwrap()).unwrap();
        drop(file);

        let store = JsonLinesLogStore::open(&path).unwrap();
        let messages: Vec<String> = store.query(None).unwrap().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["before", "after"]);
    }
}
