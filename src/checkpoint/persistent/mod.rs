//! Durable, key-scoped checkpoint store.
//!
//! # Layout
//!
//! ```text
//! <dir>/
//!   <blake3(key)>.ckpt    framed record (see `codec`)
//!   <blake3(key)>.lock    exclusive lock while a store holds the key
//! ```
//!
//! Writes go to a temporary file that is renamed over the record, so a crash
//! mid-write leaves the previous checkpoint intact.

mod codec;
mod file_lock;

pub use file_lock::FileLock;

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CheckpointError;

use super::traits::CheckpointStore;

#[derive(Debug, Serialize, Deserialize)]
struct CheckpointRecord {
    key: String,
    checkpoint: Option<DateTime<Utc>>,
    written_at: DateTime<Utc>,
}

fn corrupted(err: &std::io::Error) -> CheckpointError {
    CheckpointError::Corrupted {
        reason: err.to_string(),
    }
}

/// Checkpoint persisted under a caller-supplied key.
#[derive(Debug)]
pub struct FileCheckpointStore {
    key: String,
    record_path: PathBuf,
    tmp_path: PathBuf,
    sync_on_write: bool,
    current: Mutex<Option<DateTime<Utc>>>,
    _lock: FileLock,
}

impl FileCheckpointStore {
    /// Opens (or creates) the checkpoint for `key` inside `dir`.
    ///
    /// # Errors
    /// - `Backend` if `key` is empty
    /// - `Locked` if another store holds the key
    /// - `Corrupted` if an existing record fails verification
    /// - `Io` if the directory cannot be created or read
    pub fn open(dir: impl AsRef<Path>, key: &str, sync_on_write: bool) -> Result<Self, CheckpointError> {
        if key.trim().is_empty() {
            return Err(CheckpointError::Backend("checkpoint key must not be empty".to_string()));
        }

        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let stem = blake3::hash(key.as_bytes()).to_hex();
        let lock_path = dir.join(format!("{stem}.lock"));
        let Some(lock) = FileLock::try_acquire(&lock_path)? else {
            tracing::warn!(
                key,
                path = %lock_path.display(),
                holder_pid = ?FileLock::holder_pid(&lock_path),
                "checkpoint key is held by another store"
            );
            return Err(CheckpointError::Locked {
                path: lock_path.display().to_string(),
            });
        };

        let record_path = dir.join(format!("{stem}.ckpt"));
        let tmp_path = dir.join(format!("{stem}.ckpt.tmp"));
        let current = Self::load(&record_path, key)?;

        tracing::debug!(
            key,
            path = %record_path.display(),
            checkpoint = ?current,
            "opened checkpoint store"
        );

        Ok(Self {
            key: key.to_string(),
            record_path,
            tmp_path,
            sync_on_write,
            current: Mutex::new(current),
            _lock: lock,
        })
    }

    /// The key this store was opened for.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Path of the record file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.record_path
    }

    fn load(path: &Path, key: &str) -> Result<Option<DateTime<Utc>>, CheckpointError> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CheckpointError::Io(e)),
        };

        let mut reader = BufReader::new(file);
        let record: CheckpointRecord = codec::read_record(&mut reader).map_err(|e| match e.kind() {
            ErrorKind::InvalidData | ErrorKind::UnexpectedEof => corrupted(&e),
            _ => CheckpointError::Io(e),
        })?;

        if record.key != key {
            return Err(CheckpointError::Corrupted {
                reason: format!("record belongs to key '{}', expected '{key}'", record.key),
            });
        }

        Ok(record.checkpoint)
    }

    fn persist(&self, checkpoint: Option<DateTime<Utc>>) -> Result<(), CheckpointError> {
        let record = CheckpointRecord {
            key: self.key.clone(),
            checkpoint,
            written_at: Utc::now(),
        };

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.tmp_path)?;
        let mut writer = BufWriter::new(file);
        codec::write_record(&mut writer, &record)?;
        writer.flush()?;
        if self.sync_on_write {
            writer.get_ref().sync_all()?;
        }
        drop(writer);

        fs::rename(&self.tmp_path, &self.record_path)?;
        Ok(())
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn read(&self) -> Result<Option<DateTime<Utc>>, CheckpointError> {
        let guard = self
            .current
            .lock()
            .map_err(|_| CheckpointError::Backend("poisoned lock: checkpoint read".to_string()))?;
        Ok(*guard)
    }

    fn write(&self, checkpoint: Option<DateTime<Utc>>) -> Result<(), CheckpointError> {
        let mut guard = self
            .current
            .lock()
            .map_err(|_| CheckpointError::Backend("poisoned lock: checkpoint write".to_string()))?;
        self.persist(checkpoint)?;
        *guard = checkpoint;
        Ok(())
    }
}
