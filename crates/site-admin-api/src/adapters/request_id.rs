//! # Request Id Allocation
//!
//! Every inbound request gets an id that is strictly greater than every id
//! issued before it, including ids issued before a restart.
//!
//! ## Implementation
//!
//! The last issued id lives in a small JSON record (`{"request_id": N}`).
//! Each allocation is a read-modify-write of that record:
//!
//! - within the process, a `parking_lot::Mutex` serializes allocations
//! - across processes, an exclusive `fs2` lock on a sibling `.lock` file,
//!   held for the lifetime of the counter, keeps a second instance off the
//!   record
//! - every write goes to a temp file that is synced and then renamed over
//!   the record, so a crash leaves either the old value or the new one

use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use fs2::FileExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Errors from the request id counter
#[derive(Debug, thiserror::Error)]
pub enum CounterError {
    /// Record could not be created or opened
    #[error("failed to open request id record {}: {source}", .path.display())]
    Open { path: PathBuf, source: io::Error },

    /// Another process holds the record
    #[error("request id record already in use ({})", .0.display())]
    Locked(PathBuf),

    /// Record contents are not a valid counter
    #[error("corrupt request id record: {0}")]
    Corrupt(String),

    /// Read or write failed
    #[error("request id record I/O error: {0}")]
    Io(#[from] io::Error),

    /// Counter reached `u64::MAX`
    #[error("request id space exhausted")]
    Exhausted,

    /// Blocking worker failed before returning an id
    #[error("request id worker failed: {0}")]
    Worker(String),
}

/// Source of monotonically increasing request ids
pub trait RequestIdSource: Send + Sync {
    /// Allocate the next id. Blocking; call from a blocking worker.
    fn next(&self) -> Result<u64, CounterError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CounterRecord {
    request_id: u64,
}

/// Durable counter backed by a locked JSON record.
///
/// The file lock is released when the counter is dropped.
pub struct FileRequestCounter {
    path: PathBuf,
    lock: File,
    guard: Mutex<()>,
}

impl FileRequestCounter {
    /// Open (or create) the record and take the exclusive lock.
    ///
    /// A missing record starts the sequence at zero. An existing record
    /// that does not parse, including an empty one, is rejected.
    ///
    /// # Errors
    ///
    /// Returns `CounterError::Locked` if another counter holds the record.
    pub fn open(path: &Path) -> Result<Self, CounterError> {
        let open_err = |source| CounterError::Open {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(open_err)?;
        }

        let lock = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(lock_path(path))
            .map_err(open_err)?;

        if lock.try_lock_exclusive().is_err() {
            return Err(CounterError::Locked(path.to_path_buf()));
        }

        match std::fs::metadata(path) {
            // Fail at startup rather than on the first request
            Ok(_) => {
                read_record(path)?;
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => write_record(path, 0)?,
            Err(e) => return Err(open_err(e)),
        }

        Ok(Self {
            path: path.to_path_buf(),
            lock,
            guard: Mutex::new(()),
        })
    }

    /// Last id written to the record
    pub fn last_issued(&self) -> Result<u64, CounterError> {
        let _guard = self.guard.lock();
        read_record(&self.path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RequestIdSource for FileRequestCounter {
    fn next(&self) -> Result<u64, CounterError> {
        let _guard = self.guard.lock();
        let current = read_record(&self.path)?;
        let next = current.checked_add(1).ok_or(CounterError::Exhausted)?;
        write_record(&self.path, next)?;
        Ok(next)
    }
}

impl Drop for FileRequestCounter {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.lock);
    }
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".lock");
    PathBuf::from(name)
}

fn read_record(path: &Path) -> Result<u64, CounterError> {
    let raw = std::fs::read_to_string(path)?;
    if raw.trim().is_empty() {
        return Err(CounterError::Corrupt("record is empty".into()));
    }
    let record: CounterRecord =
        serde_json::from_str(&raw).map_err(|e| CounterError::Corrupt(e.to_string()))?;
    Ok(record.request_id)
}

fn write_record(path: &Path, request_id: u64) -> Result<(), CounterError> {
    let raw = serde_json::to_vec(&CounterRecord { request_id })
        .map_err(|e| CounterError::Corrupt(e.to_string()))?;

    let temp_path = path.with_extension("tmp");
    let mut file = File::create(&temp_path)?;
    file.write_all(&raw)?;
    file.sync_all()?;
    std::fs::rename(&temp_path, path)?;
    Ok(())
}

/// In-memory counter without persistence
#[derive(Debug, Default)]
pub struct MemoryRequestCounter {
    last: AtomicU64,
}

impl MemoryRequestCounter {
    pub fn starting_after(last: u64) -> Self {
        Self {
            last: AtomicU64::new(last),
        }
    }
}

impl RequestIdSource for MemoryRequestCounter {
    fn next(&self) -> Result<u64, CounterError> {
        self.last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_add(1))
            .map(|prev| prev + 1)
            .map_err(|_| CounterError::Exhausted)
    }
}
