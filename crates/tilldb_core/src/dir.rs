//! Database directory layout and locking.
//!
//! A persistent database lives in one directory:
//!
//! ```text
//! <db_path>/
//! ├─ LOCK                # Advisory lock for single-process access
//! ├─ business.tjnl       # Business store journal
//! └─ reference.tjnl      # Reference store journal
//! ```
//!
//! The LOCK file keeps a second process from opening the same database;
//! within a process the stores serialize their own writes.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::{StoreError, StoreResult};
use crate::schema::StoreKind;

const LOCK_FILE: &str = "LOCK";

/// Holds a database directory and its exclusive lock.
///
/// The lock is released when the value is dropped. Only one `DatabaseDir`
/// can exist per directory at a time, across processes.
#[derive(Debug)]
pub struct DatabaseDir {
    path: PathBuf,
    _lock_file: File,
}

impl DatabaseDir {
    /// Opens or creates a database directory and takes its lock.
    ///
    /// # Errors
    ///
    /// Fails with [`StoreError::DatabaseLocked`] if another process holds
    /// the lock, and with [`StoreError::InvalidFormat`] if the path exists
    /// but is not a directory, or is missing and `create_if_missing` is
    /// false.
    pub fn open(path: &Path, create_if_missing: bool) -> StoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(StoreError::invalid_format(format!(
                    "database directory does not exist: {}",
                    path.display()
                )));
            }
        }
        if !path.is_dir() {
            return Err(StoreError::invalid_format(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path.join(LOCK_FILE))?;
        lock_file
            .try_lock_exclusive()
            .map_err(|_| StoreError::DatabaseLocked)?;

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the journal path for a store.
    #[must_use]
    pub fn journal_path(&self, kind: StoreKind) -> PathBuf {
        self.path.join(format!("{}.tjnl", kind.name()))
    }
}
