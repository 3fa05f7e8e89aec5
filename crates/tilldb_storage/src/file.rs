//! File-based journal backend.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::backend::JournalBackend;
use crate::error::{StorageError, StorageResult};

struct FileInner {
    file: File,
    size: u64,
}

/// A journal backend that stores bytes in a single file.
///
/// The file is opened read-write and created if missing. The cursor position
/// is owned by a mutex along with the cached size, so reads and appends can
/// be issued from any thread without coordinating seeks externally.
pub struct FileBackend {
    path: PathBuf,
    inner: Mutex<FileInner>,
}

impl FileBackend {
    /// Opens or creates the journal file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or its metadata read.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            path,
            inner: Mutex::new(FileInner { file, size }),
        })
    }

    /// Opens the journal file at `path`, creating parent directories first.
    ///
    /// # Errors
    ///
    /// Returns an error if directory creation or the open itself fails.
    pub fn open_with_create_dirs(path: impl AsRef<Path>) -> StorageResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Returns the path this backend was opened at.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for FileBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileBackend")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl JournalBackend for FileBackend {
    fn read_at(&self, offset: u64, len: u64) -> StorageResult<Vec<u8>> {
        let mut inner = self.inner.lock();
        let size = inner.size;
        let end = offset.checked_add(len).ok_or(StorageError::ReadPastEnd {
            offset,
            len,
            size,
        })?;
        if end > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }
        let mut buf = vec![0u8; len as usize];
        inner.file.seek(SeekFrom::Start(offset))?;
        inner.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let mut inner = self.inner.lock();
        let offset = inner.size;
        inner.file.seek(SeekFrom::Start(offset))?;
        inner.file.write_all(data)?;
        inner.size = offset + data.len() as u64;
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.inner.lock().file.flush()?;
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        let inner = self.inner.lock();
        inner.file.sync_all()?;
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.inner.lock().size)
    }

    fn truncate(&mut self, size: u64) -> StorageResult<()> {
        let mut inner = self.inner.lock();
        if size < inner.size {
            inner.file.set_len(size)?;
            inner.file.sync_all()?;
            inner.size = size;
        }
        Ok(())
    }
}
