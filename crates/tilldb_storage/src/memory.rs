//! In-memory journal backend.

use parking_lot::RwLock;

use crate::backend::JournalBackend;
use crate::error::{StorageError, StorageResult};

/// A journal backend that keeps all bytes in memory.
///
/// Contents are lost when the backend is dropped, which makes this the
/// backend of choice for tests and for throwaway databases opened with
/// `Database::open_in_memory`.
///
/// # Example
///
/// ```
/// use tilldb_storage::{JournalBackend, MemoryBackend};
///
/// let mut backend = MemoryBackend::new();
/// let offset = backend.append(b"hello").unwrap();
/// assert_eq!(offset, 0);
/// assert_eq!(backend.read_at(0, 5).unwrap(), b"hello");
/// ```
#[derive(Debug, Default)]
pub struct MemoryBackend {
    data: RwLock<Vec<u8>>,
}

impl MemoryBackend {
    /// Creates an empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: RwLock::new(Vec::new()),
        }
    }

    /// Creates a backend preloaded with `data`, as if it had been appended.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }
}

impl JournalBackend for MemoryBackend {
    fn read_at(&self, offset: u64, len: u64) -> StorageResult<Vec<u8>> {
        let data = self.data.read();
        let size = data.len() as u64;
        let end = offset.checked_add(len).ok_or(StorageError::ReadPastEnd {
            offset,
            len,
            size,
        })?;
        if end > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }
        Ok(data[offset as usize..end as usize].to_vec())
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let mut guard = self.data.write();
        let offset = guard.len() as u64;
        guard.extend_from_slice(data);
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.data.read().len() as u64)
    }

    fn truncate(&mut self, size: u64) -> StorageResult<()> {
        let mut guard = self.data.write();
        if (size as usize) < guard.len() {
            guard.truncate(size as usize);
        }
        Ok(())
    }
}
