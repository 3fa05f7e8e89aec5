//! The [`JournalBackend`] trait.

use crate::error::StorageResult;

/// An append-only byte store backing a record store's journal.
///
/// Implementations must be safe to share across threads; the journal layer
/// serializes writes itself but may issue reads concurrently.
///
/// Offsets and lengths are `u64` regardless of platform. A backend is not
/// expected to interpret the bytes it holds in any way.
pub trait JournalBackend: Send + Sync {
    /// Reads exactly `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ReadPastEnd`] if the requested range extends
    /// beyond the current size.
    ///
    /// [`StorageError::ReadPastEnd`]: crate::StorageError::ReadPastEnd
    fn read_at(&self, offset: u64, len: u64) -> StorageResult<Vec<u8>>;

    /// Appends `data` at the end, returning the offset it was written at.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Flushes buffered writes to the underlying medium.
    fn flush(&mut self) -> StorageResult<()>;

    /// Forces durability of all written bytes (fsync or equivalent).
    fn sync(&mut self) -> StorageResult<()>;

    /// Returns the current size in bytes.
    fn size(&self) -> StorageResult<u64>;

    /// Truncates the store to `size` bytes, discarding everything after.
    fn truncate(&mut self, size: u64) -> StorageResult<()>;

    /// Reads the entire contents. Used once per store at replay time.
    fn read_all(&self) -> StorageResult<Vec<u8>> {
        let size = self.size()?;
        if size == 0 {
            return Ok(Vec::new());
        }
        self.read_at(0, size)
    }
}
