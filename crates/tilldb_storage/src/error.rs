//! Error types for storage backends.

use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors produced by journal storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An underlying I/O operation failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A read was requested beyond the end of the stored bytes.
    #[error("read past end: offset {offset} + len {len} exceeds size {size}")]
    ReadPastEnd {
        /// Byte offset the read started at.
        offset: u64,
        /// Number of bytes requested.
        len: u64,
        /// Total size of the backend at the time of the read.
        size: u64,
    },

    /// The stored bytes are structurally invalid.
    #[error("corrupted storage: {0}")]
    Corrupted(String),

    /// The backend has been closed and can no longer serve requests.
    #[error("storage backend is closed")]
    Closed,
}

impl StorageError {
    /// Creates a [`StorageError::Corrupted`] from any message.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted(message.into())
    }
}
