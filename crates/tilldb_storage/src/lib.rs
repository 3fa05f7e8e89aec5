//! Journal storage backends for TillDB.
//!
//! A [`JournalBackend`] is an append-only byte store. The record stores in
//! `tilldb_core` write framed journal entries through this trait and replay
//! them at open time, so a backend only needs to support positional reads,
//! appends, and truncation. Two implementations are provided:
//!
//! - [`MemoryBackend`]: bytes held in a `Vec<u8>`, for tests and ephemeral
//!   databases.
//! - [`FileBackend`]: bytes held in a single file on disk.
//!
//! Backends are deliberately dumb. Framing, checksums, and replay logic all
//! live above this crate; a backend never interprets the bytes it stores.

mod backend;
mod error;
mod file;
mod memory;

pub use backend::JournalBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::MemoryBackend;
