//! Error types for TillDB core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in TillDB core operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] tilldb_storage::StorageError),

    /// JSON serialization or deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The requested table does not exist in either store.
    #[error("table not found: {name}")]
    TableNotFound {
        /// Name of the table.
        name: String,
    },

    /// No record with the given id exists in the table.
    #[error("record not found: {id} in table {table}")]
    NotFound {
        /// The table searched.
        table: String,
        /// The record id that was not found.
        id: String,
    },

    /// A record with the given id already exists in the table.
    #[error("duplicate key: {id} already exists in table {table}")]
    DuplicateKey {
        /// The table the insert targeted.
        table: String,
        /// The id that collided.
        id: String,
    },

    /// A record failed structural validation.
    #[error("validation failed: {message}")]
    Validation {
        /// Description of what was invalid.
        message: String,
    },

    /// A backup snapshot is missing tables required for restore.
    #[error("backup snapshot missing required tables: {tables:?}")]
    MissingTables {
        /// Names of the missing tables.
        tables: Vec<String>,
    },

    /// The table has no index on the requested field.
    #[error("no index on field {field} of table {table}")]
    IndexNotFound {
        /// The table queried.
        table: String,
        /// The field no index covers.
        field: String,
    },

    /// The journal is corrupted or invalid.
    #[error("journal corruption: {message}")]
    JournalCorrupted {
        /// Description of the corruption.
        message: String,
    },

    /// Checksum mismatch detected in a journal frame.
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Expected checksum.
        expected: u32,
        /// Actual checksum.
        actual: u32,
    },

    /// Invalid snapshot or database format.
    #[error("invalid format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// Database is already open in another process.
    #[error("database locked: another process has exclusive access")]
    DatabaseLocked,

    /// Database is closed.
    #[error("database is closed")]
    DatabaseClosed,
}

impl StoreError {
    /// Creates a table not found error.
    pub fn table_not_found(name: impl Into<String>) -> Self {
        Self::TableNotFound { name: name.into() }
    }

    /// Creates a record not found error.
    pub fn not_found(table: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            table: table.into(),
            id: id.into(),
        }
    }

    /// Creates a duplicate key error.
    pub fn duplicate_key(table: impl Into<String>, id: impl Into<String>) -> Self {
        Self::DuplicateKey {
            table: table.into(),
            id: id.into(),
        }
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a missing tables error.
    pub fn missing_tables(tables: Vec<String>) -> Self {
        Self::MissingTables { tables }
    }

    /// Creates a journal corruption error.
    pub fn journal_corrupted(message: impl Into<String>) -> Self {
        Self::JournalCorrupted {
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_names_table_and_id() {
        let err = StoreError::not_found("customers", "cust-abc-def");
        let text = err.to_string();
        assert!(text.contains("customers"));
        assert!(text.contains("cust-abc-def"));
    }

    #[test]
    fn missing_tables_lists_every_table() {
        let err = StoreError::missing_tables(vec!["users".into(), "invoices".into()]);
        let text = err.to_string();
        assert!(text.contains("users"));
        assert!(text.contains("invoices"));
    }

    #[test]
    fn storage_errors_convert() {
        let storage = tilldb_storage::StorageError::Closed;
        let err: StoreError = storage.into();
        assert!(matches!(err, StoreError::Storage(_)));
    }

    #[test]
    fn json_errors_convert() {
        let bad = serde_json::from_str::<serde_json::Value>("{not json");
        let err: StoreError = bad.unwrap_err().into();
        assert!(matches!(err, StoreError::Json(_)));
    }
}
