//! Document representation and index keys.
//!
//! TillDB stores schemaless JSON objects. Typed entities in [`crate::model`]
//! serialize into documents at the database boundary, so everything below
//! the facade works on plain JSON maps.

use std::fmt;

use serde_json::{Map, Value};

/// A stored record: a JSON object keyed by field name.
///
/// Every document carries a string `id` field. The stores enforce this on
/// insert; documents without one are rejected with a validation error.
pub type Document = Map<String, Value>;

/// Returns the `id` field of a document, if present and a string.
#[must_use]
pub fn document_id(doc: &Document) -> Option<&str> {
    doc.get("id").and_then(Value::as_str)
}

/// An orderable key extracted from a document field for secondary indexes.
///
/// Only scalar JSON values are indexable. Floats, arrays, and objects all
/// collapse to [`IndexKey::Null`], which keeps index maps totally ordered
/// without imposing an ordering on non-scalar data.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexKey {
    /// Missing field, JSON null, or a non-indexable value.
    Null,
    /// JSON boolean.
    Bool(bool),
    /// JSON integer. Numbers outside the i64 range collapse to `Null`.
    Int(i64),
    /// JSON string, compared byte-wise.
    Text(String),
}

impl IndexKey {
    /// Extracts the index key for `field` from a document.
    #[must_use]
    pub fn for_field(doc: &Document, field: &str) -> Self {
        doc.get(field).map_or(Self::Null, Self::from_value)
    }

    /// Converts a JSON value to its index key.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => n.as_i64().map_or(Self::Null, Self::Int),
            Value::String(s) => Self::Text(s.clone()),
            Value::Null | Value::Array(_) | Value::Object(_) => Self::Null,
        }
    }

    /// Builds the key used to look up string-valued fields.
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Builds the key used to look up integer-valued fields.
    #[must_use]
    pub const fn int(value: i64) -> Self {
        Self::Int(value)
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for IndexKey {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for IndexKey {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for IndexKey {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for IndexKey {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}
