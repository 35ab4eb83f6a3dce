//! Record types for storing data.
//!
//! The engine treats record contents as an opaque, flat map of fields. Only
//! the identifier has meaning to it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix for identifiers synthesized locally while offline.
pub const TEMPORARY_ID_PREFIX: &str = "local-";

/// Caller-defined record fields (everything except the identifier).
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// Identifier of a record: the remote assigns integers, temporary ids are text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl RecordId {
    /// Build the temporary identifier for a local sequence number.
    pub fn temporary(seq: u64) -> Self {
        RecordId::Text(format!("{TEMPORARY_ID_PREFIX}{seq}"))
    }

    /// Check if this id was synthesized locally and is unknown to the remote.
    pub fn is_temporary(&self) -> bool {
        matches!(self, RecordId::Text(s) if s.starts_with(TEMPORARY_ID_PREFIX))
    }

    /// Check if the id is usable as a target for Update/Delete.
    pub fn is_valid(&self) -> bool {
        match self {
            RecordId::Int(_) => true,
            RecordId::Text(s) => !s.trim().is_empty(),
        }
    }

    /// Storage key. Integer and text ids live in disjoint key spaces, so
    /// `5` and `"5"` never alias.
    pub fn storage_key(&self) -> String {
        match self {
            RecordId::Int(n) => format!("i:{n}"),
            RecordId::Text(s) => format!("s:{s}"),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(n) => write!(f, "{n}"),
            RecordId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        RecordId::Int(value)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        RecordId::Text(value.to_string())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        RecordId::Text(value)
    }
}

/// A domain record.
///
/// Serializes flat, as `{"id": .., "field": ..}`, which is also the shape the
/// remote API speaks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Unique identifier for this record
    pub id: RecordId,
    /// The caller-defined payload
    #[serde(flatten)]
    pub fields: Fields,
}

impl Record {
    /// Create a new record. An `id` entry inside `fields` is dropped; the
    /// identifier lives only in `id`.
    pub fn new(id: impl Into<RecordId>, mut fields: Fields) -> Self {
        fields.remove("id");
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Get a single field.
    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.fields.get(name)
    }

    /// Return a copy of this record with `changes` laid over its fields.
    pub fn merged_with(&self, changes: &Fields) -> Self {
        let mut fields = self.fields.clone();
        for (key, value) in changes {
            if key != "id" {
                fields.insert(key.clone(), value.clone());
            }
        }
        Self {
            id: self.id.clone(),
            fields,
        }
    }

    /// Same record under a different identifier.
    pub fn with_id(mut self, id: RecordId) -> Self {
        self.id = id;
        self
    }
}
