//! On-disk format of one storage collection.
//!
//! Each collection is persisted as a single JSON document. Entries are kept in
//! a `BTreeMap` so the serialized form is deterministic and scans come back in
//! key order.

use crate::backend::CollectionName;
use crate::{error::Result, Error};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Version of the snapshot format for future compatibility.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// A point-in-time image of one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSnapshot {
    /// Snapshot format version
    pub format_version: u32,
    /// Which collection this image holds
    pub collection: CollectionName,
    /// Entries by storage key
    pub entries: BTreeMap<String, serde_json::Value>,
}

impl CollectionSnapshot {
    /// Create a new empty snapshot.
    pub fn new(collection: CollectionName) -> Self {
        Self::with_entries(collection, BTreeMap::new())
    }

    pub fn with_entries(
        collection: CollectionName,
        entries: BTreeMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            collection,
            entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check this image belongs to `expected`.
    pub fn validate(&self, expected: CollectionName) -> Result<()> {
        if self.collection != expected {
            return Err(Error::InvalidSnapshot(format!(
                "collection mismatch: expected '{}', got '{}'",
                expected, self.collection
            )));
        }
        Ok(())
    }

    /// Serialize to JSON with deterministic ordering.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self =
            serde_json::from_str(json).map_err(|e| Error::InvalidSnapshot(e.to_string()))?;

        if snapshot.format_version > SNAPSHOT_FORMAT_VERSION {
            return Err(Error::InvalidSnapshot(format!(
                "unsupported snapshot format version: {} (max supported: {})",
                snapshot.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_empty_snapshot() {
        let snapshot = CollectionSnapshot::new(CollectionName::Records);
        assert_eq!(snapshot.format_version, SNAPSHOT_FORMAT_VERSION);
        assert_eq!(snapshot.collection, CollectionName::Records);
        assert!(snapshot.is_empty());
    }

    #[test]
    fn json_is_deterministic() {
        let mut a = CollectionSnapshot::new(CollectionName::Meta);
        a.entries.insert("b".into(), json!(2));
        a.entries.insert("a".into(), json!(1));

        let mut b = CollectionSnapshot::new(CollectionName::Meta);
        b.entries.insert("a".into(), json!(1));
        b.entries.insert("b".into(), json!(2));

        assert_eq!(a.to_json().unwrap(), b.to_json().unwrap());
    }

    #[test]
    fn json_roundtrip() {
        let mut snapshot = CollectionSnapshot::new(CollectionName::Records);
        snapshot
            .entries
            .insert("i:1".into(), json!({"id": 1, "name": "Alice"}));

        let json = snapshot.to_json().unwrap();
        assert!(json.contains("\"formatVersion\":1"));
        assert!(json.contains("\"collection\":\"records\""));

        let parsed = CollectionSnapshot::from_json(&json).unwrap();
        assert_eq!(parsed, snapshot);
    }

    #[test]
    fn rejects_future_format() {
        let json = r#"{"formatVersion":99,"collection":"meta","entries":{}}"#;
        let result = CollectionSnapshot::from_json(json);
        assert!(matches!(result, Err(Error::InvalidSnapshot(_))));
    }

    #[test]
    fn rejects_garbage() {
        let result = CollectionSnapshot::from_json("{not json");
        assert!(matches!(result, Err(Error::InvalidSnapshot(_))));
    }

    #[test]
    fn validate_collection() {
        let snapshot = CollectionSnapshot::new(CollectionName::Meta);
        assert!(snapshot.validate(CollectionName::Meta).is_ok());
        assert!(matches!(
            snapshot.validate(CollectionName::Records),
            Err(Error::InvalidSnapshot(_))
        ));
    }
}
