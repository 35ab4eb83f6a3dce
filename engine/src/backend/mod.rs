//! Durable storage backends.
//!
//! The engine treats storage as an opaque capability: per-key CRUD plus a
//! full scan over a handful of independent collections. A write that returns
//! `Ok` must survive a crash immediately afterwards.

mod file;
mod memory;

pub use file::FileBackend;
pub use memory::MemoryBackend;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The collections the engine keeps in its backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionName {
    /// Cached and locally-written records
    Records,
    /// Operations waiting for remote acknowledgment
    PendingOperations,
    /// Sequence counters and id aliases
    Meta,
}

impl CollectionName {
    pub const ALL: [CollectionName; 3] = [
        CollectionName::Records,
        CollectionName::PendingOperations,
        CollectionName::Meta,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionName::Records => "records",
            CollectionName::PendingOperations => "pending_operations",
            CollectionName::Meta => "meta",
        }
    }
}

impl fmt::Display for CollectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key-value storage with full-scan enumeration.
///
/// Writes to the same collection are serialized by the implementation.
/// Reads of a missing collection or key return empty results, never errors.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Insert or overwrite the value at `key`.
    async fn put(&self, collection: CollectionName, key: &str, value: serde_json::Value)
        -> Result<()>;

    /// Insert only if `key` is absent. Returns `false`, writing nothing, when
    /// the key already exists.
    async fn insert_new(
        &self,
        collection: CollectionName,
        key: &str,
        value: serde_json::Value,
    ) -> Result<bool>;

    /// Get the value at `key`.
    async fn get(&self, collection: CollectionName, key: &str)
        -> Result<Option<serde_json::Value>>;

    /// All entries of a collection, in key order.
    async fn get_all(&self, collection: CollectionName) -> Result<Vec<(String, serde_json::Value)>>;

    /// Remove `key`. Returns whether it existed.
    async fn delete(&self, collection: CollectionName, key: &str) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_names() {
        assert_eq!(CollectionName::Records.as_str(), "records");
        assert_eq!(
            CollectionName::PendingOperations.to_string(),
            "pending_operations"
        );
        assert_eq!(
            serde_json::to_string(&CollectionName::Meta).unwrap(),
            "\"meta\""
        );
    }
}
