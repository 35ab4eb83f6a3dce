//! In-memory backend. Durable only for the lifetime of the process; used in
//! tests and by embedders that persist elsewhere.

use super::{CollectionName, StorageBackend};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

type Entries = BTreeMap<String, serde_json::Value>;

/// A [`StorageBackend`] holding everything in memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    collections: RwLock<HashMap<CollectionName, Entries>>,
    unavailable: AtomicBool,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the storage device going away (or coming back). While
    /// unavailable every call fails with [`Error::Storage`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::Storage("memory backend marked unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn put(
        &self,
        collection: CollectionName,
        key: &str,
        value: serde_json::Value,
    ) -> Result<()> {
        self.check()?;
        self.collections
            .write()
            .await
            .entry(collection)
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn insert_new(
        &self,
        collection: CollectionName,
        key: &str,
        value: serde_json::Value,
    ) -> Result<bool> {
        self.check()?;
        let mut collections = self.collections.write().await;
        let entries = collections.entry(collection).or_default();
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(key.to_string(), value);
        Ok(true)
    }

    async fn get(
        &self,
        collection: CollectionName,
        key: &str,
    ) -> Result<Option<serde_json::Value>> {
        self.check()?;
        Ok(self
            .collections
            .read()
            .await
            .get(&collection)
            .and_then(|entries| entries.get(key))
            .cloned())
    }

    async fn get_all(&self, collection: CollectionName) -> Result<Vec<(String, serde_json::Value)>> {
        self.check()?;
        Ok(self
            .collections
            .read()
            .await
            .get(&collection)
            .map(|entries| {
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn delete(&self, collection: CollectionName, key: &str) -> Result<bool> {
        self.check()?;
        Ok(self
            .collections
            .write()
            .await
            .get_mut(&collection)
            .map(|entries| entries.remove(key).is_some())
            .unwrap_or(false))
    }
}
