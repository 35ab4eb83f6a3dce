//! File backend: one snapshot document per collection under a data directory.
//!
//! Every write rewrites the collection's document through a temporary file,
//! fsyncs it and renames it over the previous version, so a crash leaves
//! either the old or the new image on disk, never a torn one.

use super::{CollectionName, StorageBackend};
use crate::error::Result;
use crate::snapshot::CollectionSnapshot;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

type Entries = BTreeMap<String, serde_json::Value>;

/// A [`StorageBackend`] persisting to JSON files.
#[derive(Debug)]
pub struct FileBackend {
    dir: PathBuf,
    /// In-memory image of what is on disk. The lock is held across the file
    /// write, which serializes writers.
    collections: Mutex<HashMap<CollectionName, Entries>>,
}

impl FileBackend {
    /// Open (or create) a data directory and load every collection found in it.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;

        let mut collections = HashMap::new();
        for name in CollectionName::ALL {
            let path = collection_path(&dir, name);
            let entries = match fs::read_to_string(&path).await {
                Ok(json) => {
                    let snapshot = CollectionSnapshot::from_json(&json)?;
                    snapshot.validate(name)?;
                    snapshot.entries
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Entries::new(),
                Err(e) => return Err(e.into()),
            };
            tracing::debug!(collection = %name, entries = entries.len(), "loaded collection");
            collections.insert(name, entries);
        }

        Ok(Self {
            dir,
            collections: Mutex::new(collections),
        })
    }

    /// The data directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Apply `mutate` to a copy of the collection, persist the copy, and only
    /// then make it the current image.
    async fn write<T>(
        &self,
        collection: CollectionName,
        mutate: impl FnOnce(&mut Entries) -> T,
    ) -> Result<T> {
        let mut collections = self.collections.lock().await;
        let mut entries = collections.get(&collection).cloned().unwrap_or_default();
        let output = mutate(&mut entries);

        let snapshot = CollectionSnapshot::with_entries(collection, entries);
        self.persist(&snapshot).await?;
        collections.insert(collection, snapshot.entries);

        Ok(output)
    }

    async fn persist(&self, snapshot: &CollectionSnapshot) -> Result<()> {
        let path = collection_path(&self.dir, snapshot.collection);
        let tmp = path.with_extension("json.tmp");
        let json = snapshot.to_json()?;

        let mut file = fs::File::create(&tmp).await?;
        file.write_all(json.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&tmp, &path).await?;
        sync_dir(&self.dir).await?;
        Ok(())
    }
}

fn collection_path(dir: &Path, collection: CollectionName) -> PathBuf {
    dir.join(format!("{}.json", collection.as_str()))
}

#[cfg(unix)]
async fn sync_dir(dir: &Path) -> Result<()> {
    fs::File::open(dir).await?.sync_all().await?;
    Ok(())
}

#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}

#[async_trait]
impl StorageBackend for FileBackend {
    async fn put(
        &self,
        collection: CollectionName,
        key: &str,
        value: serde_json::Value,
    ) -> Result<()> {
        self.write(collection, |entries| {
            entries.insert(key.to_string(), value);
        })
        .await
    }

    async fn insert_new(
        &self,
        collection: CollectionName,
        key: &str,
        value: serde_json::Value,
    ) -> Result<bool> {
        {
            let collections = self.collections.lock().await;
            if collections
                .get(&collection)
                .is_some_and(|entries| entries.contains_key(key))
            {
                return Ok(false);
            }
        }
        self.write(collection, |entries| {
            // Re-checked under the write lock.
            if entries.contains_key(key) {
                return false;
            }
            entries.insert(key.to_string(), value);
            true
        })
        .await
    }

    async fn get(
        &self,
        collection: CollectionName,
        key: &str,
    ) -> Result<Option<serde_json::Value>> {
        Ok(self
            .collections
            .lock()
            .await
            .get(&collection)
            .and_then(|entries| entries.get(key))
            .cloned())
    }

    async fn get_all(&self, collection: CollectionName) -> Result<Vec<(String, serde_json::Value)>> {
        Ok(self
            .collections
            .lock()
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
        {
            let collections = self.collections.lock().await;
            if !collections
                .get(&collection)
                .is_some_and(|entries| entries.contains_key(key))
            {
                return Ok(false);
            }
        }
        self.write(collection, |entries| entries.remove(key).is_some())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use serde_json::json;

    #[tokio::test]
    async fn fresh_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path().join("data")).await.unwrap();

        assert!(backend
            .get_all(CollectionName::Records)
            .await
            .unwrap()
            .is_empty());
        assert!(backend
            .get(CollectionName::Meta, "x")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn writes_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();

        {
            let backend = FileBackend::open(dir.path()).await.unwrap();
            backend
                .put(CollectionName::Records, "i:1", json!({"id": 1}))
                .await
                .unwrap();
            backend
                .put(CollectionName::Records, "i:2", json!({"id": 2}))
                .await
                .unwrap();
            backend
                .delete(CollectionName::Records, "i:1")
                .await
                .unwrap();
            assert!(backend
                .insert_new(CollectionName::PendingOperations, "op-1", json!("a"))
                .await
                .unwrap());
        }

        let reopened = FileBackend::open(dir.path()).await.unwrap();
        let records = reopened.get_all(CollectionName::Records).await.unwrap();
        assert_eq!(records, vec![("i:2".to_string(), json!({"id": 2}))]);
        assert_eq!(
            reopened
                .get(CollectionName::PendingOperations, "op-1")
                .await
                .unwrap(),
            Some(json!("a"))
        );
        assert!(!dir.path().join("records.json.tmp").exists());
    }

    #[tokio::test]
    async fn insert_new_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).await.unwrap();

        assert!(backend
            .insert_new(CollectionName::Meta, "k", json!(1))
            .await
            .unwrap());
        assert!(!backend
            .insert_new(CollectionName::Meta, "k", json!(2))
            .await
            .unwrap());
        assert_eq!(
            backend.get(CollectionName::Meta, "k").await.unwrap(),
            Some(json!(1))
        );
    }

    #[tokio::test]
    async fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("records.json"), "{broken").unwrap();

        let result = FileBackend::open(dir.path()).await;
        assert!(matches!(result, Err(Error::InvalidSnapshot(_))));
    }

    #[tokio::test]
    async fn misplaced_collection_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = CollectionSnapshot::new(CollectionName::Meta);
        std::fs::write(
            dir.path().join("records.json"),
            snapshot.to_json().unwrap(),
        )
        .unwrap();

        let result = FileBackend::open(dir.path()).await;
        assert!(matches!(result, Err(Error::InvalidSnapshot(_))));
    }
}
