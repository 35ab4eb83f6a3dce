//! Local store - the durable record cache.
//!
//! Holds one copy of each record the client knows about, whether it came
//! from the remote or was written while offline. Also owns the bookkeeping
//! for temporary identifiers: allocating them and remembering which remote
//! id each one was eventually replaced by.

use crate::backend::{CollectionName, StorageBackend};
use crate::clock::Sequence;
use crate::{error::Result, Record, RecordId};
use std::sync::Arc;

const TEMPORARY_ID_SEQUENCE: &str = "temporary_id";

/// The local record store.
pub struct LocalStore {
    backend: Arc<dyn StorageBackend>,
    temporary_ids: Sequence,
}

impl LocalStore {
    /// Create a store over a backend.
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        let temporary_ids = Sequence::new(backend.clone(), TEMPORARY_ID_SEQUENCE);
        Self {
            backend,
            temporary_ids,
        }
    }

    /// Insert or fully overwrite a record.
    pub async fn put(&self, record: &Record) -> Result<()> {
        let value = serde_json::to_value(record)?;
        self.backend
            .put(CollectionName::Records, &record.id.storage_key(), value)
            .await
    }

    /// Get a record by ID. Absent ids are `None`, not an error.
    pub async fn get(&self, id: &RecordId) -> Result<Option<Record>> {
        match self
            .backend
            .get(CollectionName::Records, &id.storage_key())
            .await?
        {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Get all records, in storage-key order.
    pub async fn get_all(&self) -> Result<Vec<Record>> {
        self.backend
            .get_all(CollectionName::Records)
            .await?
            .into_iter()
            .map(|(_, value)| serde_json::from_value(value).map_err(Into::into))
            .collect()
    }

    /// Remove a record. Removing an absent id is a no-op.
    pub async fn delete(&self, id: &RecordId) -> Result<()> {
        self.backend
            .delete(CollectionName::Records, &id.storage_key())
            .await?;
        Ok(())
    }

    /// Check if a record exists.
    pub async fn contains(&self, id: &RecordId) -> Result<bool> {
        Ok(self
            .backend
            .get(CollectionName::Records, &id.storage_key())
            .await?
            .is_some())
    }

    /// Count of stored records.
    pub async fn len(&self) -> Result<usize> {
        Ok(self.backend.get_all(CollectionName::Records).await?.len())
    }

    /// Check if the store has no records.
    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Allocate a temporary identifier for a record created offline.
    ///
    /// Never returns an id that is already present in the store.
    pub async fn allocate_temporary_id(&self) -> Result<RecordId> {
        loop {
            let id = RecordId::temporary(self.temporary_ids.next().await?);
            if !self.contains(&id).await? {
                return Ok(id);
            }
        }
    }

    /// Remember that `temporary` is now known to the remote as `assigned`.
    pub async fn record_alias(&self, temporary: &RecordId, assigned: &RecordId) -> Result<()> {
        let value = serde_json::to_value(assigned)?;
        self.backend
            .put(CollectionName::Meta, &alias_key(temporary), value)
            .await
    }

    /// Map an id to the id the remote knows it by. Ids without an alias map
    /// to themselves.
    pub async fn resolve(&self, id: &RecordId) -> Result<RecordId> {
        if !id.is_temporary() {
            return Ok(id.clone());
        }
        match self
            .backend
            .get(CollectionName::Meta, &alias_key(id))
            .await?
        {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(id.clone()),
        }
    }

    /// Move a locally-created record to its remote-assigned id.
    ///
    /// The remote record is the base; any fields the local copy carries
    /// (including offline edits made after the create) are laid over it. If
    /// the temporary record is gone (deleted offline), nothing is stored under
    /// the new id. The alias is recorded either way.
    pub async fn replace_temporary(&self, temporary: &RecordId, remote: &Record) -> Result<()> {
        if let Some(local) = self.get(temporary).await? {
            self.put(&remote.merged_with(&local.fields)).await?;
        }
        self.record_alias(temporary, &remote.id).await?;
        if temporary != &remote.id {
            self.delete(temporary).await?;
        }
        Ok(())
    }
}

fn alias_key(temporary: &RecordId) -> String {
    format!("alias:{}", temporary.storage_key())
}
