//! Durable monotonic counters and the wall clock.
//!
//! Queue ids and temporary record ids come from a [`Sequence`] rather than
//! from wall-clock time: two offline creates in the same millisecond, or a
//! clock that jumps backwards, must never produce the same identifier.

use crate::backend::{CollectionName, StorageBackend};
use crate::error::Result;
use crate::Timestamp;
use std::sync::Arc;
use tokio::sync::Mutex;

/// A monotonically increasing counter persisted in the metadata collection.
///
/// Each value handed out by [`Sequence::next`] has been written to storage
/// before it is returned, so a restart never reissues it.
pub struct Sequence {
    backend: Arc<dyn StorageBackend>,
    key: String,
    /// Last issued value, loaded lazily from storage
    counter: Mutex<Option<u64>>,
}

impl Sequence {
    /// Create a sequence stored under `name` in the metadata collection.
    pub fn new(backend: Arc<dyn StorageBackend>, name: &str) -> Self {
        Self {
            backend,
            key: format!("seq:{name}"),
            counter: Mutex::new(None),
        }
    }

    /// The last issued value (0 if none yet).
    pub async fn current(&self) -> Result<u64> {
        let mut counter = self.counter.lock().await;
        self.load(&mut counter).await
    }

    /// Increment the counter, persist it, and return the new value.
    pub async fn next(&self) -> Result<u64> {
        let mut counter = self.counter.lock().await;
        let next = self.load(&mut counter).await? + 1;
        self.store(next).await?;
        *counter = Some(next);
        Ok(next)
    }

    /// Make the counter at least as recent as `seen`.
    /// Used when existing data proves a value was already issued.
    pub async fn observe(&self, seen: u64) -> Result<()> {
        let mut counter = self.counter.lock().await;
        let current = self.load(&mut counter).await?;
        if seen > current {
            self.store(seen).await?;
            *counter = Some(seen);
        }
        Ok(())
    }

    async fn load(&self, counter: &mut Option<u64>) -> Result<u64> {
        if let Some(value) = *counter {
            return Ok(value);
        }
        let value = match self.backend.get(CollectionName::Meta, &self.key).await? {
            Some(v) => serde_json::from_value(v)?,
            None => 0,
        };
        *counter = Some(value);
        Ok(value)
    }

    async fn store(&self, value: u64) -> Result<()> {
        self.backend
            .put(CollectionName::Meta, &self.key, serde_json::json!(value))
            .await
    }
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> Timestamp {
    chrono::Utc::now().timestamp_millis().max(0) as Timestamp
}
