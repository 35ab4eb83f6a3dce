//! Read/write facade: the single entry point for record CRUD.
//!
//! Every call is decided in two steps. [`route`] picks a path from the
//! connectivity state, the target id, and whether that target still has
//! queued operations; if that path is the remote and the remote call fails,
//! the call falls back to the offline path. The [`Path`] actually taken
//! travels back to the caller in the [`Outcome`].
//!
//! A record with queued operations is owned by the queue until they are
//! acknowledged: writes to it queue behind them and reads serve the local
//! copy, so the remote sees every change to one record in submission order.
//!
//! The offline path writes the Local Store first and then enqueues the
//! matching operation. Remote failures never surface as errors; local
//! storage failures always do.

use crate::batch::placeholder_batch;
use crate::connectivity::ConnectivityMonitor;
use crate::remote::{RemoteApi, RemoteError};
use crate::{
    error::Result, Error, Fields, LocalStore, Operation, OperationId, OperationQueue, Record,
    RecordId,
};
use std::collections::HashSet;
use std::sync::Arc;

/// Attempts made to enqueue before a storage error is returned.
const ENQUEUE_ATTEMPTS: u32 = 3;

/// Where a call is sent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Remote,
    Offline,
}

/// Choose a route. Temporary ids are unknown to the remote, and a target
/// with `queued` operations must not overtake them, so both stay local.
pub fn route(reachable: bool, target: Option<&RecordId>, queued: bool) -> Route {
    match target {
        Some(id) if id.is_temporary() => Route::Offline,
        Some(_) if queued => Route::Offline,
        _ if reachable => Route::Remote,
        _ => Route::Offline,
    }
}

/// The path a call actually took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Path {
    /// The remote answered; its result was mirrored locally
    RemoteSuccess,
    /// The remote was tried and failed; served by the offline path
    RemoteFailureFallback,
    /// The remote was not tried
    OfflineDirect,
}

impl Path {
    /// Check if the call's effect still has to reach the remote (for writes)
    /// or was served from the local cache (for reads).
    pub fn is_local(&self) -> bool {
        !matches!(self, Path::RemoteSuccess)
    }
}

/// A facade result tagged with the path that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    pub value: T,
    pub path: Path,
}

impl<T> Outcome<T> {
    pub fn new(value: T, path: Path) -> Self {
        Self { value, path }
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            value: f(self.value),
            path: self.path,
        }
    }
}

/// Consumer-facing CRUD over the remote, the Local Store and the queue.
pub struct Facade {
    store: Arc<LocalStore>,
    queue: Arc<OperationQueue>,
    remote: Arc<dyn RemoteApi>,
    monitor: Arc<ConnectivityMonitor>,
    batch_size: usize,
}

impl Facade {
    pub fn new(
        store: Arc<LocalStore>,
        queue: Arc<OperationQueue>,
        remote: Arc<dyn RemoteApi>,
        monitor: Arc<ConnectivityMonitor>,
        batch_size: usize,
    ) -> Self {
        Self {
            store,
            queue,
            remote,
            monitor,
            batch_size,
        }
    }

    async fn route_for(&self, target: Option<&RecordId>) -> Result<Route> {
        let reachable = self.monitor.is_reachable();
        let queued = match target {
            Some(id) if reachable && !id.is_temporary() => {
                self.queued_targets().await?.contains(id)
            }
            _ => false,
        };
        Ok(route(reachable, target, queued))
    }

    /// List all records.
    ///
    /// Online, records with queued operations are reported as the local copy
    /// holds them (or left out if deleted locally), and records created
    /// offline that the remote has not seen yet are included.
    pub async fn list(&self) -> Result<Outcome<Vec<Record>>> {
        let path = match self.route_for(None).await? {
            Route::Remote => match self.remote.list().await {
                Ok(records) => {
                    let listed = self.mirror_listing(records).await?;
                    return Ok(Outcome::new(listed, Path::RemoteSuccess));
                }
                Err(e) => fallback("list", None, &e),
            },
            Route::Offline => Path::OfflineDirect,
        };
        Ok(Outcome::new(self.store.get_all().await?, path))
    }

    /// Get one record. An unknown id is `None`, not an error.
    pub async fn get(&self, id: &RecordId) -> Result<Outcome<Option<Record>>> {
        validate_id(id)?;
        let target = self.store.resolve(id).await?;

        let path = match self.route_for(Some(&target)).await? {
            Route::Remote => match self.remote.get(&target).await {
                Ok(Some(record)) => {
                    self.store.put(&record).await?;
                    return Ok(Outcome::new(Some(record), Path::RemoteSuccess));
                }
                Ok(None) => return Ok(Outcome::new(None, Path::RemoteSuccess)),
                Err(e) => fallback("get", Some(&target), &e),
            },
            Route::Offline => Path::OfflineDirect,
        };
        Ok(Outcome::new(self.store.get(&target).await?, path))
    }

    /// Create a record. Any `id` in `fields` is ignored; the remote (or the
    /// offline path) assigns one.
    pub async fn create(&self, mut fields: Fields) -> Result<Outcome<Record>> {
        fields.remove("id");

        let path = match self.route_for(None).await? {
            Route::Remote => match self.remote.create(&fields).await {
                Ok(record) => {
                    self.store.put(&record).await?;
                    return Ok(Outcome::new(record, Path::RemoteSuccess));
                }
                Err(e) => fallback("create", None, &e),
            },
            Route::Offline => Path::OfflineDirect,
        };
        let record = self.create_offline(fields).await?;
        Ok(Outcome::new(record, path))
    }

    /// Apply a partial update.
    ///
    /// Offline, an id missing from the Local Store gets a record holding just
    /// `changes`; the acknowledged update replaces it with the remote's full
    /// record, or removes it if the remote does not know the id.
    pub async fn update(&self, id: &RecordId, mut changes: Fields) -> Result<Outcome<Record>> {
        validate_id(id)?;
        if let Some(embedded) = changes.remove("id") {
            if serde_json::from_value::<RecordId>(embedded).ok().as_ref() != Some(id) {
                return Err(Error::MalformedPayload(format!(
                    "update for {id} carries a different id"
                )));
            }
        }
        let target = self.store.resolve(id).await?;

        let path = match self.route_for(Some(&target)).await? {
            Route::Remote => match self.remote.update(&target, &changes).await {
                Ok(record) => {
                    self.store.put(&record).await?;
                    return Ok(Outcome::new(record, Path::RemoteSuccess));
                }
                Err(e) => fallback("update", Some(&target), &e),
            },
            Route::Offline => Path::OfflineDirect,
        };

        let merged = match self.store.get(&target).await? {
            Some(local) => local.merged_with(&changes),
            None => Record::new(target.clone(), changes.clone()),
        };
        self.store.put(&merged).await?;
        self.enqueue(Operation::update(target, changes)).await?;
        Ok(Outcome::new(merged, path))
    }

    /// Delete a record. Deleting an id the remote does not know succeeds.
    pub async fn delete(&self, id: &RecordId) -> Result<Outcome<()>> {
        validate_id(id)?;
        let target = self.store.resolve(id).await?;

        let path = match self.route_for(Some(&target)).await? {
            Route::Remote => match self.remote.delete(&target).await {
                Ok(()) | Err(RemoteError::NotFound) => {
                    self.store.delete(&target).await?;
                    return Ok(Outcome::new((), Path::RemoteSuccess));
                }
                Err(e) => fallback("delete", Some(&target), &e),
            },
            Route::Offline => Path::OfflineDirect,
        };

        self.store.delete(&target).await?;
        self.enqueue(Operation::delete(target)).await?;
        Ok(Outcome::new((), path))
    }

    /// Have the remote generate a batch of records, or create placeholder
    /// records locally when it cannot.
    pub async fn generate_batch(&self) -> Result<Outcome<Vec<Record>>> {
        let path = match self.route_for(None).await? {
            Route::Remote => match self.remote.generate_batch().await {
                Ok(records) => {
                    for record in &records {
                        self.store.put(record).await?;
                    }
                    return Ok(Outcome::new(records, Path::RemoteSuccess));
                }
                Err(e) => fallback("generate_batch", None, &e),
            },
            Route::Offline => Path::OfflineDirect,
        };

        let mut created = Vec::with_capacity(self.batch_size);
        for fields in placeholder_batch(self.batch_size) {
            created.push(self.create_offline(fields).await?);
        }
        Ok(Outcome::new(created, path))
    }

    /// Number of operations waiting for the remote.
    pub async fn pending_count(&self) -> Result<usize> {
        self.queue.len().await
    }

    async fn create_offline(&self, fields: Fields) -> Result<Record> {
        let id = self.store.allocate_temporary_id().await?;
        let record = Record::new(id, fields);
        self.store.put(&record).await?;
        self.enqueue(Operation::create(record.clone())).await?;
        Ok(record)
    }

    /// Enqueue, retrying transient storage failures. The local write already
    /// happened, so giving up early would leave it unsynced.
    async fn enqueue(&self, operation: Operation) -> Result<OperationId> {
        let mut attempt = 1;
        loop {
            match self.queue.enqueue(operation.clone()).await {
                Err(e) if e.is_storage() && attempt < ENQUEUE_ATTEMPTS => {
                    tracing::warn!(attempt, error = %e, "enqueue failed, retrying");
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    /// Mirror a remote listing into the Local Store, keeping the local copy
    /// of every queued target.
    async fn mirror_listing(&self, records: Vec<Record>) -> Result<Vec<Record>> {
        let queued = self.queued_targets().await?;
        let mut seen = HashSet::with_capacity(records.len());
        let mut listed = Vec::with_capacity(records.len());

        for record in records {
            seen.insert(record.id.clone());
            if queued.contains(&record.id) {
                listed.extend(self.store.get(&record.id).await?);
            } else {
                self.store.put(&record).await?;
                listed.push(record);
            }
        }

        for local in self.store.get_all().await? {
            if queued.contains(&local.id) && !seen.contains(&local.id) {
                listed.push(local);
            }
        }
        Ok(listed)
    }

    /// Resolved ids with queued operations. Their local copy is newer than
    /// anything the remote can return.
    async fn queued_targets(&self) -> Result<HashSet<RecordId>> {
        let mut targets = HashSet::new();
        for pending in self.queue.list_pending().await? {
            targets.insert(self.store.resolve(pending.operation.record_id()).await?);
        }
        Ok(targets)
    }
}

fn validate_id(id: &RecordId) -> Result<()> {
    if id.is_valid() {
        Ok(())
    } else {
        Err(Error::MalformedPayload("record id must not be empty".into()))
    }
}

fn fallback(call: &str, target: Option<&RecordId>, error: &RemoteError) -> Path {
    match target {
        Some(id) => {
            tracing::warn!(call, record_id = %id, error = %error, "remote call failed, using offline path")
        }
        None => tracing::warn!(call, error = %error, "remote call failed, using offline path"),
    }
    Path::RemoteFailureFallback
}
