//! Shared fixtures for the engine integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use offsync_engine::{
    ConnectivityMonitor, Fields, LocalStore, MemoryBackend, OperationQueue, Record, RecordId,
    RemoteApi, RemoteError, RemoteResult, StorageBackend, SyncCoordinator,
};
use serde_json::json;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tracing_subscriber::EnvFilter;

/// Route engine logs to the test harness. `RUST_LOG` overrides the default
/// filter; repeated calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "offsync_engine=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

pub fn fields(value: serde_json::Value) -> Fields {
    value.as_object().cloned().unwrap()
}

/// In-memory stand-in for the remote API.
///
/// Assigns increasing integer ids, stamps a `registration_date` on create,
/// logs every mutating call, and can be told to fail or to hold calls until
/// released.
#[derive(Default)]
pub struct FakeRemote {
    pub records: Mutex<BTreeMap<i64, Fields>>,
    next_id: Mutex<i64>,
    failing_ids: Mutex<HashSet<RecordId>>,
    failing_names: Mutex<HashSet<String>>,
    pub fail_all: AtomicBool,
    pub calls: Mutex<Vec<String>>,
    hold: AtomicBool,
    entered: Notify,
    release: Notify,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Put a record on the remote and make sure later ids are higher.
    pub fn seed(&self, id: i64, payload: serde_json::Value) {
        self.records.lock().unwrap().insert(id, fields(payload));
        let mut next = self.next_id.lock().unwrap();
        *next = (*next).max(id);
    }

    /// The next created record gets `id + 1`.
    pub fn set_last_id(&self, id: i64) {
        *self.next_id.lock().unwrap() = id;
    }

    pub fn fail_on(&self, id: RecordId) {
        self.failing_ids.lock().unwrap().insert(id);
    }

    pub fn fail_creates_named(&self, name: &str) {
        self.failing_names.lock().unwrap().insert(name.to_string());
    }

    pub fn heal(&self) {
        self.failing_ids.lock().unwrap().clear();
        self.failing_names.lock().unwrap().clear();
        self.fail_all.store(false, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn snapshot(&self) -> BTreeMap<i64, Fields> {
        self.records.lock().unwrap().clone()
    }

    /// Make mutating calls wait for [`FakeRemote::release`].
    pub fn hold_calls(&self, hold: bool) {
        self.hold.store(hold, Ordering::SeqCst);
    }

    /// Wait until a held call has started.
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }

    async fn enter(&self, call: String) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.calls.lock().unwrap().push(call);
        if self.hold.load(Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn check(&self, id: &RecordId) -> RemoteResult<i64> {
        if self.fail_all.load(Ordering::SeqCst) || self.failing_ids.lock().unwrap().contains(id) {
            return Err(RemoteError::Status {
                status: 500,
                body: "internal error".into(),
            });
        }
        match id {
            RecordId::Int(n) => Ok(*n),
            RecordId::Text(_) => Err(RemoteError::NotFound),
        }
    }

    fn do_create(&self, fields: &Fields) -> RemoteResult<Record> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(RemoteError::Unreachable);
        }
        if let Some(name) = fields.get("name").and_then(|v| v.as_str()) {
            if self.failing_names.lock().unwrap().contains(name) {
                return Err(RemoteError::Status {
                    status: 500,
                    body: "rejected".into(),
                });
            }
        }
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        let mut stored = fields.clone();
        stored
            .entry("registration_date")
            .or_insert_with(|| json!("2024-01-15"));
        self.records.lock().unwrap().insert(*next, stored.clone());
        Ok(Record::new(*next, stored))
    }

    fn do_update(&self, id: &RecordId, changes: &Fields) -> RemoteResult<Record> {
        let n = self.check(id)?;
        let mut records = self.records.lock().unwrap();
        let stored = records.get_mut(&n).ok_or(RemoteError::NotFound)?;
        for (key, value) in changes {
            stored.insert(key.clone(), value.clone());
        }
        Ok(Record::new(n, stored.clone()))
    }

    fn do_delete(&self, id: &RecordId) -> RemoteResult<()> {
        let n = self.check(id)?;
        self.records
            .lock()
            .unwrap()
            .remove(&n)
            .map(|_| ())
            .ok_or(RemoteError::NotFound)
    }
}

#[async_trait]
impl RemoteApi for FakeRemote {
    async fn list(&self) -> RemoteResult<Vec<Record>> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(RemoteError::Unreachable);
        }
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .map(|(id, f)| Record::new(*id, f.clone()))
            .collect())
    }

    async fn get(&self, id: &RecordId) -> RemoteResult<Option<Record>> {
        let n = self.check(id)?;
        Ok(self
            .records
            .lock()
            .unwrap()
            .get(&n)
            .map(|f| Record::new(n, f.clone())))
    }

    async fn create(&self, fields: &Fields) -> RemoteResult<Record> {
        self.enter("create".to_string()).await;
        let result = self.do_create(fields);
        self.leave();
        result
    }

    async fn update(&self, id: &RecordId, changes: &Fields) -> RemoteResult<Record> {
        self.enter(format!("update {id}")).await;
        let result = self.do_update(id, changes);
        self.leave();
        result
    }

    async fn delete(&self, id: &RecordId) -> RemoteResult<()> {
        self.enter(format!("delete {id}")).await;
        let result = self.do_delete(id);
        self.leave();
        result
    }

    async fn generate_batch(&self) -> RemoteResult<Vec<Record>> {
        let mut created = Vec::new();
        for i in 0..3 {
            created.push(self.do_create(&fields(json!({"name": format!("Generated {i}")})))?);
        }
        Ok(created)
    }
}

/// Store, queue, coordinator and monitor over a memory backend.
pub struct Parts {
    pub backend: Arc<MemoryBackend>,
    pub store: Arc<LocalStore>,
    pub queue: Arc<OperationQueue>,
    pub remote: Arc<FakeRemote>,
    pub monitor: Arc<ConnectivityMonitor>,
    pub coordinator: Arc<SyncCoordinator>,
}

pub async fn parts(reachable: bool) -> Parts {
    init_tracing();
    let backend = Arc::new(MemoryBackend::new());
    let shared: Arc<dyn StorageBackend> = backend.clone();
    let store = Arc::new(LocalStore::new(shared.clone()));
    let queue = Arc::new(OperationQueue::open(shared).await.unwrap());
    let remote = FakeRemote::new();
    let monitor = ConnectivityMonitor::new_shared(reachable);
    let coordinator = Arc::new(SyncCoordinator::new(
        store.clone(),
        queue.clone(),
        remote.clone(),
        monitor.clone(),
    ));
    Parts {
        backend,
        store,
        queue,
        remote,
        monitor,
        coordinator,
    }
}

/// Local records keyed by integer id. Panics on temporary ids, which must
/// all have been replaced once the queue is drained.
pub async fn local_snapshot(store: &LocalStore) -> BTreeMap<i64, Fields> {
    store
        .get_all()
        .await
        .unwrap()
        .into_iter()
        .map(|record| match record.id {
            RecordId::Int(n) => (n, record.fields),
            other => panic!("unexpected non-remote id {other}"),
        })
        .collect()
}
