//! # Offsync Engine
//!
//! An offline-first synchronization engine for one remote resource
//! collection.
//!
//! Consumers read and write records through a [`Facade`]. While the remote is
//! reachable, calls go to it and their results are mirrored into a durable
//! [`LocalStore`]. When it is not (or a call fails), the write lands in the
//! Local Store and a matching [`PendingOperation`] is appended to the durable
//! [`OperationQueue`]. When connectivity returns, the [`SyncCoordinator`]
//! replays the queue in submission order and publishes a [`SyncCompleted`]
//! notification after each pass.
//!
//! ## Core Concepts
//!
//! ### Records
//!
//! A [`Record`] is an id plus an opaque, flat map of fields. Ids are either
//! remote-assigned integers or text. Records created offline get a temporary
//! id (`local-<n>`) from a durable counter; once the remote acknowledges the
//! create, the record moves to its assigned id and the temporary id is kept
//! as an alias.
//!
//! ### Operations
//!
//! Queued mutations are [`Operation`]s:
//! - [`CreateOp`] - the full record, under its temporary id
//! - [`UpdateOp`] - the target id and the changed fields
//! - [`DeleteOp`] - the target id
//!
//! ### Connectivity
//!
//! The [`ConnectivityMonitor`] debounces an injected reachability signal and
//! calls its subscribers once per reconnect. [`OfflineEngine`] ties its
//! lifecycle to `init`/`teardown`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use offsync_engine::{EngineConfig, OfflineEngine};
//! use serde_json::json;
//!
//! # async fn run() -> offsync_engine::Result<()> {
//! let engine = OfflineEngine::open(&EngineConfig::from_env()?).await?;
//! engine.start().await?;
//!
//! let fields = json!({"name": "Ada Lovelace"}).as_object().cloned().unwrap_or_default();
//! let created = engine.facade().create(fields).await?;
//! println!("{} via {:?}", created.value.id, created.path);
//!
//! engine.teardown().await;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod batch;
pub mod clock;
pub mod config;
pub mod connectivity;
pub mod engine;
pub mod error;
pub mod facade;
pub mod operation;
pub mod queue;
pub mod record;
pub mod remote;
pub mod snapshot;
pub mod store;
pub mod sync;

pub use backend::{CollectionName, FileBackend, MemoryBackend, StorageBackend};
pub use clock::Sequence;
pub use config::EngineConfig;
pub use connectivity::{CallbackId, ConnectivityMonitor, ReachabilityProbe, Transition};
pub use engine::OfflineEngine;
pub use error::{Error, Result};
pub use facade::{route, Facade, Outcome, Path, Route};
pub use operation::{
    CreateOp, DeleteOp, Operation, OperationId, OperationKind, PendingOperation, UpdateOp,
};
pub use queue::OperationQueue;
pub use record::{Fields, Record, RecordId, TEMPORARY_ID_PREFIX};
pub use remote::{HttpRemote, RemoteApi, RemoteError, RemoteResult};
pub use snapshot::{CollectionSnapshot, SNAPSHOT_FORMAT_VERSION};
pub use store::LocalStore;
pub use sync::{SyncCompleted, SyncCoordinator, SyncOutcome, SyncReport};

/// Timestamp type (milliseconds since Unix epoch).
pub type Timestamp = u64;
