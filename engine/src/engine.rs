//! Engine assembly and lifecycle.
//!
//! [`OfflineEngine`] wires one backend, one remote and one connectivity
//! monitor into a store, a queue, a facade and a sync coordinator.
//! Connectivity is injected: [`OfflineEngine::init`] subscribes to a
//! reachability signal and [`OfflineEngine::teardown`] unsubscribes, so
//! nothing outlives the engine instance.

use crate::backend::{FileBackend, StorageBackend};
use crate::config::EngineConfig;
use crate::connectivity::{CallbackId, ConnectivityMonitor, ReachabilityProbe, Transition};
use crate::remote::{HttpRemote, RemoteApi};
use crate::sync::{SyncCompleted, SyncCoordinator, SyncOutcome};
use crate::{error::Result, Error, Facade, LocalStore, OperationQueue};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Running background machinery, present between `init` and `teardown`.
struct Lifecycle {
    callback: CallbackId,
    shutdown: CancellationToken,
    /// Forwards the injected signal into the monitor
    signal_task: JoinHandle<()>,
    /// Sync worker and probe; they stop at the shutdown token
    workers: Vec<JoinHandle<()>>,
}

/// An offline-first client for one remote resource.
pub struct OfflineEngine {
    store: Arc<LocalStore>,
    queue: Arc<OperationQueue>,
    facade: Facade,
    coordinator: Arc<SyncCoordinator>,
    monitor: Arc<ConnectivityMonitor>,
    probe: Option<ReachabilityProbe>,
    lifecycle: Mutex<Option<Lifecycle>>,
}

impl OfflineEngine {
    /// Build an engine from configuration: a file-backed store in
    /// `data_dir`, an HTTP remote, and (if enabled) a health probe.
    pub async fn open(config: &EngineConfig) -> Result<Self> {
        let backend = Arc::new(FileBackend::open(&config.data_dir).await?);
        let remote = Arc::new(HttpRemote::new(
            config.remote_url.clone(),
            config.resource.clone(),
            config.timeout,
        )?);
        let monitor = ConnectivityMonitor::new_shared(false);

        let mut engine = Self::with_components(backend, remote, monitor, config.batch_size).await?;
        if let Some(interval) = config.probe_interval {
            engine.probe = Some(ReachabilityProbe::new(
                config.health_url.clone(),
                interval,
                config.timeout,
            )?);
        }

        tracing::info!(
            data_dir = %config.data_dir.display(),
            remote = %config.remote_url,
            resource = %config.resource,
            "engine opened"
        );
        Ok(engine)
    }

    /// Build an engine from already-constructed parts.
    pub async fn with_components(
        backend: Arc<dyn StorageBackend>,
        remote: Arc<dyn RemoteApi>,
        monitor: Arc<ConnectivityMonitor>,
        batch_size: usize,
    ) -> Result<Self> {
        let store = Arc::new(LocalStore::new(backend.clone()));
        let queue = Arc::new(OperationQueue::open(backend).await?);
        let coordinator = Arc::new(SyncCoordinator::new(
            store.clone(),
            queue.clone(),
            remote.clone(),
            monitor.clone(),
        ));
        let facade = Facade::new(
            store.clone(),
            queue.clone(),
            remote,
            monitor.clone(),
            batch_size,
        );

        Ok(Self {
            store,
            queue,
            facade,
            coordinator,
            monitor,
            probe: None,
            lifecycle: Mutex::new(None),
        })
    }

    pub fn facade(&self) -> &Facade {
        &self.facade
    }

    pub fn coordinator(&self) -> &SyncCoordinator {
        &self.coordinator
    }

    pub fn monitor(&self) -> &Arc<ConnectivityMonitor> {
        &self.monitor
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn queue(&self) -> &OperationQueue {
        &self.queue
    }

    /// Subscribe to sync-completed notifications.
    pub fn subscribe_sync_completed(&self) -> broadcast::Receiver<SyncCompleted> {
        self.coordinator.subscribe()
    }

    /// Run a sync now, on the caller's task.
    pub async fn sync_now(&self) -> Result<SyncOutcome> {
        self.coordinator.sync().await
    }

    /// Check if `init` has run without a matching `teardown`.
    pub fn is_initialized(&self) -> bool {
        self.lifecycle.lock().is_some()
    }

    /// Subscribe to a reachability signal and start the sync worker.
    ///
    /// Every unreachable→reachable transition queues one sync. If the remote
    /// is reachable right away and operations are pending from an earlier
    /// session, a sync is queued immediately. Calling `init` twice is a
    /// no-op.
    pub async fn init(&self, signal: watch::Receiver<bool>) -> Result<()> {
        let triggers = {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.is_some() {
                tracing::debug!("engine already initialized");
                return Ok(());
            }

            let shutdown = CancellationToken::new();
            // One slot: a trigger arriving while one is already waiting is
            // covered by it.
            let (trigger_tx, trigger_rx) = mpsc::channel::<()>(1);

            let callback_tx = trigger_tx.clone();
            let callback = self.monitor.on_reachable(move || {
                let _ = callback_tx.try_send(());
            });

            let worker = spawn_sync_worker(self.coordinator.clone(), trigger_rx, shutdown.clone());
            let initial = *signal.borrow();
            let transition = self.monitor.report(initial);
            let signal_task = self.monitor.attach(signal);

            *lifecycle = Some(Lifecycle {
                callback,
                shutdown,
                signal_task,
                workers: vec![worker],
            });

            (transition != Some(Transition::Reachable)).then_some(trigger_tx)
        };

        if let Some(trigger_tx) = triggers {
            if self.monitor.is_reachable() {
                let pending = self.queue.len().await?;
                if pending > 0 {
                    tracing::info!(pending, "pending operations from an earlier session");
                    let _ = trigger_tx.try_send(());
                }
            }
        }

        tracing::info!(reachable = self.monitor.is_reachable(), "engine initialized");
        Ok(())
    }

    /// `init` driven by the configured health probe.
    pub async fn start(&self) -> Result<()> {
        let probe = self
            .probe
            .clone()
            .ok_or_else(|| Error::Config("reachability probe is disabled".into()))?;
        if self.is_initialized() {
            return Ok(());
        }

        let (signal_tx, signal_rx) = watch::channel(self.monitor.is_reachable());
        self.init(signal_rx).await?;

        let mut lifecycle = self.lifecycle.lock();
        if let Some(lifecycle) = lifecycle.as_mut() {
            let handle = probe.spawn(signal_tx, lifecycle.shutdown.clone());
            lifecycle.workers.push(handle);
        }
        Ok(())
    }

    /// Unsubscribe and stop background tasks. A sync pass already running is
    /// allowed to finish.
    pub async fn teardown(&self) {
        let Some(lifecycle) = self.lifecycle.lock().take() else {
            return;
        };

        self.monitor.remove_callback(lifecycle.callback);
        lifecycle.shutdown.cancel();
        lifecycle.signal_task.abort();
        let _ = lifecycle.signal_task.await;

        for worker in lifecycle.workers {
            if let Err(e) = worker.await {
                tracing::warn!(error = %e, "background task ended abnormally");
            }
        }
        tracing::info!("engine torn down");
    }
}

impl Drop for OfflineEngine {
    fn drop(&mut self) {
        if let Some(lifecycle) = self.lifecycle.get_mut().take() {
            self.monitor.remove_callback(lifecycle.callback);
            lifecycle.shutdown.cancel();
            lifecycle.signal_task.abort();
        }
    }
}

fn spawn_sync_worker(
    coordinator: Arc<SyncCoordinator>,
    mut triggers: mpsc::Receiver<()>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::debug!("sync worker started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                trigger = triggers.recv() => {
                    if trigger.is_none() {
                        break;
                    }
                    if let Err(e) = coordinator.sync().await {
                        tracing::error!(error = %e, "sync failed");
                    }
                }
            }
        }
        tracing::debug!("sync worker stopped");
    })
}
