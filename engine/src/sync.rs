//! Sync coordinator: replays the operation queue against the remote.
//!
//! # Algorithm
//!
//! 1. If the remote is unreachable, do nothing
//! 2. Snapshot the pending queue; operations enqueued during the pass wait
//!    for the next one
//! 3. Replay each operation in order. On acknowledgment remove it from the
//!    queue and mirror the result locally; on failure log it and move on.
//!    An update the remote answers with "not found" can never succeed; it is
//!    discarded along with the local copy of its record
//! 4. Emit one [`SyncCompleted`] per finished pass
//!
//! Only one pass runs at a time. A trigger that arrives while a pass is
//! running is folded into a single follow-up pass started when the current
//! one finishes.

use crate::connectivity::ConnectivityMonitor;
use crate::remote::{RemoteApi, RemoteError, RemoteResult};
use crate::{
    error::Result, LocalStore, Operation, OperationId, OperationQueue, PendingOperation, RecordId,
};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

const COMPLETED_CHANNEL_CAPACITY: usize = 16;

/// Zero-argument notification published after every completed sync pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncCompleted;

/// What happened during a [`SyncCoordinator::sync`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// Passes run (the first plus any coalesced follow-ups)
    pub passes: u32,
    /// Operations dispatched or considered
    pub attempted: usize,
    /// Operations the remote acknowledged, now removed from the queue
    pub acknowledged: Vec<OperationId>,
    /// Updates of records the remote does not have, removed from the queue
    pub discarded: Vec<OperationId>,
    /// Operations left in the queue
    pub failed: Vec<OperationId>,
}

impl SyncReport {
    /// Check if every attempted operation was acknowledged.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// How a replayed operation left the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Replayed {
    Acknowledged,
    Discarded,
}

/// Result of asking for a sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// This call ran one or more passes
    Completed(SyncReport),
    /// The remote is unreachable; nothing was attempted
    Skipped,
    /// A pass was already running; it will run a follow-up pass for us
    Coalesced,
}

/// Drains the operation queue against the remote.
pub struct SyncCoordinator {
    store: Arc<LocalStore>,
    queue: Arc<OperationQueue>,
    remote: Arc<dyn RemoteApi>,
    monitor: Arc<ConnectivityMonitor>,
    /// Set while a caller is draining
    running: AtomicBool,
    /// Set by every trigger, cleared when a pass starts
    follow_up: AtomicBool,
    completed: broadcast::Sender<SyncCompleted>,
}

impl SyncCoordinator {
    pub fn new(
        store: Arc<LocalStore>,
        queue: Arc<OperationQueue>,
        remote: Arc<dyn RemoteApi>,
        monitor: Arc<ConnectivityMonitor>,
    ) -> Self {
        let (completed, _) = broadcast::channel(COMPLETED_CHANNEL_CAPACITY);
        Self {
            store,
            queue,
            remote,
            monitor,
            running: AtomicBool::new(false),
            follow_up: AtomicBool::new(false),
            completed,
        }
    }

    /// Subscribe to sync-completed notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncCompleted> {
        self.completed.subscribe()
    }

    /// Check if a pass is in progress.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Trigger a sync.
    ///
    /// Remote failures never make this fail; only local storage errors do.
    pub async fn sync(&self) -> Result<SyncOutcome> {
        if !self.monitor.is_reachable() {
            tracing::debug!("remote unreachable, sync skipped");
            return Ok(SyncOutcome::Skipped);
        }

        self.follow_up.store(true, Ordering::SeqCst);
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("sync already running, trigger coalesced");
            return Ok(SyncOutcome::Coalesced);
        }

        let mut report = SyncReport::default();
        loop {
            let drained = self.drain(&mut report).await;
            self.running.store(false, Ordering::SeqCst);
            drained?;

            // A trigger may have landed between the last check and the
            // store above; its caller saw `running` and returned.
            if !self.follow_up.load(Ordering::SeqCst)
                || self
                    .running
                    .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                    .is_err()
            {
                break;
            }
        }

        Ok(SyncOutcome::Completed(report))
    }

    async fn drain(&self, report: &mut SyncReport) -> Result<()> {
        while self.follow_up.swap(false, Ordering::SeqCst) {
            if !self.monitor.is_reachable() {
                tracing::debug!("remote went away, remaining triggers dropped");
                break;
            }
            self.run_pass(report).await?;
            report.passes += 1;
            let _ = self.completed.send(SyncCompleted);
        }
        Ok(())
    }

    async fn run_pass(&self, report: &mut SyncReport) -> Result<()> {
        let snapshot = self.queue.list_pending().await?;
        tracing::info!(pending = snapshot.len(), "sync pass started");

        // Targets with a failed operation earlier in this pass. Later
        // operations on them wait so the remote never sees them out of order.
        let mut blocked: HashSet<RecordId> = HashSet::new();
        let mut settled = 0usize;

        for pending in &snapshot {
            report.attempted += 1;
            let target = self.store.resolve(pending.operation.record_id()).await?;

            if blocked.contains(&target) {
                tracing::debug!(
                    op_id = %pending.id,
                    record_id = %target,
                    "deferred behind an earlier failure"
                );
                report.failed.push(pending.id);
                continue;
            }

            match self.replay(pending, &target).await? {
                Ok(Replayed::Acknowledged) => {
                    settled += 1;
                    report.acknowledged.push(pending.id);
                }
                Ok(Replayed::Discarded) => {
                    settled += 1;
                    report.discarded.push(pending.id);
                }
                Err(e) => {
                    tracing::warn!(
                        op_id = %pending.id,
                        kind = %pending.kind(),
                        record_id = %target,
                        error = %e,
                        "replay failed, operation stays queued"
                    );
                    blocked.insert(target);
                    report.failed.push(pending.id);
                }
            }
        }

        tracing::info!(
            settled,
            failed = snapshot.len() - settled,
            "sync pass finished"
        );
        Ok(())
    }

    /// Replay one operation. The outer result is local storage, the inner
    /// one the remote's answer.
    async fn replay(
        &self,
        pending: &PendingOperation,
        target: &RecordId,
    ) -> Result<RemoteResult<Replayed>> {
        match &pending.operation {
            Operation::Create(op) => {
                let created = match self.remote.create(&op.record.fields).await {
                    Ok(record) => record,
                    Err(e) => return Ok(Err(e)),
                };
                // Alias first: later queued operations must find the new id
                // even if we stop right after the removal.
                self.store.record_alias(&op.record.id, &created.id).await?;
                self.queue.remove(pending.id).await?;
                self.store
                    .replace_temporary(&op.record.id, &created)
                    .await?;
                tracing::debug!(
                    op_id = %pending.id,
                    temporary_id = %op.record.id,
                    assigned_id = %created.id,
                    "create acknowledged"
                );
            }
            Operation::Update(op) => {
                let updated = match self.remote.update(target, &op.changes).await {
                    Ok(record) => record,
                    Err(RemoteError::NotFound) if !target.is_temporary() => {
                        tracing::warn!(
                            op_id = %pending.id,
                            record_id = %target,
                            "remote does not have the record, update discarded"
                        );
                        self.queue.remove(pending.id).await?;
                        self.store.delete(target).await?;
                        return Ok(Ok(Replayed::Discarded));
                    }
                    Err(e) => return Ok(Err(e)),
                };
                self.queue.remove(pending.id).await?;
                // Local fields are at least as new as the acknowledged ones;
                // a record deleted locally meanwhile is not brought back.
                if let Some(local) = self.store.get(target).await? {
                    let mirrored = updated.with_id(target.clone()).merged_with(&local.fields);
                    self.store.put(&mirrored).await?;
                }
                tracing::debug!(op_id = %pending.id, record_id = %target, "update acknowledged");
            }
            Operation::Delete(_) => {
                match self.remote.delete(target).await {
                    Ok(()) => {}
                    Err(RemoteError::NotFound) => {
                        tracing::debug!(record_id = %target, "already absent on remote");
                    }
                    Err(e) => return Ok(Err(e)),
                }
                self.queue.remove(pending.id).await?;
                self.store.delete(target).await?;
                tracing::debug!(op_id = %pending.id, record_id = %target, "delete acknowledged");
            }
        }
        Ok(Ok(Replayed::Acknowledged))
    }
}
