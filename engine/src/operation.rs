//! Operation types for expressing queued changes.
//!
//! Mutations that could not be acknowledged by the remote are expressed as
//! operations and kept in the [`OperationQueue`](crate::OperationQueue) until
//! they are replayed.

use crate::{Fields, Record, RecordId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a pending operation.
///
/// Ids come from a durable monotonic sequence, so their order is the
/// submission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(u64);

impl OperationId {
    pub fn new(seq: u64) -> Self {
        Self(seq)
    }

    pub fn seq(&self) -> u64 {
        self.0
    }

    /// Storage key. Zero-padded so lexicographic order equals numeric order.
    pub fn storage_key(&self) -> String {
        format!("op-{:020}", self.0)
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_key())
    }
}

/// The kind of mutation an operation represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::Create => "create",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// A create operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOp {
    /// The full record, under its temporary id
    pub record: Record,
}

/// An update operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOp {
    /// Record ID to update
    pub id: RecordId,
    /// Changed fields only
    pub changes: Fields,
}

/// A delete operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOp {
    /// Record ID to delete
    pub id: RecordId,
}

/// A mutation that can be replayed against the remote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Operation {
    Create(CreateOp),
    Update(UpdateOp),
    Delete(DeleteOp),
}

impl Operation {
    pub fn create(record: Record) -> Self {
        Operation::Create(CreateOp { record })
    }

    pub fn update(id: RecordId, changes: Fields) -> Self {
        Operation::Update(UpdateOp { id, changes })
    }

    pub fn delete(id: RecordId) -> Self {
        Operation::Delete(DeleteOp { id })
    }

    /// Get the operation kind.
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Create(_) => OperationKind::Create,
            Operation::Update(_) => OperationKind::Update,
            Operation::Delete(_) => OperationKind::Delete,
        }
    }

    /// Get the record ID this operation targets.
    pub fn record_id(&self) -> &RecordId {
        match self {
            Operation::Create(op) => &op.record.id,
            Operation::Update(op) => &op.id,
            Operation::Delete(op) => &op.id,
        }
    }
}

/// An operation waiting to be acknowledged by the remote.
///
/// Never mutated once enqueued; it is only ever removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOperation {
    /// Queue-assigned identifier
    pub id: OperationId,
    /// The mutation to replay
    pub operation: Operation,
    /// When it was submitted (milliseconds since epoch)
    pub submitted_at: Timestamp,
}

impl PendingOperation {
    pub fn kind(&self) -> OperationKind {
        self.operation.kind()
    }
}

/// Queue entries order by id, which is the submission order.
impl Ord for PendingOperation {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl PartialOrd for PendingOperation {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Eq for PendingOperation {}
