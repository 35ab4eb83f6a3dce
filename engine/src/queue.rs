//! Operation queue - durable FIFO of unacknowledged mutations.

use crate::backend::{CollectionName, StorageBackend};
use crate::clock::{now_millis, Sequence};
use crate::{error::Result, Error, Operation, OperationId, PendingOperation};
use std::sync::Arc;

const OPERATION_SEQUENCE: &str = "operation_id";

/// The pending-operation queue.
///
/// Entries are listed in submission order and are only ever removed, never
/// edited.
pub struct OperationQueue {
    backend: Arc<dyn StorageBackend>,
    ids: Sequence,
}

impl OperationQueue {
    /// Open the queue stored in `backend`.
    ///
    /// The id sequence is moved past every id already present, so entries
    /// that outlived their counter cannot be collided with.
    pub async fn open(backend: Arc<dyn StorageBackend>) -> Result<Self> {
        let ids = Sequence::new(backend.clone(), OPERATION_SEQUENCE);
        let queue = Self { backend, ids };

        if let Some(last) = queue.list_pending().await?.last() {
            queue.ids.observe(last.id.seq()).await?;
        }

        Ok(queue)
    }

    /// Append an operation. Returns the id it was assigned.
    pub async fn enqueue(&self, operation: Operation) -> Result<OperationId> {
        let id = OperationId::new(self.ids.next().await?);
        let pending = PendingOperation {
            id,
            operation,
            submitted_at: now_millis(),
        };
        let value = serde_json::to_value(&pending)?;

        if !self
            .backend
            .insert_new(CollectionName::PendingOperations, &id.storage_key(), value)
            .await?
        {
            tracing::error!(op_id = %id, "generated operation id already queued");
            return Err(Error::OperationIdCollision(id));
        }

        tracing::debug!(
            op_id = %id,
            kind = %pending.kind(),
            record_id = %pending.operation.record_id(),
            "operation queued"
        );
        Ok(id)
    }

    /// All pending operations in submission order.
    pub async fn list_pending(&self) -> Result<Vec<PendingOperation>> {
        let mut pending = self
            .backend
            .get_all(CollectionName::PendingOperations)
            .await?
            .into_iter()
            .map(|(_, value)| serde_json::from_value(value))
            .collect::<std::result::Result<Vec<PendingOperation>, _>>()?;
        pending.sort();
        Ok(pending)
    }

    /// Remove an acknowledged operation. Removing an absent id is a no-op.
    /// Returns whether the entry was still queued.
    pub async fn remove(&self, id: OperationId) -> Result<bool> {
        let removed = self
            .backend
            .delete(CollectionName::PendingOperations, &id.storage_key())
            .await?;
        if removed {
            tracing::debug!(op_id = %id, "operation removed from queue");
        }
        Ok(removed)
    }

    /// Count of pending operations.
    pub async fn len(&self) -> Result<usize> {
        Ok(self
            .backend
            .get_all(CollectionName::PendingOperations)
            .await?
            .len())
    }

    /// Check if nothing is pending.
    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::{Fields, OperationKind, Record, RecordId};
    use serde_json::json;

    fn fields(value: serde_json::Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    async fn test_queue() -> OperationQueue {
        OperationQueue::open(Arc::new(MemoryBackend::new()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn empty_queue() {
        let queue = test_queue().await;
        assert!(queue.list_pending().await.unwrap().is_empty());
        assert!(queue.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn enqueue_preserves_submission_order() {
        let queue = test_queue().await;

        let a = queue
            .enqueue(Operation::create(Record::new(
                RecordId::temporary(1),
                fields(json!({"name": "A"})),
            )))
            .await
            .unwrap();
        let b = queue
            .enqueue(Operation::update(
                RecordId::temporary(1),
                fields(json!({"name": "B"})),
            ))
            .await
            .unwrap();
        let c = queue
            .enqueue(Operation::delete(RecordId::temporary(1)))
            .await
            .unwrap();

        assert!(a < b && b < c);

        let pending = queue.list_pending().await.unwrap();
        let ids: Vec<_> = pending.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![a, b, c]);

        let kinds: Vec<_> = pending.iter().map(|p| p.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                OperationKind::Create,
                OperationKind::Update,
                OperationKind::Delete
            ]
        );
    }

    #[tokio::test]
    async fn order_holds_past_ten() {
        let queue = test_queue().await;
        for i in 0..12 {
            queue
                .enqueue(Operation::delete(RecordId::Int(i)))
                .await
                .unwrap();
        }
        let targets: Vec<_> = queue
            .list_pending()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.operation.record_id().clone())
            .collect();
        let expected: Vec<_> = (0..12).map(RecordId::Int).collect();
        assert_eq!(targets, expected);
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let queue = test_queue().await;
        let id = queue
            .enqueue(Operation::delete(RecordId::Int(7)))
            .await
            .unwrap();

        assert!(queue.remove(id).await.unwrap());
        assert!(!queue.remove(id).await.unwrap());
        assert!(queue.is_empty().await.unwrap());

        // Never-issued id
        assert!(!queue.remove(OperationId::new(999)).await.unwrap());
    }

    #[tokio::test]
    async fn ids_are_not_reused_after_removal() {
        let queue = test_queue().await;
        let a = queue
            .enqueue(Operation::delete(RecordId::Int(1)))
            .await
            .unwrap();
        queue.remove(a).await.unwrap();
        let b = queue
            .enqueue(Operation::delete(RecordId::Int(1)))
            .await
            .unwrap();
        assert!(b > a);
    }

    #[tokio::test]
    async fn reopen_continues_sequence() {
        let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());

        let first = {
            let queue = OperationQueue::open(backend.clone()).await.unwrap();
            queue
                .enqueue(Operation::delete(RecordId::Int(1)))
                .await
                .unwrap()
        };

        let queue = OperationQueue::open(backend).await.unwrap();
        assert_eq!(queue.len().await.unwrap(), 1);
        let second = queue
            .enqueue(Operation::delete(RecordId::Int(2)))
            .await
            .unwrap();
        assert!(second > first);
    }

    #[tokio::test]
    async fn collision_is_fatal() {
        let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
        let queue = OperationQueue::open(backend.clone()).await.unwrap();

        // Something else wrote at the id the sequence will issue next
        let squatter = PendingOperation {
            id: OperationId::new(1),
            operation: Operation::delete(RecordId::Int(99)),
            submitted_at: 0,
        };
        backend
            .put(
                CollectionName::PendingOperations,
                &squatter.id.storage_key(),
                serde_json::to_value(&squatter).unwrap(),
            )
            .await
            .unwrap();

        let result = queue.enqueue(Operation::delete(RecordId::Int(1))).await;
        assert!(matches!(result, Err(Error::OperationIdCollision(id)) if id == OperationId::new(1)));
    }
}
