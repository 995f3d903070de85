//! Persisted mutation queue
//!
//! The queue is an ordered list of [`QueuedOperation`]s stored as a single
//! record, `sync_queue/pending`. The in-memory list and the stored list are
//! kept in lockstep:
//!
//! - every change is applied to a copy of the list, the copy is persisted,
//!   and only then does it replace the in-memory list
//! - a failed write therefore leaves memory untouched (rollback)
//! - the `tokio::sync::Mutex` guarding the list is held across the write
//!
//! The stored list is the single source of truth on restart:
//! [`MutationQueue::open`] rehydrates it before any enqueue is accepted.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use timegrid_core::domain::{
    EntityType, OperationId, OperationKind, QueuedOperation, Record, NS_SYNC_QUEUE,
};
use timegrid_core::ports::{IClock, IStorageEngine, SystemClock};

use crate::SyncError;

/// Record id of the persisted pending list inside `sync_queue`
pub const PENDING_RECORD_ID: &str = "pending";

/// FIFO queue of writes waiting for connectivity
pub struct MutationQueue {
    storage: Arc<dyn IStorageEngine>,
    clock: Arc<dyn IClock>,
    pending: Mutex<Vec<QueuedOperation>>,
}

impl MutationQueue {
    /// Opens the queue, rehydrating it from storage
    pub async fn open(storage: Arc<dyn IStorageEngine>) -> Result<Self, SyncError> {
        Self::open_with_clock(storage, Arc::new(SystemClock)).await
    }

    /// Like [`open`](Self::open) with an injected clock for enqueue timestamps
    pub async fn open_with_clock(
        storage: Arc<dyn IStorageEngine>,
        clock: Arc<dyn IClock>,
    ) -> Result<Self, SyncError> {
        let pending = load(storage.as_ref()).await?;
        info!(pending = pending.len(), "Mutation queue rehydrated");
        Ok(Self {
            storage,
            clock,
            pending: Mutex::new(pending),
        })
    }

    /// Queues a new operation and returns its id
    ///
    /// The operation is persisted before this returns. `Update` and
    /// `Delete` payloads must carry the remote id in their `id` field.
    pub async fn enqueue(
        &self,
        kind: OperationKind,
        entity_type: EntityType,
        payload: Value,
    ) -> Result<OperationId, SyncError> {
        let op = QueuedOperation::new(kind, entity_type, payload, self.clock.now());
        let id = *op.id();
        self.push(op).await?;
        Ok(id)
    }

    /// Appends an already-built operation
    pub async fn push(&self, op: QueuedOperation) -> Result<(), SyncError> {
        if op.kind().requires_remote_id() {
            op.require_remote_id()?;
        }

        let mut pending = self.pending.lock().await;
        let mut next = pending.clone();
        debug!(
            op_id = %op.id(),
            kind = %op.kind(),
            entity = %op.entity_type(),
            "Enqueuing operation"
        );
        next.push(op);
        self.persist(&next).await?;
        *pending = next;
        Ok(())
    }

    /// Number of queued operations
    pub async fn size(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Ordered snapshot of the queue
    pub async fn peek_all(&self) -> Vec<QueuedOperation> {
        self.pending.lock().await.clone()
    }

    /// Looks up one operation
    pub async fn get(&self, id: &OperationId) -> Option<QueuedOperation> {
        self.pending
            .lock()
            .await
            .iter()
            .find(|op| op.id() == id)
            .cloned()
    }

    /// Removes one operation; returns whether it was queued
    pub async fn remove(&self, id: &OperationId) -> Result<bool, SyncError> {
        let mut pending = self.pending.lock().await;
        let Some(index) = pending.iter().position(|op| op.id() == id) else {
            return Ok(false);
        };

        let mut next = pending.clone();
        next.remove(index);
        self.persist(&next).await?;
        *pending = next;
        Ok(true)
    }

    /// Counts a failed attempt and returns the new retry count
    pub async fn record_failure(&self, id: &OperationId) -> Result<u32, SyncError> {
        let mut pending = self.pending.lock().await;
        let mut next = pending.clone();
        let op = next
            .iter_mut()
            .find(|op| op.id() == id)
            .ok_or(SyncError::OperationNotFound(*id))?;
        op.record_failure();
        let retry_count = op.retry_count();

        self.persist(&next).await?;
        *pending = next;
        Ok(retry_count)
    }

    /// Re-reads the persisted list, replacing the in-memory one
    ///
    /// Used when another process or window changed the store.
    pub async fn reload(&self) -> Result<usize, SyncError> {
        let mut pending = self.pending.lock().await;
        *pending = load(self.storage.as_ref()).await?;
        debug!(pending = pending.len(), "Mutation queue reloaded");
        Ok(pending.len())
    }

    async fn persist(&self, list: &[QueuedOperation]) -> Result<(), SyncError> {
        let data = serde_json::to_value(list)?;
        self.storage
            .put(NS_SYNC_QUEUE, &Record::new(PENDING_RECORD_ID, data))
            .await?;
        Ok(())
    }
}

/// Reads the persisted list; malformed entries are skipped with a warning
async fn load(storage: &dyn IStorageEngine) -> Result<Vec<QueuedOperation>, SyncError> {
    let Some(data) = storage.get(NS_SYNC_QUEUE, PENDING_RECORD_ID).await? else {
        return Ok(Vec::new());
    };

    let Value::Array(entries) = data else {
        return Err(SyncError::CorruptQueue(
            "persisted queue is not a list".to_string(),
        ));
    };

    let mut pending = Vec::with_capacity(entries.len());
    for entry in entries {
        match serde_json::from_value::<QueuedOperation>(entry) {
            Ok(op) => pending.push(op),
            Err(e) => warn!(error = %e, "Skipping malformed queued operation"),
        }
    }
    Ok(pending)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use timegrid_cache::MemoryEngine;

    use super::*;

    fn entry() -> EntityType {
        EntityType::new("time_entry").unwrap()
    }

    async fn setup() -> (Arc<MemoryEngine>, MutationQueue) {
        let engine = Arc::new(MemoryEngine::default());
        let queue = MutationQueue::open(engine.clone()).await.unwrap();
        (engine, queue)
    }

    #[tokio::test]
    async fn test_enqueue_is_persisted_in_order() {
        let (engine, queue) = setup().await;
        let first = queue
            .enqueue(OperationKind::Create, entry(), json!({"hours": 1}))
            .await
            .unwrap();
        let second = queue
            .enqueue(OperationKind::Update, entry(), json!({"id": "te-9", "hours": 2}))
            .await
            .unwrap();

        assert_eq!(queue.size().await, 2);
        let ids: Vec<OperationId> = queue.peek_all().await.iter().map(|op| *op.id()).collect();
        assert_eq!(ids, vec![first, second]);

        let reopened = MutationQueue::open(engine).await.unwrap();
        assert_eq!(reopened.peek_all().await, queue.peek_all().await);
    }

    #[tokio::test]
    async fn test_failed_flush_rolls_back() {
        let (engine, queue) = setup().await;
        queue
            .enqueue(OperationKind::Create, entry(), json!({"hours": 1}))
            .await
            .unwrap();

        engine.set_fail_writes(true);
        let err = queue
            .enqueue(OperationKind::Create, entry(), json!({"hours": 2}))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Storage(_)));
        assert_eq!(queue.size().await, 1);

        let id = *queue.peek_all().await[0].id();
        assert!(queue.remove(&id).await.is_err());
        assert_eq!(queue.size().await, 1);
        assert!(queue.record_failure(&id).await.is_err());
        assert_eq!(queue.get(&id).await.unwrap().retry_count(), 0);
    }

    #[tokio::test]
    async fn test_update_without_remote_id_is_rejected() {
        let (_engine, queue) = setup().await;
        let err = queue
            .enqueue(OperationKind::Delete, entry(), json!({"hours": 1}))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Domain(_)));
        assert_eq!(queue.size().await, 0);
    }

    #[tokio::test]
    async fn test_remove_and_record_failure() {
        let (_engine, queue) = setup().await;
        let id = queue
            .enqueue(OperationKind::Create, entry(), json!({}))
            .await
            .unwrap();

        assert_eq!(queue.record_failure(&id).await.unwrap(), 1);
        assert_eq!(queue.record_failure(&id).await.unwrap(), 2);
        assert_eq!(queue.get(&id).await.unwrap().retry_count(), 2);

        assert!(queue.remove(&id).await.unwrap());
        assert!(!queue.remove(&id).await.unwrap());
        assert!(matches!(
            queue.record_failure(&id).await,
            Err(SyncError::OperationNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_reload_picks_up_external_changes() {
        let (engine, queue) = setup().await;
        let other = MutationQueue::open(engine.clone()).await.unwrap();
        other
            .enqueue(OperationKind::Create, entry(), json!({"note": "from another window"}))
            .await
            .unwrap();

        assert_eq!(queue.size().await, 0);
        assert_eq!(queue.reload().await.unwrap(), 1);
        assert_eq!(queue.size().await, 1);
    }

    #[tokio::test]
    async fn test_malformed_entries_are_skipped() {
        let engine = Arc::new(MemoryEngine::default());
        let good = QueuedOperation::new(OperationKind::Create, entry(), json!({}), chrono::Utc::now());
        engine
            .put(
                NS_SYNC_QUEUE,
                &Record::new(
                    PENDING_RECORD_ID,
                    json!([serde_json::to_value(&good).unwrap(), {"garbage": true}]),
                ),
            )
            .await
            .unwrap();

        let queue = MutationQueue::open(engine).await.unwrap();
        assert_eq!(queue.peek_all().await, vec![good]);
    }

    #[tokio::test]
    async fn test_non_list_record_is_corrupt() {
        let engine = Arc::new(MemoryEngine::default());
        engine
            .put(NS_SYNC_QUEUE, &Record::new(PENDING_RECORD_ID, json!({"oops": 1})))
            .await
            .unwrap();
        assert!(matches!(
            MutationQueue::open(engine).await,
            Err(SyncError::CorruptQueue(_))
        ));
    }
}
