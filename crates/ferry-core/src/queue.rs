//! Durable FIFO queue of pending operations.
//!
//! The in-memory list is the source of truth for synchronous queries; every
//! mutation re-persists the full ordered snapshot under
//! [`QUEUE_COLLECTION`](crate::store::QUEUE_COLLECTION) before it is
//! acknowledged. Changes are staged on a copy and only published after the
//! write succeeds, so memory never runs ahead of the store.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::models::{OperationId, OperationKind, Payload, SyncOperation};
use crate::store::{local_collection, KeyValueStore, QUEUE_COLLECTION};

const SNAPSHOT_KEY: &str = "pending";

pub struct OperationQueue {
    store: Arc<dyn KeyValueStore>,
    pending: Mutex<VecDeque<SyncOperation>>,
    /// Serializes mutate-then-persist so snapshots land in order
    write_lock: tokio::sync::Mutex<()>,
    offline_support: bool,
    persist_attempts: u32,
}

impl OperationQueue {
    /// Rebuild the queue from its last persisted snapshot
    pub async fn load(
        store: Arc<dyn KeyValueStore>,
        offline_support: bool,
        persist_attempts: u32,
    ) -> Result<Self> {
        let pending = match store.get(QUEUE_COLLECTION, SNAPSHOT_KEY).await? {
            Some(raw) => serde_json::from_str::<VecDeque<SyncOperation>>(&raw)?,
            None => VecDeque::new(),
        };
        tracing::debug!("Loaded {} pending operations", pending.len());

        Ok(Self {
            store,
            pending: Mutex::new(pending),
            write_lock: tokio::sync::Mutex::new(()),
            offline_support,
            persist_attempts: persist_attempts.max(1),
        })
    }

    /// Append an operation and make it durable.
    ///
    /// Returns only after the queue snapshot has been written. When offline
    /// support is on, the optimistic local copy is updated before returning.
    pub async fn enqueue(&self, operation: SyncOperation) -> Result<OperationId> {
        let id = operation.id;
        let kind = operation.kind;
        let collection = operation.collection.clone();
        let item_id = operation.item_id.clone();
        let payload = operation.payload.clone();

        self.mutate(move |pending| pending.push_back(operation))
            .await?;

        self.write_local_copy(&collection, &item_id, kind, payload.as_ref())
            .await;
        Ok(id)
    }

    /// Up to `max` operations from the front, without removing them.
    ///
    /// For hosts inspecting what the next batch would carry; a cycle batches
    /// from [`snapshot`](Self::snapshot) so it can hold items back.
    pub fn peek_batch(&self, max: usize) -> Vec<SyncOperation> {
        self.pending.lock().iter().take(max).cloned().collect()
    }

    /// Every pending operation in queue order
    pub fn snapshot(&self) -> Vec<SyncOperation> {
        self.pending.lock().iter().cloned().collect()
    }

    pub fn get(&self, id: OperationId) -> Option<SyncOperation> {
        self.pending.lock().iter().find(|op| op.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// Remove a confirmed or abandoned operation. Returns whether it was queued.
    pub async fn remove(&self, id: OperationId) -> Result<bool> {
        if self.get(id).is_none() {
            return Ok(false);
        }
        self.mutate(move |pending| {
            let before = pending.len();
            pending.retain(|op| op.id != id);
            pending.len() != before
        })
        .await
    }

    /// Replace an operation with a fresh `Update` carrying `payload`.
    ///
    /// The replacement gets a new id and timestamp and goes to the back of the
    /// queue. Returns `None` when `id` is no longer queued.
    pub async fn requeue(
        &self,
        id: OperationId,
        payload: Payload,
        base_revision: Option<String>,
        now: i64,
    ) -> Result<Option<OperationId>> {
        let Some(original) = self.get(id) else {
            return Ok(None);
        };

        let replacement = SyncOperation::new(
            OperationKind::Update,
            original.collection.clone(),
            original.item_id.clone(),
            Some(payload.clone()),
            original.device_id,
            now,
        )
        .with_base_revision(base_revision.or(original.base_revision));
        let replacement_id = replacement.id;

        self.mutate(move |pending| {
            pending.retain(|op| op.id != id);
            pending.push_back(replacement);
        })
        .await?;

        self.write_local_copy(
            &original.collection,
            &original.item_id,
            OperationKind::Update,
            Some(&payload),
        )
        .await;
        Ok(Some(replacement_id))
    }

    /// Count a failed attempt and defer the next one until `not_before`.
    ///
    /// Returns the new retry count, or `None` when `id` is no longer queued.
    pub async fn record_failure(
        &self,
        id: OperationId,
        not_before: Option<i64>,
    ) -> Result<Option<u32>> {
        if self.get(id).is_none() {
            return Ok(None);
        }
        self.mutate(move |pending| {
            pending.iter_mut().find(|op| op.id == id).map(|op| {
                op.retry_count = op.retry_count.saturating_add(1);
                op.not_before = not_before;
                op.retry_count
            })
        })
        .await
    }

    /// Read the optimistic local copy of an item
    pub async fn local_copy(&self, collection: &str, item_id: &str) -> Result<Option<Payload>> {
        self.store
            .get(&local_collection(collection), item_id)
            .await?
            .map(Payload::from_json)
            .transpose()
    }

    /// Apply `change` to a copy of the list and publish it once persisted.
    ///
    /// Readers never observe an operation that is not yet in the store; a
    /// failed write leaves the list untouched.
    async fn mutate<R>(&self, change: impl FnOnce(&mut VecDeque<SyncOperation>) -> R) -> Result<R> {
        let _guard = self.write_lock.lock().await;

        let mut next = self.pending.lock().clone();
        let result = change(&mut next);
        let snapshot = serde_json::to_string(&next)?;
        self.persist(&snapshot).await?;

        *self.pending.lock() = next;
        Ok(result)
    }

    async fn persist(&self, snapshot: &str) -> Result<()> {
        let mut last_error = None;
        for attempt in 1..=self.persist_attempts {
            match self.store.set(QUEUE_COLLECTION, SNAPSHOT_KEY, snapshot).await {
                Ok(()) => return Ok(()),
                Err(error) => {
                    tracing::warn!(
                        "Queue persistence attempt {}/{} failed: {}",
                        attempt,
                        self.persist_attempts,
                        error
                    );
                    last_error = Some(error);
                }
            }
        }
        Err(Error::Persistence(format!(
            "failed to persist sync queue: {}",
            last_error.map_or_else(|| "unknown error".to_string(), |error| error.to_string())
        )))
    }

    async fn write_local_copy(
        &self,
        collection: &str,
        item_id: &str,
        kind: OperationKind,
        payload: Option<&Payload>,
    ) {
        if !self.offline_support {
            return;
        }

        let local = local_collection(collection);
        let result = match (kind, payload) {
            (OperationKind::Delete, _) | (_, None) => self.store.remove(&local, item_id).await,
            (_, Some(payload)) => self.store.set(&local, item_id, payload.as_str()).await,
        };

        // The operation itself is already durable; a stale local copy is repaired by the next write
        if let Err(error) = result {
            tracing::warn!(
                "Failed to update local copy of {}/{}: {}",
                collection,
                item_id,
                error
            );
        }
    }
}
