//! Conflicts waiting for an explicit decision.
//!
//! Keyed by `(collection, item_id)`: a newer conflict for the same item
//! replaces the older one. Persisted as one snapshot so pending decisions
//! survive restarts.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::models::PendingConflict;
use crate::store::{KeyValueStore, CONFLICT_COLLECTION};

const SNAPSHOT_KEY: &str = "pending";

pub struct ConflictStore {
    store: Arc<dyn KeyValueStore>,
    entries: Mutex<Vec<PendingConflict>>,
    write_lock: tokio::sync::Mutex<()>,
}

impl ConflictStore {
    pub async fn load(store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let entries = match store.get(CONFLICT_COLLECTION, SNAPSHOT_KEY).await? {
            Some(raw) => serde_json::from_str::<Vec<PendingConflict>>(&raw)?,
            None => Vec::new(),
        };

        Ok(Self {
            store,
            entries: Mutex::new(entries),
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Pending conflicts in detection order
    pub fn list(&self) -> Vec<PendingConflict> {
        self.entries.lock().clone()
    }

    pub fn get(&self, collection: &str, item_id: &str) -> Option<PendingConflict> {
        self.entries
            .lock()
            .iter()
            .find(|entry| entry.matches(collection, item_id))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Hold a conflict, replacing any earlier one for the same item
    pub async fn insert(&self, conflict: PendingConflict) -> Result<()> {
        self.mutate(move |entries| {
            entries.retain(|entry| !entry.matches(&conflict.collection, &conflict.item_id));
            entries.push(conflict);
        })
        .await
    }

    /// The conflict for an item, or `ConflictNotFound`
    pub fn require(&self, collection: &str, item_id: &str) -> Result<PendingConflict> {
        self.get(collection, item_id)
            .ok_or_else(|| Error::ConflictNotFound {
                collection: collection.to_string(),
                item_id: item_id.to_string(),
            })
    }

    /// Drop `conflict` once its decision is queued.
    ///
    /// A newer conflict detected for the same item in the meantime is kept.
    /// Returns whether an entry was removed.
    pub async fn discard(&self, conflict: &PendingConflict) -> Result<bool> {
        self.mutate(|entries| {
            let before = entries.len();
            entries.retain(|entry| {
                !(entry.matches(&conflict.collection, &conflict.item_id)
                    && entry.operation_id == conflict.operation_id)
            });
            entries.len() != before
        })
        .await
    }

    /// Stage `change` on a copy and publish it once persisted
    async fn mutate<R>(&self, change: impl FnOnce(&mut Vec<PendingConflict>) -> R) -> Result<R> {
        let _guard = self.write_lock.lock().await;

        let mut next = self.entries.lock().clone();
        let result = change(&mut next);
        let snapshot = serde_json::to_string(&next)?;
        self.store
            .set(CONFLICT_COLLECTION, SNAPSHOT_KEY, &snapshot)
            .await
            .map_err(|error| Error::Persistence(format!("failed to persist conflicts: {error}")))?;

        *self.entries.lock() = next;
        Ok(result)
    }
}
