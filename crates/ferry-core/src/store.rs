//! Key-value persistence boundary.
//!
//! The engine persists its queue, its pending conflicts and optimistic local
//! copies of mutated items through [`KeyValueStore`]. Values are JSON text.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{Error, Result};

/// Collection holding the ordered queue snapshot
pub const QUEUE_COLLECTION: &str = "sync-queue";
/// Collection holding unresolved conflicts
pub const CONFLICT_COLLECTION: &str = "sync-conflicts";
/// Collection holding engine metadata such as the device id
pub const META_COLLECTION: &str = "sync-meta";

/// Name of the collection holding optimistic copies of `collection`'s items
pub fn local_collection(collection: &str) -> String {
    format!("{collection}-local")
}

/// Durable key-value storage over named collections
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value
    async fn get(&self, collection: &str, key: &str) -> Result<Option<String>>;

    /// Insert or replace a value
    async fn set(&self, collection: &str, key: &str, value: &str) -> Result<()>;

    /// Remove a value; removing a missing key is not an error
    async fn remove(&self, collection: &str, key: &str) -> Result<()>;

    /// Insert or replace several values atomically
    async fn bulk_set(&self, collection: &str, entries: &BTreeMap<String, String>) -> Result<()>;

    /// Remove every value in a collection
    async fn clear(&self, collection: &str) -> Result<()>;
}

/// In-process store, for tests and hosts without durable storage
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, BTreeMap<String, String>>>,
    failing_writes: AtomicUsize,
    failing_collections: Mutex<HashMap<String, usize>>,
    write_delay: Mutex<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` writes fail with a persistence error
    pub fn fail_next_writes(&self, count: usize) {
        self.failing_writes.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` writes to `collection` fail
    pub fn fail_writes_to(&self, collection: &str, count: usize) {
        self.failing_collections
            .lock()
            .insert(collection.to_string(), count);
    }

    /// Hold every write for `delay` before applying it
    pub fn delay_writes(&self, delay: Duration) {
        *self.write_delay.lock() = delay;
    }

    /// Number of entries currently in `collection`
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .lock()
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    /// Whether `collection` holds no entries
    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    async fn check_write(&self, collection: &str) -> Result<()> {
        let delay = *self.write_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let targeted = {
            let mut failing = self.failing_collections.lock();
            match failing.get_mut(collection) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    true
                }
                _ => false,
            }
        };
        let injected = targeted
            || self
                .failing_writes
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                    remaining.checked_sub(1)
                })
                .is_ok();
        if injected {
            Err(Error::Persistence(format!(
                "injected write failure in {collection}"
            )))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<String>> {
        Ok(self
            .collections
            .lock()
            .get(collection)
            .and_then(|entries| entries.get(key).cloned()))
    }

    async fn set(&self, collection: &str, key: &str, value: &str) -> Result<()> {
        self.check_write(collection).await?;
        self.collections
            .lock()
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, collection: &str, key: &str) -> Result<()> {
        self.check_write(collection).await?;
        if let Some(entries) = self.collections.lock().get_mut(collection) {
            entries.remove(key);
        }
        Ok(())
    }

    async fn bulk_set(&self, collection: &str, entries: &BTreeMap<String, String>) -> Result<()> {
        self.check_write(collection).await?;
        self.collections
            .lock()
            .entry(collection.to_string())
            .or_default()
            .extend(entries.iter().map(|(key, value)| (key.clone(), value.clone())));
        Ok(())
    }

    async fn clear(&self, collection: &str) -> Result<()> {
        self.check_write(collection).await?;
        self.collections.lock().remove(collection);
        Ok(())
    }
}
