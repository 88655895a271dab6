//! One sync cycle: batch the queue, transmit, fold outcomes back.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;

use super::{SyncEngine, Trigger};
use crate::config::ConflictMode;
use crate::error::{Error, Result};
use crate::events::SyncEvent;
use crate::models::{Conflict, EngineState, Payload, PendingConflict, SyncOperation, SyncOutcome};
use crate::resolver::{self, Resolution, WriteStamp};
use crate::transport::SyncBatch;

/// Counts for one completed cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleSummary {
    /// Accepted by the server and removed
    pub synced: usize,
    /// Dropped after exhausting retries
    pub failed: usize,
    /// Moved to the conflict store
    pub conflicts: usize,
    /// Auto-resolved and queued again for the next cycle
    pub requeued: usize,
    /// Rejected and left queued for a later attempt
    pub retried: usize,
    /// Not sent this cycle (backoff, held behind an earlier operation, or paused)
    pub deferred: usize,
}

/// Holds the engine-wide "syncing" flag for the life of a cycle
struct CycleGuard<'a>(&'a AtomicBool);

impl<'a> CycleGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

type ItemKey = (String, String);

fn item_key(operation: &SyncOperation) -> ItemKey {
    (operation.collection.clone(), operation.item_id.clone())
}

impl SyncEngine {
    pub(super) async fn run_cycle(&self, trigger: Trigger) -> Option<CycleSummary> {
        let inner = &self.inner;
        if !inner.network.is_online() {
            tracing::debug!("Skipping sync: offline");
            return None;
        }
        if inner.paused.load(Ordering::SeqCst) {
            tracing::debug!("Skipping sync: paused");
            return None;
        }
        match trigger {
            Trigger::Manual => {
                if inner.halted.swap(false, Ordering::SeqCst) && inner.queue.is_empty() {
                    self.set_state(self.resting_state());
                }
            }
            Trigger::Automatic => {
                if inner.halted.load(Ordering::SeqCst) {
                    tracing::debug!("Skipping automatic sync: halted after an error");
                    return None;
                }
            }
        }
        if inner.queue.is_empty() {
            return None;
        }

        let Some(_guard) = CycleGuard::acquire(&inner.syncing) else {
            tracing::debug!("Skipping sync: a cycle is already running");
            return None;
        };

        self.set_state(EngineState::Syncing);
        inner.events.emit(SyncEvent::SyncStarted);

        match self.process_queue().await {
            Ok(summary) => {
                tracing::info!(
                    "Sync cycle finished: {} synced, {} failed, {} conflicts, {} requeued, {} deferred",
                    summary.synced,
                    summary.failed,
                    summary.conflicts,
                    summary.requeued,
                    summary.deferred
                );
                self.set_state(self.resting_state());
                inner.events.emit(SyncEvent::SyncCompleted {
                    synced: summary.synced,
                    failed: summary.failed,
                    conflicts: summary.conflicts,
                });
                Some(summary)
            }
            Err(error) => {
                tracing::error!("Sync cycle failed: {}", error);
                inner.halted.store(true, Ordering::SeqCst);
                self.set_state(self.resting_state());
                inner.events.emit(SyncEvent::SyncFailed {
                    reason: error.to_string(),
                });
                None
            }
        }
    }

    /// Send the queue as it stood when the cycle began, batch by batch
    async fn process_queue(&self) -> Result<CycleSummary> {
        let inner = &self.inner;
        let mut summary = CycleSummary::default();
        let mut remaining: VecDeque<SyncOperation> = inner.queue.snapshot().into();
        // Items with an operation that did not complete this cycle
        let mut held: HashSet<ItemKey> = HashSet::new();

        while !remaining.is_empty() {
            if self.should_stop_batches() {
                tracing::info!("Stopping cycle before next batch");
                summary.deferred += remaining.len();
                break;
            }

            let now = inner.clock.now_millis();
            let operations = next_batch(
                &mut remaining,
                &mut held,
                now,
                inner.config.batch_size,
                &mut summary.deferred,
            );
            if operations.is_empty() {
                continue;
            }

            let batch = SyncBatch {
                operations,
                device_id: inner.device_id.clone(),
            };
            tracing::debug!("Sending batch of {} operations", batch.operations.len());

            let outcomes = match inner.transport.push(&batch).await {
                Ok(outcomes) if outcomes.len() == batch.operations.len() => outcomes,
                Ok(outcomes) => {
                    return Err(Error::Sync(format!(
                        "transport returned {} outcomes for {} operations",
                        outcomes.len(),
                        batch.operations.len()
                    )));
                }
                Err(error) if error.is_transient() => {
                    tracing::warn!("Batch transmission failed: {}", error);
                    let reason = error.to_string();
                    batch
                        .operations
                        .iter()
                        .map(|_| SyncOutcome::rejected(reason.clone()))
                        .collect()
                }
                Err(error) => return Err(Error::Sync(error.to_string())),
            };

            for (operation, outcome) in batch.operations.iter().zip(outcomes) {
                self.fold_outcome(operation, outcome, &mut summary, &mut held)
                    .await?;
            }
        }

        Ok(summary)
    }

    fn should_stop_batches(&self) -> bool {
        let inner = &self.inner;
        inner.paused.load(Ordering::SeqCst)
            || inner.stopped.load(Ordering::SeqCst)
            || !inner.network.is_online()
    }

    async fn fold_outcome(
        &self,
        operation: &SyncOperation,
        outcome: SyncOutcome,
        summary: &mut CycleSummary,
        held: &mut HashSet<ItemKey>,
    ) -> Result<()> {
        let inner = &self.inner;
        match outcome {
            SyncOutcome::Accepted { revision } => {
                inner.queue.remove(operation.id).await?;
                summary.synced += 1;
                inner.events.emit(SyncEvent::ItemSynced {
                    operation_id: operation.id,
                    revision,
                });
            }
            SyncOutcome::Rejected { reason } => {
                held.insert(item_key(operation));
                let attempts = operation.retry_count.saturating_add(1);
                if attempts > inner.config.max_retries {
                    tracing::warn!(
                        "Dropping {} of {}/{} after {} attempts: {}",
                        operation.kind,
                        operation.collection,
                        operation.item_id,
                        attempts,
                        reason
                    );
                    inner.queue.remove(operation.id).await?;
                    summary.failed += 1;
                    inner.events.emit(SyncEvent::OperationFailed {
                        operation_id: operation.id,
                        collection: operation.collection.clone(),
                        item_id: operation.item_id.clone(),
                        reason,
                    });
                } else {
                    let not_before = inner
                        .config
                        .backoff
                        .next_attempt_at(inner.clock.now_millis(), attempts);
                    inner.queue.record_failure(operation.id, not_before).await?;
                    summary.retried += 1;
                    tracing::debug!(
                        "Operation {} rejected (attempt {}): {}",
                        operation.id,
                        attempts,
                        reason
                    );
                }
            }
            SyncOutcome::Conflict(conflict) => {
                held.insert(item_key(operation));
                self.fold_conflict(operation, conflict, summary).await?;
            }
        }
        Ok(())
    }

    async fn fold_conflict(
        &self,
        operation: &SyncOperation,
        conflict: Conflict,
        summary: &mut CycleSummary,
    ) -> Result<()> {
        let inner = &self.inner;
        let now = inner.clock.now_millis();
        let resolution = resolver::resolve(
            inner.config.strategy,
            &conflict,
            WriteStamp::new(operation.created_at, &operation.device_id),
        );

        if let (ConflictMode::Auto, Resolution::Resolved(value)) =
            (inner.config.conflict_mode, &resolution)
        {
            let payload = Payload::from_value(value)?;
            let replacement = inner
                .queue
                .requeue(operation.id, payload, conflict.remote_revision.clone(), now)
                .await?;
            if let Some(replacement) = replacement {
                tracing::info!(
                    "Auto-resolved conflict on {}/{}; queued {}",
                    operation.collection,
                    operation.item_id,
                    replacement
                );
                summary.requeued += 1;
            }
            return Ok(());
        }

        if let Resolution::Unresolved(reason) = &resolution {
            tracing::info!(
                "Conflict on {}/{} needs a decision: {}",
                operation.collection,
                operation.item_id,
                reason
            );
        }

        inner
            .conflicts
            .insert(PendingConflict {
                collection: operation.collection.clone(),
                item_id: operation.item_id.clone(),
                conflict: conflict.clone(),
                operation_id: operation.id,
                detected_at: now,
                suggestion: resolution.into_value(),
            })
            .await?;
        inner.queue.remove(operation.id).await?;
        summary.conflicts += 1;

        inner.events.emit(SyncEvent::ConflictDetected {
            operation_id: operation.id,
            collection: operation.collection.clone(),
            item_id: operation.item_id.clone(),
            conflict,
        });
        Ok(())
    }
}

/// Take the next batch off the front of `remaining`.
///
/// Operations for held items, and those still in backoff, are skipped and
/// hold their item for the rest of the cycle. A batch carries at most one
/// operation per item, so outcomes of earlier operations are known before
/// later ones for the same item are sent.
fn next_batch(
    remaining: &mut VecDeque<SyncOperation>,
    held: &mut HashSet<ItemKey>,
    now: i64,
    batch_size: usize,
    deferred: &mut usize,
) -> Vec<SyncOperation> {
    let mut batch: Vec<SyncOperation> = Vec::new();
    while batch.len() < batch_size {
        let Some(operation) = remaining.pop_front() else {
            break;
        };
        let key = item_key(&operation);
        if held.contains(&key) {
            *deferred += 1;
            continue;
        }
        if !operation.is_due(now) {
            held.insert(key);
            *deferred += 1;
            continue;
        }
        if batch
            .iter()
            .any(|queued| queued.item_key() == operation.item_key())
        {
            remaining.push_front(operation);
            break;
        }
        batch.push(operation);
    }
    batch
}
