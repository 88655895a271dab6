//! Typed engine events.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::models::{Conflict, EngineState, OperationId};

const EVENT_CAPACITY: usize = 256;

/// Everything the engine reports to observers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    StateChanged {
        previous: EngineState,
        next: EngineState,
    },
    SyncStarted,
    SyncCompleted {
        synced: usize,
        failed: usize,
        conflicts: usize,
    },
    /// A cycle aborted on an unexpected error
    SyncFailed {
        reason: String,
    },
    ItemSynced {
        operation_id: OperationId,
        revision: String,
    },
    ConflictDetected {
        operation_id: OperationId,
        collection: String,
        item_id: String,
        conflict: Conflict,
    },
    ConflictResolved {
        collection: String,
        item_id: String,
        operation_id: OperationId,
    },
    /// An operation exhausted its retries and was dropped
    OperationFailed {
        operation_id: OperationId,
        collection: String,
        item_id: String,
        reason: String,
    },
    /// A mutation was queued locally
    LocalChange {
        operation_id: OperationId,
    },
    OnlineStatusChanged {
        online: bool,
    },
}

/// Fan-out of [`SyncEvent`]s to any number of subscribers
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SyncEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.tx.subscribe()
    }

    /// Deliver to current subscribers; having none is fine
    pub fn emit(&self, event: SyncEvent) {
        tracing::trace!(?event, "Emitting sync event");
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
