//! The sync engine: public API, state machine and background scheduling.
//!
//! One [`SyncEngine`] owns one queue and one conflict store. Handles are cheap
//! clones of the same instance. Lifecycle is explicit:
//! [`SyncEngineBuilder::build`] loads persisted state, [`SyncEngine::start`]
//! spawns the scheduler, [`SyncEngine::shutdown`] stops it.

mod cycle;
mod scheduler;

pub use cycle::CycleSummary;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{broadcast, watch, Notify};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::conflicts::ConflictStore;
use crate::error::{Error, Result};
use crate::events::{EventBus, SyncEvent};
use crate::models::{
    ConflictChoice, ConflictResolution, EngineState, OperationId, OperationKind, Payload,
    PendingConflict, SyncOperation,
};
use crate::network::NetworkGate;
use crate::queue::OperationQueue;
use crate::store::{KeyValueStore, META_COLLECTION};
use crate::transport::SyncTransport;

const DEVICE_ID_KEY: &str = "device-id";

/// Outcome of [`SyncEngine::resolve_bulk_conflicts`].
///
/// Each resolution commits on its own; earlier successes are kept when a
/// later entry fails.
#[derive(Debug, Default)]
pub struct BulkResolution {
    /// New operation ids, in request order
    pub resolved: Vec<OperationId>,
    pub failed: Vec<(ConflictResolution, Error)>,
}

impl BulkResolution {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Why a cycle was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Manual,
    Automatic,
}

struct EngineInner {
    config: EngineConfig,
    device_id: String,
    queue: OperationQueue,
    conflicts: ConflictStore,
    transport: Arc<dyn SyncTransport>,
    network: NetworkGate,
    clock: Arc<dyn Clock>,
    events: EventBus,
    state: Mutex<EngineState>,
    syncing: AtomicBool,
    paused: AtomicBool,
    /// Set by an unhandled cycle error; only a manual sync clears it
    halted: AtomicBool,
    stopped: AtomicBool,
    wake: Notify,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    resolve_lock: tokio::sync::Mutex<()>,
}

/// Assembles a [`SyncEngine`] from its collaborators
pub struct SyncEngineBuilder {
    store: Arc<dyn KeyValueStore>,
    transport: Arc<dyn SyncTransport>,
    config: EngineConfig,
    network: NetworkGate,
    clock: Arc<dyn Clock>,
}

impl SyncEngineBuilder {
    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn network(mut self, network: NetworkGate) -> Self {
        self.network = network;
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Validate config and load the persisted queue and conflicts
    pub async fn build(self) -> Result<SyncEngine> {
        let config = self.config.validate()?;
        let device_id = resolve_device_id(self.store.as_ref(), config.device_id.clone()).await?;

        let queue = OperationQueue::load(
            self.store.clone(),
            config.offline_support,
            config.persist_attempts,
        )
        .await?;
        let conflicts = ConflictStore::load(self.store).await?;

        let initial_state = if !self.network.is_online() {
            EngineState::Offline
        } else if conflicts.is_empty() {
            EngineState::Idle
        } else {
            EngineState::Conflict
        };

        tracing::info!(
            "Sync engine ready for device {} ({} pending operations, {} conflicts)",
            device_id,
            queue.len(),
            conflicts.len()
        );

        let (shutdown, _) = watch::channel(false);
        Ok(SyncEngine {
            inner: Arc::new(EngineInner {
                config,
                device_id,
                queue,
                conflicts,
                transport: self.transport,
                network: self.network,
                clock: self.clock,
                events: EventBus::new(),
                state: Mutex::new(initial_state),
                syncing: AtomicBool::new(false),
                paused: AtomicBool::new(false),
                halted: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
                wake: Notify::new(),
                shutdown,
                tasks: Mutex::new(Vec::new()),
                resolve_lock: tokio::sync::Mutex::new(()),
            }),
        })
    }
}

async fn resolve_device_id(store: &dyn KeyValueStore, configured: Option<String>) -> Result<String> {
    if let Some(device_id) = configured {
        return Ok(device_id);
    }
    if let Some(stored) = store.get(META_COLLECTION, DEVICE_ID_KEY).await? {
        return Ok(stored);
    }

    let generated = Uuid::now_v7().to_string();
    store
        .set(META_COLLECTION, DEVICE_ID_KEY, &generated)
        .await?;
    tracing::info!("Generated device id {}", generated);
    Ok(generated)
}

/// Handle to a running sync engine
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

impl SyncEngine {
    /// Start assembling an engine over a store and a transport
    pub fn builder(
        store: Arc<dyn KeyValueStore>,
        transport: Arc<dyn SyncTransport>,
    ) -> SyncEngineBuilder {
        SyncEngineBuilder {
            store,
            transport,
            config: EngineConfig::default(),
            network: NetworkGate::default(),
            clock: Arc::new(SystemClock),
        }
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Queue creation of an item; a UUIDv7 item id is generated when absent
    pub async fn create(
        &self,
        collection: &str,
        item_id: Option<&str>,
        payload: &Value,
    ) -> Result<OperationId> {
        let item_id = item_id.map_or_else(|| Uuid::now_v7().to_string(), str::to_string);
        self.mutate(
            OperationKind::Create,
            collection,
            &item_id,
            Some(Payload::from_value(payload)?),
            None,
        )
        .await
    }

    /// Queue a new value for an item
    pub async fn update(
        &self,
        collection: &str,
        item_id: &str,
        payload: &Value,
        base_revision: Option<String>,
    ) -> Result<OperationId> {
        self.mutate(
            OperationKind::Update,
            collection,
            item_id,
            Some(Payload::from_value(payload)?),
            base_revision,
        )
        .await
    }

    /// Queue removal of an item
    pub async fn delete(
        &self,
        collection: &str,
        item_id: &str,
        base_revision: Option<String>,
    ) -> Result<OperationId> {
        self.mutate(OperationKind::Delete, collection, item_id, None, base_revision)
            .await
    }

    /// Queue any mutation. Returns once the operation is durable.
    pub async fn mutate(
        &self,
        kind: OperationKind,
        collection: &str,
        item_id: &str,
        payload: Option<Payload>,
        base_revision: Option<String>,
    ) -> Result<OperationId> {
        let inner = &self.inner;
        if inner.stopped.load(Ordering::SeqCst) {
            return Err(Error::EngineStopped);
        }
        validate_key(collection, "collection")?;
        validate_key(item_id, "item id")?;
        if kind != OperationKind::Delete && payload.is_none() {
            return Err(Error::InvalidInput(format!("{kind} requires a payload")));
        }

        let operation = SyncOperation::new(
            kind,
            collection,
            item_id,
            if kind == OperationKind::Delete { None } else { payload },
            inner.device_id.clone(),
            inner.clock.now_millis(),
        )
        .with_base_revision(base_revision);

        let operation_id = inner.queue.enqueue(operation).await?;
        tracing::debug!("Queued {} of {}/{} as {}", kind, collection, item_id, operation_id);

        inner.events.emit(SyncEvent::LocalChange { operation_id });
        if inner.config.sync_on_change {
            self.wake_scheduler();
        }
        Ok(operation_id)
    }

    // ------------------------------------------------------------------
    // Scheduling
    // ------------------------------------------------------------------

    /// Run one sync cycle now.
    ///
    /// A no-op (returning `None`) while offline, paused, already syncing or
    /// with nothing queued. Clears a halt left by an earlier cycle error.
    /// Cycle errors are reported through events and state, never returned.
    pub async fn sync(&self) -> Option<CycleSummary> {
        self.run_cycle(Trigger::Manual).await
    }

    /// Stop starting new cycles and batches. An in-flight batch completes.
    pub fn pause(&self) {
        if !self.inner.paused.swap(true, Ordering::SeqCst) {
            tracing::info!("Sync paused");
        }
    }

    /// Allow cycles again and schedule one if work is waiting
    pub fn resume(&self) {
        if self.inner.paused.swap(false, Ordering::SeqCst) {
            tracing::info!("Sync resumed");
            self.wake_scheduler();
        }
    }

    pub fn is_paused(&self) -> bool {
        self.inner.paused.load(Ordering::SeqCst)
    }

    /// Spawn the tick loop and the network watcher.
    ///
    /// Must be called from within a Tokio runtime. Calling it again while
    /// running is a no-op.
    pub fn start(&self) {
        let mut tasks = self.inner.tasks.lock();
        if !tasks.is_empty() || self.inner.stopped.load(Ordering::SeqCst) {
            return;
        }
        // Subscribe before spawning so no transition between now and the
        // first poll of the tasks is missed
        tasks.push(tokio::spawn(scheduler::tick_loop(
            self.clone(),
            self.inner.shutdown.subscribe(),
        )));
        tasks.push(tokio::spawn(scheduler::network_loop(
            self.clone(),
            self.inner.shutdown.subscribe(),
            self.inner.network.subscribe(),
        )));
        tracing::info!(
            "Sync scheduler started (interval {:?})",
            self.inner.config.sync_interval()
        );
        drop(tasks);

        // Flush work left over from a previous run
        self.wake_scheduler();
    }

    /// Stop background tasks after any in-flight cycle finishes.
    ///
    /// Further mutations fail with [`Error::EngineStopped`].
    pub async fn shutdown(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
        self.inner.shutdown.send_replace(true);

        let tasks = std::mem::take(&mut *self.inner.tasks.lock());
        for task in tasks {
            if let Err(error) = task.await {
                tracing::warn!("Sync task ended abnormally: {}", error);
            }
        }
        tracing::info!("Sync engine shut down");
    }

    // ------------------------------------------------------------------
    // Conflicts
    // ------------------------------------------------------------------

    /// Settle a pending conflict by queueing one `Update` with the chosen value.
    ///
    /// The update is made durable before the conflict is dropped, so a
    /// failure in between leaves the conflict pending (and at worst a
    /// duplicate update queued), never neither.
    pub async fn resolve_conflict(
        &self,
        collection: &str,
        item_id: &str,
        choice: ConflictChoice,
    ) -> Result<OperationId> {
        let inner = &self.inner;
        let _guard = inner.resolve_lock.lock().await;

        let pending = inner.conflicts.require(collection, item_id)?;
        let value = choice.select(&pending.conflict);
        let operation_id = self.enqueue_resolution(&pending, &value).await?;
        inner.events.emit(SyncEvent::LocalChange { operation_id });

        if let Err(error) = inner.conflicts.discard(&pending).await {
            tracing::error!(
                "Queued {} for {}/{} but the conflict is still pending: {}",
                operation_id,
                collection,
                item_id,
                error
            );
            return Err(error);
        }

        tracing::info!("Resolved conflict for {}/{} as {}", collection, item_id, operation_id);
        inner.events.emit(SyncEvent::ConflictResolved {
            collection: collection.to_string(),
            item_id: item_id.to_string(),
            operation_id,
        });

        if inner.conflicts.is_empty() && self.state() == EngineState::Conflict {
            self.set_state(self.resting_state());
        }
        if inner.config.sync_on_change {
            self.wake_scheduler();
        }
        Ok(operation_id)
    }

    /// Resolve several conflicts, each committed independently
    pub async fn resolve_bulk_conflicts(
        &self,
        resolutions: Vec<ConflictResolution>,
    ) -> BulkResolution {
        let mut report = BulkResolution::default();
        for resolution in resolutions {
            match self
                .resolve_conflict(
                    &resolution.collection,
                    &resolution.item_id,
                    resolution.choice.clone(),
                )
                .await
            {
                Ok(operation_id) => report.resolved.push(operation_id),
                Err(error) => {
                    tracing::warn!(
                        "Bulk resolution of {}/{} failed: {}",
                        resolution.collection,
                        resolution.item_id,
                        error
                    );
                    report.failed.push((resolution, error));
                }
            }
        }
        report
    }

    async fn enqueue_resolution(&self, pending: &PendingConflict, value: &Value) -> Result<OperationId> {
        let inner = &self.inner;
        let operation = SyncOperation::new(
            OperationKind::Update,
            pending.collection.clone(),
            pending.item_id.clone(),
            Some(Payload::from_value(value)?),
            inner.device_id.clone(),
            inner.clock.now_millis(),
        )
        .with_base_revision(pending.conflict.remote_revision.clone());
        inner.queue.enqueue(operation).await
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Current engine state.
    ///
    /// Reflects the network gate even before [`start`](Self::start) spawns
    /// the network watcher; `StateChanged` events for network transitions
    /// are only emitted once it runs.
    pub fn state(&self) -> EngineState {
        let recorded = *self.inner.state.lock();
        match (self.inner.network.is_online(), recorded) {
            (false, _) => EngineState::Offline,
            (true, EngineState::Offline) => self.resting_state(),
            (true, recorded) => recorded,
        }
    }

    pub fn queue_size(&self) -> usize {
        self.inner.queue.len()
    }

    pub fn pending_operations(&self) -> Vec<SyncOperation> {
        self.inner.queue.snapshot()
    }

    pub fn pending_operation(&self, id: OperationId) -> Option<SyncOperation> {
        self.inner.queue.get(id)
    }

    pub fn pending_conflicts(&self) -> Vec<PendingConflict> {
        self.inner.conflicts.list()
    }

    pub fn device_id(&self) -> &str {
        &self.inner.device_id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn is_online(&self) -> bool {
        self.inner.network.is_online()
    }

    /// The optimistic local value of an item, if offline support keeps one
    pub async fn local_copy(&self, collection: &str, item_id: &str) -> Result<Option<Value>> {
        self.inner
            .queue
            .local_copy(collection, item_id)
            .await?
            .map(|payload| payload.to_value())
            .transpose()
    }

    /// Receive engine events from now on
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    // ------------------------------------------------------------------
    // Internals shared with the scheduler
    // ------------------------------------------------------------------

    fn wake_scheduler(&self) {
        let inner = &self.inner;
        if inner.network.is_online()
            && !inner.paused.load(Ordering::SeqCst)
            && !inner.queue.is_empty()
        {
            inner.wake.notify_one();
        }
    }

    fn set_state(&self, next: EngineState) {
        let previous = std::mem::replace(&mut *self.inner.state.lock(), next);
        if previous != next {
            tracing::info!("Sync state {} -> {}", previous, next);
            self.inner
                .events
                .emit(SyncEvent::StateChanged { previous, next });
        }
    }

    /// State to settle in when no cycle is running
    fn resting_state(&self) -> EngineState {
        let inner = &self.inner;
        if !inner.network.is_online() {
            EngineState::Offline
        } else if inner.halted.load(Ordering::SeqCst) {
            EngineState::Error
        } else if inner.conflicts.is_empty() {
            EngineState::Idle
        } else {
            EngineState::Conflict
        }
    }
}

fn validate_key(value: &str, label: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidInput(format!("{label} must not be empty")));
    }
    Ok(())
}
