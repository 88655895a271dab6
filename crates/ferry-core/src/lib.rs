//! ferry-core - Local-first sync engine
//!
//! Mutations are queued durably on the device, pushed to a remote store in
//! ordered batches when the network allows, and conflicts reported by the
//! server are merged automatically or held for an explicit decision.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use ferry_core::db::LibSqlStore;
//! use ferry_core::transport::{HttpTransport, HttpTransportConfig};
//! use ferry_core::SyncEngine;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(LibSqlStore::open("ferry.db").await?);
//! let transport = Arc::new(HttpTransport::new(HttpTransportConfig::new(
//!     "https://api.example.com/v1/sync",
//! ))?);
//!
//! let engine = SyncEngine::builder(store, transport).build().await?;
//! engine.start();
//! engine
//!     .create("todos", None, &serde_json::json!({"title": "Buy milk"}))
//!     .await?;
//! engine.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod clock;
pub mod config;
pub mod conflicts;
pub mod db;
pub mod engine;
pub mod error;
pub mod events;
pub mod models;
pub mod network;
pub mod queue;
pub mod resolver;
pub mod store;
pub mod transport;
pub mod util;

pub use backoff::BackoffPolicy;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConflictMode, EngineConfig};
pub use engine::{BulkResolution, CycleSummary, SyncEngine, SyncEngineBuilder};
pub use error::{Error, Result};
pub use events::SyncEvent;
pub use models::{
    Conflict, ConflictChoice, ConflictResolution, EngineState, OperationId, OperationKind,
    Payload, PendingConflict, SyncOperation, SyncOutcome,
};
pub use network::NetworkGate;
pub use resolver::ResolutionStrategy;
pub use store::{KeyValueStore, MemoryStore};
