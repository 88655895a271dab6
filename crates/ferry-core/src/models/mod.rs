//! Data models for Ferry

mod operation;
mod outcome;
mod pending_conflict;
mod state;

pub use operation::{OperationId, OperationKind, Payload, SyncOperation};
pub use outcome::{Conflict, SyncOutcome};
pub use pending_conflict::{ConflictChoice, ConflictResolution, PendingConflict};
pub use state::EngineState;
