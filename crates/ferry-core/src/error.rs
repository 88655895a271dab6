//! Error types for ferry-core

use thiserror::Error;

/// Result type alias using ferry-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in ferry-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Local store write or read failed; the mutation is not durable
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No pending conflict for the given item
    #[error("No pending conflict for {collection}/{item_id}")]
    ConflictNotFound {
        collection: String,
        item_id: String,
    },

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid engine configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A sync cycle aborted on something other than a per-operation outcome
    #[error("Sync cycle error: {0}")]
    Sync(String),

    /// The engine has been shut down
    #[error("Sync engine has been shut down")]
    EngineStopped,
}

impl Error {
    /// Whether this error means a pending conflict was not found
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::ConflictNotFound { .. })
    }
}
