//! Remote transport boundary.
//!
//! One call per batch. The server is expected to de-duplicate operations by
//! their `id` within its retention window: an acknowledgement lost after the
//! server applied a batch leads to the same operations being sent again, and
//! the engine cannot tell the difference. Idempotent application by `id` is a
//! server-side contract, not something this crate can enforce.

mod http;

pub use http::{HttpTransport, HttpTransportConfig, DEVICE_ID_HEADER};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{SyncOperation, SyncOutcome};

/// Request body for one batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncBatch {
    pub operations: Vec<SyncOperation>,
    pub device_id: String,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Invalid transport configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Sync HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Sync request timed out")]
    Timeout,
    #[error("Sync API error: {0}")]
    Api(String),
    /// The server answered, but not with one outcome per operation
    #[error("Invalid sync response: {0}")]
    InvalidResponse(String),
}

impl TransportError {
    /// Whether the batch may simply be retried later
    pub const fn is_transient(&self) -> bool {
        !matches!(self, Self::InvalidResponse(_))
    }
}

pub type TransportResult<T> = Result<T, TransportError>;

/// Ships batches to the remote store
#[async_trait]
pub trait SyncTransport: Send + Sync {
    /// Send `batch` and return one outcome per operation, in request order
    async fn push(&self, batch: &SyncBatch) -> TransportResult<Vec<SyncOutcome>>;
}
