//! Server verdicts for transmitted operations

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Divergent values for one item plus their common ancestor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    /// Common ancestor; absent when the item diverged before its first sync
    #[serde(default)]
    pub base: Option<Value>,
    pub local: Value,
    pub remote: Value,
    /// Remote write time (Unix ms), used by last-write-wins
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_updated_at: Option<i64>,
    /// Device that produced the remote value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_device_id: Option<String>,
    /// Current remote revision, carried as the base of any resubmission
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_revision: Option<String>,
}

impl Conflict {
    pub const fn new(base: Option<Value>, local: Value, remote: Value) -> Self {
        Self {
            base,
            local,
            remote,
            remote_updated_at: None,
            remote_device_id: None,
            remote_revision: None,
        }
    }

    /// Attach the remote write stamp
    #[must_use]
    pub fn with_remote_stamp(mut self, updated_at: i64, device_id: impl Into<String>) -> Self {
        self.remote_updated_at = Some(updated_at);
        self.remote_device_id = Some(device_id.into());
        self
    }

    /// Attach the remote revision
    #[must_use]
    pub fn with_remote_revision(mut self, revision: impl Into<String>) -> Self {
        self.remote_revision = Some(revision.into());
        self
    }
}

/// Server verdict for one operation, positionally aligned with the request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SyncOutcome {
    Accepted {
        revision: String,
    },
    Conflict(Conflict),
    Rejected {
        reason: String,
    },
}

impl SyncOutcome {
    pub fn accepted(revision: impl Into<String>) -> Self {
        Self::Accepted {
            revision: revision.into(),
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }
}
