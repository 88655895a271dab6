//! Conflicts awaiting explicit resolution

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Conflict, OperationId};

/// A conflict held in the conflict store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingConflict {
    pub collection: String,
    pub item_id: String,
    pub conflict: Conflict,
    /// Operation whose transmission produced the conflict
    pub operation_id: OperationId,
    /// Detection time (Unix ms)
    pub detected_at: i64,
    /// Value the configured strategy would have applied, if it resolved
    #[serde(default)]
    pub suggestion: Option<Value>,
}

impl PendingConflict {
    pub fn matches(&self, collection: &str, item_id: &str) -> bool {
        self.collection == collection && self.item_id == item_id
    }
}

/// Which value a manual resolution keeps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "choice", content = "value")]
pub enum ConflictChoice {
    Local,
    Remote,
    Custom(Value),
}

impl ConflictChoice {
    /// Pick the value this choice stands for
    pub fn select(self, conflict: &Conflict) -> Value {
        match self {
            Self::Local => conflict.local.clone(),
            Self::Remote => conflict.remote.clone(),
            Self::Custom(value) => value,
        }
    }
}

/// One entry of a bulk resolution request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictResolution {
    pub collection: String,
    pub item_id: String,
    pub choice: ConflictChoice,
}

impl ConflictResolution {
    pub fn new(
        collection: impl Into<String>,
        item_id: impl Into<String>,
        choice: ConflictChoice,
    ) -> Self {
        Self {
            collection: collection.into(),
            item_id: item_id.into(),
            choice,
        }
    }
}
