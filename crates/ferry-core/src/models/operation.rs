//! Queued mutation model

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Result;

/// Identifier of a queued operation, using UUID v7 (time-sortable).
///
/// Doubles as the idempotency key on the remote side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(Uuid);

impl OperationId {
    /// Create a new unique operation ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OperationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Kind of mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => f.write_str("create"),
            Self::Update => f.write_str("update"),
            Self::Delete => f.write_str("delete"),
        }
    }
}

/// Opaque item value as serialized JSON text.
///
/// The engine never interprets the payload. [`Payload::fields`] gives hosts
/// the same schema-free key/value view that three-way merge works on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(Box<RawValue>);

impl Payload {
    /// Wrap already-serialized JSON text, validating that it parses
    pub fn from_json(raw: impl Into<String>) -> Result<Self> {
        Ok(Self(RawValue::from_string(raw.into())?))
    }

    /// Serialize a JSON value into a payload
    pub fn from_value(value: &Value) -> Result<Self> {
        Ok(Self(serde_json::value::to_raw_value(value)?))
    }

    /// Raw JSON text
    pub fn as_str(&self) -> &str {
        self.0.get()
    }

    /// Parse into a JSON value
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::from_str(self.0.get())?)
    }

    /// Top-level fields when the payload is a JSON object
    pub fn fields(&self) -> Option<Map<String, Value>> {
        match self.to_value() {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        }
    }
}

impl PartialEq for Payload {
    fn eq(&self, other: &Self) -> bool {
        self.0.get() == other.0.get()
    }
}

impl Eq for Payload {}

/// One queued mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOperation {
    /// Engine-generated identifier, distinct from `item_id`
    pub id: OperationId,
    pub kind: OperationKind,
    /// Logical namespace of the target item
    pub collection: String,
    pub item_id: String,
    /// New value; `None` for deletes
    pub payload: Option<Payload>,
    /// Enqueue time (Unix ms)
    pub created_at: i64,
    pub device_id: String,
    /// Failed transmission attempts so far
    #[serde(default)]
    pub retry_count: u32,
    /// Revision the mutation was computed against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_revision: Option<String>,
    /// Earliest time (Unix ms) the next attempt may be made
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<i64>,
}

impl SyncOperation {
    /// Build a fresh operation with a new id and zero retries
    pub fn new(
        kind: OperationKind,
        collection: impl Into<String>,
        item_id: impl Into<String>,
        payload: Option<Payload>,
        device_id: impl Into<String>,
        created_at: i64,
    ) -> Self {
        Self {
            id: OperationId::new(),
            kind,
            collection: collection.into(),
            item_id: item_id.into(),
            payload,
            created_at,
            device_id: device_id.into(),
            retry_count: 0,
            base_revision: None,
            not_before: None,
        }
    }

    /// Set the revision this mutation was computed against
    #[must_use]
    pub fn with_base_revision(mut self, base_revision: Option<String>) -> Self {
        self.base_revision = base_revision;
        self
    }

    /// `(collection, item_id)` pair identifying the target item
    pub fn item_key(&self) -> (&str, &str) {
        (&self.collection, &self.item_id)
    }

    /// Whether the operation may be transmitted at `now` (Unix ms)
    pub fn is_due(&self, now: i64) -> bool {
        self.not_before.is_none_or(|not_before| not_before <= now)
    }
}
