//! Last-write-wins resolution

use serde_json::Value;
use std::cmp::Ordering;

/// When and where a value was written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteStamp<'a> {
    /// Write time (Unix ms)
    pub timestamp: i64,
    pub device_id: &'a str,
}

impl<'a> WriteStamp<'a> {
    pub const fn new(timestamp: i64, device_id: &'a str) -> Self {
        Self {
            timestamp,
            device_id,
        }
    }
}

/// Pick the value with the later timestamp.
///
/// Equal timestamps are broken by the lexicographically greater device id. The
/// tie-break only makes the choice deterministic across replicas; it says
/// nothing about which write is "more correct". Identical stamps keep `local`.
/// `base` does not take part in the decision.
pub fn last_write_wins<'v>(
    _base: Option<&'v Value>,
    local: &'v Value,
    remote: &'v Value,
    local_stamp: WriteStamp<'_>,
    remote_stamp: WriteStamp<'_>,
) -> &'v Value {
    let ordering = local_stamp
        .timestamp
        .cmp(&remote_stamp.timestamp)
        .then_with(|| local_stamp.device_id.cmp(remote_stamp.device_id));

    match ordering {
        Ordering::Greater | Ordering::Equal => local,
        Ordering::Less => remote,
    }
}
