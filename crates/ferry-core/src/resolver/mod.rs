//! Conflict resolution strategies.
//!
//! Everything here is pure: no I/O and no state. The scheduler feeds in the
//! conflict reported by the server and acts on the returned [`Resolution`].

mod lww;
mod merge;

pub use lww::{last_write_wins, WriteStamp};
pub use merge::{three_way_merge, MergeConflict};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::Conflict;

/// Strategy applied to conflicts reported by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    LastWriteWins,
    #[default]
    ThreeWayMerge,
}

impl std::str::FromStr for ResolutionStrategy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "last_write_wins" | "lww" => Ok(Self::LastWriteWins),
            "three_way_merge" | "merge" => Ok(Self::ThreeWayMerge),
            other => Err(format!("unknown resolution strategy '{other}'")),
        }
    }
}

/// Result of running a strategy over a conflict
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(Value),
    Unresolved(MergeConflict),
}

impl Resolution {
    pub const fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Resolved(value) => Some(value),
            Self::Unresolved(_) => None,
        }
    }
}

/// Run `strategy` over `conflict`.
///
/// `local_stamp` describes the local write. A conflict without a remote stamp
/// is treated as an infinitely old remote write under last-write-wins.
pub fn resolve(
    strategy: ResolutionStrategy,
    conflict: &Conflict,
    local_stamp: WriteStamp<'_>,
) -> Resolution {
    match strategy {
        ResolutionStrategy::LastWriteWins => {
            let remote_stamp = WriteStamp::new(
                conflict.remote_updated_at.unwrap_or(i64::MIN),
                conflict.remote_device_id.as_deref().unwrap_or_default(),
            );
            let winner = last_write_wins(
                conflict.base.as_ref(),
                &conflict.local,
                &conflict.remote,
                local_stamp,
                remote_stamp,
            );
            Resolution::Resolved(winner.clone())
        }
        ResolutionStrategy::ThreeWayMerge => {
            match three_way_merge(conflict.base.as_ref(), &conflict.local, &conflict.remote) {
                Ok(merged) => Resolution::Resolved(merged),
                Err(reason) => Resolution::Unresolved(reason),
            }
        }
    }
}
