//! Engine-wide sync state

use serde::{Deserialize, Serialize};
use std::fmt;

/// Exactly one of these holds for an engine at any time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    #[default]
    Idle,
    Syncing,
    Offline,
    Error,
    Conflict,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Syncing => "syncing",
            Self::Offline => "offline",
            Self::Error => "error",
            Self::Conflict => "conflict",
        };
        f.write_str(label)
    }
}
