//! Engine configuration.
//!
//! Every field has a default so hosts can deserialize partial JSON and
//! override only what they care about.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backoff::BackoffPolicy;
use crate::error::{Error, Result};
use crate::resolver::ResolutionStrategy;
use crate::util::normalize_text_option;

const DEFAULT_BATCH_SIZE: usize = 50;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_SYNC_INTERVAL_SECS: u64 = 30;
const DEFAULT_PERSIST_ATTEMPTS: u32 = 3;

/// Whether conflicts are resubmitted automatically
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConflictMode {
    /// Resolved conflicts are requeued; unresolved ones go to the conflict store
    #[default]
    Auto,
    /// Every conflict waits in the conflict store for explicit confirmation
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Stable per-installation id; generated and persisted when absent
    pub device_id: Option<String>,
    /// Operations per transport call
    pub batch_size: usize,
    /// Failed attempts tolerated before an operation is dropped
    pub max_retries: u32,
    /// Scheduler tick period
    pub sync_interval_secs: u64,
    pub strategy: ResolutionStrategy,
    pub conflict_mode: ConflictMode,
    /// Keep optimistic `<collection>-local` copies of mutated items
    pub offline_support: bool,
    /// Wake the scheduler when a mutation is made while online
    pub sync_on_change: bool,
    /// Attempts per queue persistence write before the mutation fails
    pub persist_attempts: u32,
    pub backoff: BackoffPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            device_id: None,
            batch_size: DEFAULT_BATCH_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            sync_interval_secs: DEFAULT_SYNC_INTERVAL_SECS,
            strategy: ResolutionStrategy::default(),
            conflict_mode: ConflictMode::default(),
            offline_support: true,
            sync_on_change: true,
            persist_attempts: DEFAULT_PERSIST_ATTEMPTS,
            backoff: BackoffPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a JSON configuration document
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|error| Error::Config(format!("invalid engine config JSON: {error}")))?;
        config.validate()
    }

    /// Normalize and check values, returning the cleaned config
    pub fn validate(mut self) -> Result<Self> {
        self.device_id = normalize_text_option(self.device_id);
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".to_string()));
        }
        if self.sync_interval_secs == 0 {
            return Err(Error::Config(
                "sync_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.persist_attempts == 0 {
            return Err(Error::Config(
                "persist_attempts must be at least 1".to_string(),
            ));
        }
        if let BackoffPolicy::Exponential { initial_ms, max_ms } = self.backoff {
            if initial_ms > max_ms {
                return Err(Error::Config(
                    "backoff initial_ms must not exceed max_ms".to_string(),
                ));
            }
        }
        Ok(self)
    }

    /// Set the device id
    #[must_use]
    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    /// Set the batch size
    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the retry ceiling
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the conflict strategy
    #[must_use]
    pub const fn with_strategy(mut self, strategy: ResolutionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the conflict mode
    #[must_use]
    pub const fn with_conflict_mode(mut self, conflict_mode: ConflictMode) -> Self {
        self.conflict_mode = conflict_mode;
        self
    }

    #[must_use]
    pub const fn with_offline_support(mut self, enabled: bool) -> Self {
        self.offline_support = enabled;
        self
    }

    #[must_use]
    pub const fn with_sync_on_change(mut self, enabled: bool) -> Self {
        self.sync_on_change = enabled;
        self
    }

    /// Set the retry backoff
    #[must_use]
    pub const fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Set the scheduler tick period
    #[must_use]
    pub const fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval_secs = interval.as_secs();
        self
    }

    /// Scheduler tick period
    pub const fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }
}
