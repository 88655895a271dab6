//! Retry delay policy for rejected operations

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Delay before an operation that was rejected may be transmitted again.
///
/// Independent of the scheduler tick: a tick only sends operations whose
/// delay has elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackoffPolicy {
    /// Retry on the next cycle
    None,
    /// Same delay after every failure
    Fixed { delay_ms: u64 },
    /// Doubling delay starting at `initial_ms`, capped at `max_ms`
    Exponential { initial_ms: u64, max_ms: u64 },
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::Exponential {
            initial_ms: 1_000,
            max_ms: 300_000,
        }
    }
}

impl BackoffPolicy {
    /// Delay after the `retry_count`-th failure (1-based)
    pub fn delay(&self, retry_count: u32) -> Duration {
        match *self {
            Self::None => Duration::ZERO,
            Self::Fixed { delay_ms } => Duration::from_millis(delay_ms),
            Self::Exponential { initial_ms, max_ms } => {
                let exponent = retry_count.saturating_sub(1).min(63);
                let factor = 1u64 << exponent;
                Duration::from_millis(initial_ms.saturating_mul(factor).min(max_ms))
            }
        }
    }

    /// Earliest retry time (Unix ms) after a failure at `now`
    pub fn next_attempt_at(&self, now: i64, retry_count: u32) -> Option<i64> {
        let delay = self.delay(retry_count);
        if delay.is_zero() {
            return None;
        }
        let delay_ms = i64::try_from(delay.as_millis()).unwrap_or(i64::MAX);
        Some(now.saturating_add(delay_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_doubles_and_caps() {
        let policy = BackoffPolicy::Exponential {
            initial_ms: 100,
            max_ms: 1_000,
        };
        assert_eq!(policy.delay(1), Duration::from_millis(100));
        assert_eq!(policy.delay(2), Duration::from_millis(200));
        assert_eq!(policy.delay(4), Duration::from_millis(800));
        assert_eq!(policy.delay(5), Duration::from_millis(1_000));
        assert_eq!(policy.delay(200), Duration::from_millis(1_000));
    }

    #[test]
    fn fixed_and_none() {
        assert_eq!(
            BackoffPolicy::Fixed { delay_ms: 50 }.delay(7),
            Duration::from_millis(50)
        );
        assert_eq!(BackoffPolicy::None.delay(3), Duration::ZERO);
        assert_eq!(BackoffPolicy::None.next_attempt_at(10, 1), None);
    }

    #[test]
    fn next_attempt_is_offset_from_now() {
        let policy = BackoffPolicy::Fixed { delay_ms: 250 };
        assert_eq!(policy.next_attempt_at(1_000, 1), Some(1_250));
    }

    #[test]
    fn policy_deserializes_from_config() {
        let policy: BackoffPolicy =
            serde_json::from_str(r#"{"kind":"exponential","initial_ms":10,"max_ms":20}"#).unwrap();
        assert_eq!(
            policy,
            BackoffPolicy::Exponential {
                initial_ms: 10,
                max_ms: 20
            }
        );
    }
}
