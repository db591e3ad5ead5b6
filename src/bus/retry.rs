//! Exponential backoff for publishing.

use std::time::Duration;

use derive_getters::Getters;
use serde::{Deserialize, Serialize};

/// Exponential backoff: `initial_interval_ms * multiplier^(n-1)` before
/// retry `n`, capped at `max_interval_ms`, for at most `max_attempts` tries.
#[derive(Debug, Clone, Copy, PartialEq, Getters, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    initial_interval_ms: u64,
    /// Growth factor between consecutive delays.
    multiplier: f64,
    /// Upper bound on any single delay.
    max_interval_ms: u64,
    /// Total attempts, including the first.
    max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval_ms: 1_000,
            multiplier: 2.0,
            max_interval_ms: 10_000,
            max_attempts: 3,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy from explicit values.
    pub fn new(initial_interval: Duration, multiplier: f64, max_interval: Duration, max_attempts: u32) -> Self {
        Self {
            initial_interval_ms: initial_interval.as_millis() as u64,
            multiplier,
            max_interval_ms: max_interval.as_millis() as u64,
            max_attempts,
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay_ms = self.initial_interval_ms as f64 * self.multiplier.powi(exponent);
        let capped = delay_ms.min(self.max_interval_ms as f64);
        Duration::from_millis(capped as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delays_grow_then_cap() {
        let policy = RetryPolicy::new(
            Duration::from_millis(100),
            2.0,
            Duration::from_millis(500),
            5,
        );
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(4), Duration::from_millis(500));
        assert_eq!(policy.delay_for(40), Duration::from_millis(500));
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let policy: RetryPolicy = toml::from_str("").unwrap();
        assert_eq!(policy, RetryPolicy::default());
        assert_eq!(*policy.max_attempts(), 3);
    }
}
