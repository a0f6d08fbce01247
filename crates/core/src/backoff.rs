//! Failure-driven widening of a widget's refresh interval.
//!
//! A widget keeps refreshing at its configured cadence until it has failed
//! more than `failure_ceiling` times in a row. From then on every further
//! failure doubles the effective interval, clamped to `max_interval`. The
//! first success resets the interval to the configured base.

use std::time::Duration;

/// Default number of consecutive failures tolerated before backing off.
pub const DEFAULT_FAILURE_CEILING: u32 = 3;

/// Default upper bound on a backed-off interval (15 minutes).
pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(900);

/// Tunable parameters for the backoff strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Consecutive failures tolerated at the base interval.
    pub failure_ceiling: u32,
    /// Upper bound on the effective interval.
    pub max_interval: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            failure_ceiling: DEFAULT_FAILURE_CEILING,
            max_interval: DEFAULT_MAX_INTERVAL,
        }
    }
}

impl BackoffPolicy {
    /// Interval to use after `consecutive_failures` failures in a row.
    ///
    /// Never shorter than `base`, even when `base` exceeds `max_interval`.
    pub fn effective_interval(&self, base: Duration, consecutive_failures: u32) -> Duration {
        if consecutive_failures <= self.failure_ceiling {
            return base;
        }
        let exponent = (consecutive_failures - self.failure_ceiling).min(31);
        let widened = base.saturating_mul(1u32 << exponent);
        widened.min(self.max_interval.max(base))
    }
}
