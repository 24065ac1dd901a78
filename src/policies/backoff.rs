//! # Delay between handler retries.
//!
//! [`BackoffPolicy`] answers "how long to wait before retry `k`" for a
//! [`CommandHandler`](crate::CommandHandler). The delay for retry `k`
//! (0-based) is `first × factor^k`, clamped to `max`, then jittered. The base
//! is derived from `k` alone, so jitter never feeds back into later delays.
//!
//! ```rust
//! use std::time::Duration;
//! use seqflow::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(100),
//!     max: Duration::from_secs(1),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//! assert_eq!(backoff.next(0), Duration::from_millis(100));
//! assert_eq!(backoff.next(2), Duration::from_millis(400));
//! assert_eq!(backoff.next(10), Duration::from_secs(1));
//!
//! assert_eq!(BackoffPolicy::default().next(3), Duration::ZERO);
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Retry delay policy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub first: Duration,
    /// Cap for any single delay.
    pub max: Duration,
    /// Multiplicative growth factor (`1.0` = constant).
    pub factor: f64,
    /// Randomization applied to the clamped base.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Retries immediately: `first = 0`, `factor = 1.0`, no jitter.
    fn default() -> Self {
        Self::constant(Duration::ZERO)
    }
}

impl BackoffPolicy {
    /// Same delay before every retry.
    pub fn constant(interval: Duration) -> Self {
        Self {
            first: interval,
            max: interval,
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }

    /// Computes the delay before retry `retry` (0-based).
    pub fn next(&self, retry: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let exp = retry.min(i32::MAX as u32) as i32;
        let unclamped = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if !unclamped.is_finite() || unclamped < 0.0 || unclamped > max_secs {
            self.max
        } else {
            Duration::from_secs_f64(unclamped)
        };

        match self.jitter {
            JitterPolicy::Decorrelated => {
                self.jitter
                    .apply_decorrelated(self.first.min(self.max), base, self.max)
            }
            other => other.apply(base),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exp(first_ms: u64, max: Duration, jitter: JitterPolicy) -> BackoffPolicy {
        BackoffPolicy {
            first: Duration::from_millis(first_ms),
            max,
            factor: 2.0,
            jitter,
        }
    }

    #[test]
    fn constant_interval_never_grows() {
        let policy = BackoffPolicy::constant(Duration::from_millis(250));
        for retry in 0..8 {
            assert_eq!(policy.next(retry), Duration::from_millis(250));
        }
    }

    #[test]
    fn exponential_growth_is_capped() {
        let policy = exp(100, Duration::from_secs(1), JitterPolicy::None);
        assert_eq!(policy.next(1), Duration::from_millis(200));
        assert_eq!(policy.next(3), Duration::from_millis(800));
        assert_eq!(policy.next(4), Duration::from_secs(1));
        assert_eq!(policy.next(u32::MAX), Duration::from_secs(1));
    }

    #[test]
    fn first_larger_than_max_is_clamped() {
        let policy = BackoffPolicy {
            first: Duration::from_secs(10),
            max: Duration::from_secs(5),
            factor: 1.0,
            jitter: JitterPolicy::None,
        };
        assert_eq!(policy.next(0), Duration::from_secs(5));
    }

    #[test]
    fn equal_jitter_stays_within_half_and_full_base() {
        let policy = exp(100, Duration::from_secs(30), JitterPolicy::Equal);
        for retry in 0..10 {
            let base = (100.0 * 2.0f64.powi(retry as i32)).min(30_000.0) as u64;
            let delay = policy.next(retry);
            assert!(delay >= Duration::from_millis(base / 2), "retry {retry}: {delay:?}");
            assert!(delay <= Duration::from_millis(base), "retry {retry}: {delay:?}");
        }
    }

    #[test]
    fn decorrelated_jitter_respects_floor() {
        let policy = exp(100, Duration::from_secs(30), JitterPolicy::Decorrelated);
        for _ in 0..50 {
            let delay = policy.next(6);
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_secs(30));
        }
    }
}
