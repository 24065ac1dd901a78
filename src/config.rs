//! # Script runtime configuration.
//!
//! [`Config`] centralizes the knobs shared by every primitive created through a
//! [`Script`](crate::Script).
//!
//! ## Sentinel values
//! - `get_timeout = 0s` → `pv_get` waits indefinitely
//! - `bus_capacity` / `mailbox_capacity` are clamped to a minimum of 1

use std::time::Duration;

use crate::policies::BackoffPolicy;

/// Default (and minimum) interval between the starts of two loop iterations.
pub const DEFAULT_LOOP_INTERVAL: Duration = Duration::from_millis(50);

/// Runtime configuration for a script.
///
/// All fields are public; prefer the helper accessors over checking sentinels
/// by hand.
#[derive(Clone, Debug)]
pub struct Config {
    /// Default minimum loop interval. Also acts as a floor: a loop never runs
    /// its iterations closer together than this.
    pub loop_interval: Duration,

    /// Capacity of the runtime event bus ring buffer.
    pub bus_capacity: usize,

    /// Capacity of each state machine's refresh mailbox.
    ///
    /// Refreshes triggered by reactive variables are dropped (and reported as
    /// `MailboxOverflow`) when the mailbox is full.
    pub mailbox_capacity: usize,

    /// Upper bound on a single `pv_get` (`Duration::ZERO` = no bound).
    pub get_timeout: Duration,

    /// How long `Script::shutdown` waits for background loops and machines.
    pub grace: Duration,

    /// Delay policy between handler retries.
    pub backoff: BackoffPolicy,
}

impl Config {
    /// Returns the `pv_get` bound as an `Option`.
    #[inline]
    pub fn pv_get_timeout(&self) -> Option<Duration> {
        if self.get_timeout == Duration::ZERO {
            None
        } else {
            Some(self.get_timeout)
        }
    }

    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    #[inline]
    pub fn mailbox_capacity_clamped(&self) -> usize {
        self.mailbox_capacity.max(1)
    }

    /// Applies the loop-interval floor to a requested interval.
    #[inline]
    pub fn effective_interval(&self, requested: Duration) -> Duration {
        requested.max(self.loop_interval)
    }
}

impl Default for Config {
    /// - `loop_interval = 50ms`
    /// - `bus_capacity = 1024`
    /// - `mailbox_capacity = 64`
    /// - `get_timeout = 0s` (unbounded)
    /// - `grace = 5s`
    /// - `backoff = BackoffPolicy::default()` (retry immediately)
    fn default() -> Self {
        Self {
            loop_interval: DEFAULT_LOOP_INTERVAL,
            bus_capacity: 1024,
            mailbox_capacity: 64,
            get_timeout: Duration::ZERO,
            grace: Duration::from_secs(5),
            backoff: BackoffPolicy::default(),
        }
    }
}
