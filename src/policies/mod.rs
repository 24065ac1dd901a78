//! Retry delay policies.
//!
//! - [`BackoffPolicy`] how the delay between handler retries evolves
//! - [`JitterPolicy`] randomization applied on top of it
//!
//! The default policy retries immediately; `retry_with_interval(n, d)` on a
//! handler is shorthand for [`BackoffPolicy::constant`].

mod backoff;
mod jitter;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
