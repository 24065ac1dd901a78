//! # Event subscribers.
//!
//! ```text
//!   handlers / loops / machines ── publish(Event) ──► Bus ──► Script listener
//!                                                              │
//!                                                              ▼
//!                                                        SubscriberSet
//!                                                     ┌────────┼────────┐
//!                                                     ▼        ▼        ▼
//!                                                 LogWriter  probe   custom
//! ```
//!
//! Implement [`Subscribe`] to observe a script; enable the `logging` feature for
//! the built-in [`LogWriter`].

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
