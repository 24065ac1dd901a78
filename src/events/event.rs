//! # Runtime events emitted by handlers, loops and state machines.
//!
//! The [`EventKind`] enum classifies events across four groups:
//! - **Handler events**: attempts, failures, scheduled retries, final outcome
//! - **Flow events**: `par` failures and loop termination
//! - **Machine events**: ticks, logic failures, reactive variable updates
//! - **Runtime events**: subscriber health and script shutdown
//!
//! The [`Event`] struct carries optional metadata filled in depending on the kind.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use seqflow::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::MachineTick)
//!     .with_name("temp")
//!     .with_previous("Init")
//!     .with_state("Ok")
//!     .with_source("when");
//!
//! assert_eq!(ev.kind, EventKind::MachineTick);
//! assert_eq!(ev.state.as_deref(), Some("Ok"));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Handler events ===
    /// Handler attempt is starting. Sets `name`, `attempt`.
    HandlerStarting,
    /// Handler attempt failed. Sets `name`, `attempt`, `reason`.
    HandlerFailed,
    /// Another attempt will run after `delay_ms`. Sets `name`, `attempt`, `delay_ms`.
    RetryScheduled,
    /// Handler produced a result. Sets `name`, `attempt`.
    HandlerSucceeded,
    /// Handler gave up and surfaced the last failure. Sets `name`, `attempt`, `reason`.
    HandlerExhausted,

    // === Command outcomes ===
    /// A dispatched command completed. Sets `name` (command), `source` (command id).
    CommandCompleted,
    /// A dispatched command failed. Sets `name`, `source`, `reason`.
    CommandFailed,

    // === Flow events ===
    /// One `par` task failed and its siblings were cancelled. Sets `name`, `reason`.
    ParFailed,
    /// Loop body raised the stop signal. Sets `name`, `attempt` (iterations).
    LoopStopped,
    /// Loop body returned a genuine error. Sets `name`, `attempt`, `reason`.
    LoopFailed,
    /// Loop was cancelled between iterations. Sets `name`, `attempt`.
    LoopCanceled,

    // === Machine events ===
    /// One dispatch of machine logic. Sets `name`, `state`, `previous`, `source`.
    MachineTick,
    /// Machine logic returned an error. Sets `name`, `state`, `reason`.
    MachineFailed,
    /// Machine logic called `complete`. Sets `name`, `state`.
    MachineCompleted,
    /// Machine actor exited. Sets `name`, `state`.
    MachineStopped,
    /// A refresh request was dropped because the mailbox was full. Sets `name`, `source`.
    MailboxOverflow,
    /// A reactive variable received a value from the channel. Sets `name` (machine), `source` (key).
    VarUpdated,
    /// A monitored value could not be decoded. Sets `name`, `source`, `reason`.
    VarRejected,

    // === Runtime events ===
    /// Script shutdown requested.
    ShutdownRequested,
    /// All background work stopped within the grace period.
    AllStoppedWithin,
    /// Grace period exceeded. Sets `reason` (stuck names).
    GraceExceeded,
    /// Subscriber dropped an event (queue full or worker closed). Sets `name`, `reason`.
    SubscriberOverflow,
    /// Subscriber panicked during event processing. Sets `name`, `reason`.
    SubscriberPanicked,
}

/// Runtime event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Handler, loop, machine, command or subscriber name.
    pub name: Option<Arc<str>>,
    /// Attempt or iteration count (starting from 1).
    pub attempt: Option<u32>,
    /// Retry delay in milliseconds.
    pub delay_ms: Option<u32>,
    /// Machine state being dispatched.
    pub state: Option<Arc<str>>,
    /// Machine state recorded at the start of the refresh.
    pub previous: Option<Arc<str>>,
    /// What caused the tick (channel key, `"when"`, caller label) or command id.
    pub source: Option<Arc<str>>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            name: None,
            attempt: None,
            delay_ms: None,
            state: None,
            previous: None,
            source: None,
            reason: None,
        }
    }

    #[inline]
    pub fn with_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a delay (stored as milliseconds, saturating).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    #[inline]
    pub fn with_state(mut self, state: impl Into<Arc<str>>) -> Self {
        self.state = Some(state.into());
        self
    }

    /// Attaches the previous state, if there is one.
    #[inline]
    pub fn with_previous(mut self, previous: impl Into<Arc<str>>) -> Self {
        self.previous = Some(previous.into());
        self
    }

    #[inline]
    pub fn with_source(mut self, source: impl Into<Arc<str>>) -> Self {
        self.source = Some(source.into());
        self
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_name(subscriber)
            .with_reason(reason)
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_name(subscriber)
            .with_reason(info)
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }

    /// True for events that report on a subscriber itself (overflow, panic).
    #[inline]
    pub fn is_subscriber_report(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked
        )
    }
}
