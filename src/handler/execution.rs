//! # Lifecycle of one handler execution.
//!
//! ```text
//!   Idle ──begin──► Running{1} ──succeed──► Success{1}
//!                      │
//!                      ├──retry──► Running{2} ──► ... ──► Running{n+1}
//!                      │                                    │
//!                      └────────────give_up─────────────────┴──► Failed{k}
//! ```
//!
//! The handler drives these transitions explicitly instead of unwinding, so the
//! outcome of the last execution can be inspected after the fact.

/// State of a single `execute` call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExecutionState {
    /// Nothing has run yet.
    #[default]
    Idle,
    /// Attempt `attempt` (1-based) is in flight.
    Running {
        /// Current attempt number.
        attempt: u32,
    },
    /// The operation produced a value.
    Success {
        /// Attempts used, including the successful one.
        attempts: u32,
    },
    /// Every allowed attempt failed; the last failure was surfaced.
    Failed {
        /// Attempts used.
        attempts: u32,
    },
}

impl ExecutionState {
    /// Current or final attempt count (`0` while idle).
    pub fn attempts(&self) -> u32 {
        match *self {
            ExecutionState::Idle => 0,
            ExecutionState::Running { attempt } => attempt,
            ExecutionState::Success { attempts } | ExecutionState::Failed { attempts } => attempts,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionState::Success { .. } | ExecutionState::Failed { .. }
        )
    }

    pub(crate) fn begin(&mut self) {
        debug_assert_eq!(*self, ExecutionState::Idle);
        *self = ExecutionState::Running { attempt: 1 };
    }

    pub(crate) fn retry(&mut self) {
        if let ExecutionState::Running { attempt } = *self {
            *self = ExecutionState::Running {
                attempt: attempt.saturating_add(1),
            };
        }
    }

    pub(crate) fn succeed(&mut self) {
        *self = ExecutionState::Success {
            attempts: self.attempts(),
        };
    }

    pub(crate) fn give_up(&mut self) {
        *self = ExecutionState::Failed {
            attempts: self.attempts(),
        };
    }
}
