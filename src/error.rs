//! Error types used by the script runtime and by user operations.
//!
//! This module defines two main error enums:
//!
//! - [`ScriptError`]: errors raised by operations (handlers, `par` tasks,
//!   loop bodies, machine logic) and by the runtime on their behalf.
//! - [`RuntimeError`]: misuse of the runtime itself (configuring a handler
//!   after it ran, unknown commands, shutdown overruns).
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logs.
//! The loop stop signal is not an error: see
//! [`LoopExit`](crate::LoopExit).

use std::any::Any;
use std::fmt::Display;
use std::time::Duration;

use thiserror::Error;

/// # Errors produced by script operations.
///
/// `Clone` so that the same failure can be handed to an `on_error` observer
/// and still be returned to the caller.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    /// Operation failed but may succeed if retried.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Non-recoverable failure; retry budgets are ignored.
    #[error("fatal error (no retry): {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },

    /// A bounded wait elapsed.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The bound that was exceeded.
        timeout: Duration,
    },

    /// A concurrently running task panicked.
    #[error("task {task} panicked: {reason}")]
    Panicked {
        /// Task label (index for `par`, loop name for background loops).
        task: String,
        /// Panic payload rendered as text.
        reason: String,
    },

    /// The subscription for a key ended before yielding a value.
    #[error("channel closed for key {key}")]
    ChannelClosed {
        /// Channel key.
        key: String,
    },

    /// A value could not be encoded or decoded.
    #[error("codec error for key {key}: {error}")]
    Codec {
        /// Channel key.
        key: String,
        /// Serializer message.
        error: String,
    },

    /// The state machine is no longer accepting refreshes.
    #[error("machine {machine} is stopped")]
    MachineStopped {
        /// Machine name.
        machine: String,
    },

    /// The enclosing context was cancelled.
    #[error("context cancelled")]
    Canceled,
}

impl ScriptError {
    /// Shorthand for [`ScriptError::Fail`] from anything printable.
    ///
    /// ```
    /// use seqflow::ScriptError;
    ///
    /// let err = ScriptError::fail("motor stalled");
    /// assert_eq!(err.to_string(), "execution failed: motor stalled");
    /// ```
    pub fn fail(error: impl Display) -> Self {
        ScriptError::Fail {
            error: error.to_string(),
        }
    }

    /// Shorthand for [`ScriptError::Fatal`].
    pub fn fatal(error: impl Display) -> Self {
        ScriptError::Fatal {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ScriptError::Fail { .. } => "script_failed",
            ScriptError::Fatal { .. } => "script_fatal",
            ScriptError::Timeout { .. } => "script_timeout",
            ScriptError::Panicked { .. } => "script_panicked",
            ScriptError::ChannelClosed { .. } => "channel_closed",
            ScriptError::Codec { .. } => "codec_error",
            ScriptError::MachineStopped { .. } => "machine_stopped",
            ScriptError::Canceled => "script_canceled",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            ScriptError::Fail { error } => format!("error: {error}"),
            ScriptError::Fatal { error } => format!("fatal: {error}"),
            ScriptError::Timeout { timeout } => format!("timeout: {timeout:?}"),
            ScriptError::Panicked { task, reason } => format!("panic in {task}: {reason}"),
            ScriptError::ChannelClosed { key } => format!("channel closed: {key}"),
            ScriptError::Codec { key, error } => format!("codec: {key}: {error}"),
            ScriptError::MachineStopped { machine } => format!("machine stopped: {machine}"),
            ScriptError::Canceled => "context cancelled".to_string(),
        }
    }

    /// Indicates whether a retry budget may be spent on this error.
    ///
    /// Everything except [`ScriptError::Fatal`], [`ScriptError::Canceled`] and
    /// [`ScriptError::Panicked`] is retried.
    ///
    /// ```
    /// use seqflow::ScriptError;
    ///
    /// assert!(ScriptError::fail("boom").is_retryable());
    /// assert!(!ScriptError::fatal("nope").is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ScriptError::Fatal { .. } | ScriptError::Canceled | ScriptError::Panicked { .. }
        )
    }
}

/// # Errors produced by the runtime itself.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// A handler was reconfigured after its first execution started.
    #[error("handler {handler} already started; retry/on_error must be set before execute")]
    HandlerStarted {
        /// Handler name.
        handler: String,
    },

    /// A command name was registered twice.
    #[error("handler for command {command} is already registered")]
    DuplicateHandler {
        /// Command name.
        command: String,
    },

    /// No handler is registered for a dispatched command.
    #[error("no handler registered for command {command}")]
    UnknownCommand {
        /// Command name.
        command: String,
    },

    /// Shutdown grace period was exceeded; some background work was still running.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Names of loops/machines that did not stop in time.
        stuck: Vec<String>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// ```
    /// use seqflow::RuntimeError;
    ///
    /// let err = RuntimeError::UnknownCommand { command: "park".into() };
    /// assert_eq!(err.as_label(), "runtime_unknown_command");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::HandlerStarted { .. } => "runtime_handler_started",
            RuntimeError::DuplicateHandler { .. } => "runtime_duplicate_handler",
            RuntimeError::UnknownCommand { .. } => "runtime_unknown_command",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::HandlerStarted { handler } => {
                format!("handler {handler} reconfigured after start")
            }
            RuntimeError::DuplicateHandler { command } => format!("duplicate command: {command}"),
            RuntimeError::UnknownCommand { command } => format!("unknown command: {command}"),
            RuntimeError::GraceExceeded { grace, stuck } => {
                format!("grace exceeded after {grace:?}; stuck={stuck:?}")
            }
        }
    }
}

/// Renders a caught panic payload as text.
pub(crate) fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
