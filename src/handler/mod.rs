//! Command handlers.
//!
//! - [`CommandHandler`] bounded-retry wrapper with an error observer
//! - [`ExecutionState`] explicit lifecycle of one `execute`
//! - [`Handlers`] command-name registry reporting to an [`OutcomeSink`]

mod command;
mod execution;
mod registry;

pub use command::CommandHandler;
pub use execution::ExecutionState;
pub use registry::{CommandOutcome, Handlers, OutcomeSink};
