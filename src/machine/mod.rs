//! # Tick-driven state machines with reactive variables.
//!
//! A machine holds a current state name and a [`Logic`] that is dispatched on
//! the current state each time the machine is refreshed. Refreshes come from
//! the script ([`MachineHandle::refresh`]) or from channel values arriving at a
//! [`Var`] ([`Var::pv_get`], [`Var::pv_monitor`]).
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use seqflow::{Config, InMemoryChannel, LogicFn, Machine};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), seqflow::ScriptError> {
//! let machine = Machine::new("dome", "Closed", Arc::new(InMemoryChannel::new()), &Config::default());
//! let handle = machine.start(LogicFn::new(|state, tick| {
//!     if state == "Closed" {
//!         if let Some(mut next) = tick.when(true) {
//!             next.become_state("Open");
//!         }
//!     }
//!     Ok(())
//! }));
//!
//! handle.refresh("start").await?;
//! let snap = handle.snapshot();
//! assert_eq!(snap.current, "Open");
//! assert_eq!(snap.previous.as_deref(), Some("Closed"));
//! handle.stop();
//! # Ok(())
//! # }
//! ```

mod actor;
mod handle;
mod logic;
mod tick;
mod var;

pub use handle::{Machine, MachineHandle, Snapshot};
pub use logic::{Logic, LogicFn};
pub use tick::{Tick, Transition};
pub use var::{Monitor, Var};
