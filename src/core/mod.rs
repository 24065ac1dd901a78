//! Script host and background-work tracking.
//!
//! - [`script`]: the [`Script`] host wiring primitives to config, bus and channel;
//! - [`alive`]: tracker of spawned loops/machines used at shutdown.

mod alive;
mod script;

pub(crate) use alive::AliveTracker;
pub use script::Script;
