//! Runtime events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `CommandHandler`, `Handlers::dispatch`, `par`, poll loops,
//!   the machine actor, `Var` monitors, `SubscriberSet` workers, `Script::shutdown`.
//! - **Consumer**: the `Script` listener, which fans out to the `SubscriberSet`.

mod bus;
mod event;

pub use bus::Bus;
pub(crate) use bus::emit;
pub use event::{Event, EventKind};
