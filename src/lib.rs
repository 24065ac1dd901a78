//! # seqflow
//!
//! **Seqflow** is a small async runtime for sequencer-style scripts: code that
//! drives instruments through commands, waits on conditions and reacts to
//! values published by other systems.
//!
//! It provides four primitives, plus a [`Script`] host that wires them to a
//! shared configuration, event bus and pub/sub channel:
//!
//! - [`par`]: fan-out/fan-in over independent operations;
//! - [`CommandHandler`]: bounded retry around a fallible operation, with an error observer;
//! - [`poll_loop`] / [`bg_loop`] / [`wait_for`]: loops paced by a minimum interval;
//! - [`Machine`]: a tick-driven state machine fed by reactive [`Var`]s.
//!
//! ## Architecture
//! ```text
//!   ┌──────────────┐  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐
//!   │CommandHandler│  │     par      │  │  PollLoop    │  │ MachineActor │◄── Var (pv_get / pv_monitor)
//!   │ (retry loop) │  │  (JoinSet)   │  │ (paced loop) │  │  (mailbox)   │        ▲
//!   └──────┬───────┘  └──────┬───────┘  └──────┬───────┘  └──────┬───────┘        │
//!          │ Handler*        │ ParFailed       │ Loop*           │ Machine*       Channel
//!          ▼                 ▼                 ▼                 ▼          (publish / subscribe)
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                       Bus (broadcast channel)                       │
//! │                    (capacity: Config::bus_capacity)                 │
//! └──────────────────────────────────┬──────────────────────────────────┘
//!                                    ▼
//!                         ┌─────────────────────┐
//!                         │ subscriber_listener │
//!                         │     (in Script)     │
//!                         └──────────┬──────────┘
//!                                    ▼
//!                              SubscriberSet
//!                          ┌─────────┼─────────┐
//!                          ▼         ▼         ▼
//!                       worker1   worker2   workerN
//!                          ▼         ▼         ▼
//!                     sub1.on   sub2.on   subN.on
//!                      _event()  _event()  _event()
//! ```
//!
//! ### Machine refresh
//! ```text
//! refresh(source) ──► mailbox ──► actor:
//!   previous = current
//!   loop {
//!     ├─► publish MachineTick{ name, previous, state, source }
//!     ├─► logic(current, tick)
//!     │       ├─ tick.become_state(s)  ─► current = s
//!     │       ├─ tick.when(true)       ─► queue a dispatch of the state its body leaves
//!     │       ├─ tick.entry()          ─► first dispatch of this state?
//!     │       └─ tick.complete()       ─► end the machine after this dispatch
//!     ├─ Err                ─► MachineFailed, refresh fails
//!     ├─ nothing queued     ─► done
//!     └─ else               ─► dispatch the next queued state with source "when"
//!   }
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                         |
//! |-------------------|---------------------------------------------------------------|--------------------------------------------|
//! | **Concurrency**   | Fan-out/fan-in with sibling cancellation.                     | [`par`]                                    |
//! | **Commands**      | Retry budget, backoff, error observer, command dispatch.      | [`CommandHandler`], [`Handlers`]           |
//! | **Loops**         | Paced loops with a stop signal, background loops.             | [`poll_loop`], [`stop_when`], [`LoopHandle`] |
//! | **State machines**| Ticked logic, entry actions, reactive variables.              | [`Machine`], [`Logic`], [`Tick`], [`Var`]  |
//! | **Channel**       | Keyed pub/sub contract and an in-memory implementation.       | [`Channel`], [`InMemoryChannel`]           |
//! | **Subscriber API**| Observe runtime events (logging, probes, custom subscribers). | [`Subscribe`], [`Event`]                   |
//! | **Errors**        | Typed errors for operations and runtime misuse.               | [`ScriptError`], [`RuntimeError`]          |
//! | **Configuration** | Centralize runtime settings.                                  | [`Config`], [`BackoffPolicy`]              |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use seqflow::{Config, InMemoryChannel, LogicFn, Script, ScriptError};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Build subscribers (optional)
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn seqflow::Subscribe>> = vec![Arc::new(seqflow::LogWriter::default())];
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn seqflow::Subscribe>> = Vec::new();
//!
//!     let script = Script::new(Config::default(), Arc::new(InMemoryChannel::new()), subs);
//!
//!     let mut setup = script.handler("setup", |exposure_ms: u64| async move {
//!         if exposure_ms == 0 {
//!             return Err(ScriptError::fatal("zero exposure"));
//!         }
//!         Ok(exposure_ms * 2)
//!     });
//!     setup.retry(2)?;
//!     assert_eq!(setup.execute(500).await?, 1000);
//!
//!     let dome = script.machine("dome", "Closed").start(LogicFn::new(|state, tick| {
//!         if state == "Closed" {
//!             if let Some(mut next) = tick.when(true) {
//!                 next.become_state("Open");
//!             }
//!         }
//!         Ok(())
//!     }));
//!     dome.refresh("init").await?;
//!     assert_eq!(dome.snapshot().current, "Open");
//!
//!     script.shutdown().await?;
//!     Ok(())
//! }
//! ```
mod channel;
mod config;
mod core;
mod error;
mod events;
mod flow;
mod handler;
mod machine;
mod policies;
mod subscribers;

// ---- Public re-exports ----

pub use channel::{Channel, InMemoryChannel, Sample, SampleStream};
pub use config::{Config, DEFAULT_LOOP_INTERVAL};
pub use core::Script;
pub use error::{RuntimeError, ScriptError};
pub use events::{Bus, Event, EventKind};
pub use flow::{
    bg_loop, par, poll_loop, poll_loop_with_interval, stop_when, wait_for, LoopExit, LoopHandle,
    LoopResult,
};
pub use handler::{CommandHandler, CommandOutcome, ExecutionState, Handlers, OutcomeSink};
pub use machine::{
    Logic, LogicFn, Machine, MachineHandle, Monitor, Snapshot, Tick, Transition, Var,
};
pub use policies::{BackoffPolicy, JitterPolicy};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
