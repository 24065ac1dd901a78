//! # Machine actor: serializes refreshes and runs the transition work loop.
//!
//! ```text
//! MachineHandle::refresh ─┐
//! MachineHandle::trigger ─┼──► mpsc mailbox ──► MachineActor::run ──► refresh(source)
//! Var::pv_get / monitor  ─┘                                               │
//!                                                                         ▼
//!   previous = current
//!   loop {
//!       cancelled?          ──► Err(MachineStopped)
//!       begin_tick; MachineTick; logic(current, tick)
//!       Err(e)              ──► MachineFailed ──► Err(e)
//!       complete()          ──► MachineCompleted, cancel ──► Ok(())
//!       push this dispatch's `when`s (in order) on the work stack
//!       stack empty         ──► Ok(())
//!       else                ──► current = pop(); dispatch with source "when"
//!   }
//! ```
//!
//! ## Rules
//! - One refresh at a time per machine; requests queue in the mailbox.
//! - `previous` is recorded once per refresh request, not per chained dispatch.
//! - Every satisfied `when` yields one dispatch. Dispatches queued by a state
//!   run before the ones queued earlier by its caller (depth-first).
//! - `entry` holds on the first dispatch of a state that differs from the
//!   previously dispatched one.
//! - Transition chains run in a loop, so their length does not grow the stack.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use super::handle::{Command, Snapshot};
use super::logic::Logic;
use super::tick::Tick;
use crate::error::ScriptError;
use crate::events::{emit, Bus, Event, EventKind};

/// Source label of dispatches chained by a satisfied `when`.
const WHEN_SOURCE: &str = "when";

/// Mutable machine state, owned by the actor and lent to [`Tick`].
pub(crate) struct MachineCore {
    pub(crate) name: Arc<str>,
    pub(crate) current: String,
    pub(crate) previous: Option<String>,
    last_dispatched: Option<String>,
    pub(crate) entered: bool,
    /// States queued by the running dispatch's satisfied `when`s, in order.
    pub(crate) pending: Vec<String>,
    pub(crate) completed: bool,
    ticks: u64,
}

impl MachineCore {
    pub(crate) fn new(name: Arc<str>, initial: String) -> Self {
        Self {
            name,
            current: initial,
            previous: None,
            last_dispatched: None,
            entered: false,
            pending: Vec::new(),
            completed: false,
            ticks: 0,
        }
    }

    fn begin_tick(&mut self) {
        self.entered = self.last_dispatched.as_deref() != Some(self.current.as_str());
        self.last_dispatched = Some(self.current.clone());
        self.pending.clear();
        self.ticks += 1;
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        Snapshot {
            name: Arc::clone(&self.name),
            current: self.current.clone(),
            previous: self.previous.clone(),
            ticks: self.ticks,
        }
    }
}

pub(crate) struct MachineActor<L> {
    core: MachineCore,
    logic: L,
    rx: mpsc::Receiver<Command>,
    token: CancellationToken,
    bus: Option<Bus>,
    state_tx: watch::Sender<Snapshot>,
}

impl<L: Logic> MachineActor<L> {
    pub(crate) fn new(
        core: MachineCore,
        logic: L,
        rx: mpsc::Receiver<Command>,
        token: CancellationToken,
        bus: Option<Bus>,
        state_tx: watch::Sender<Snapshot>,
    ) -> Self {
        Self {
            core,
            logic,
            rx,
            token,
            bus,
            state_tx,
        }
    }

    pub(crate) async fn run(mut self) {
        loop {
            let cmd = tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                cmd = self.rx.recv() => match cmd {
                    Some(cmd) => cmd,
                    None => break,
                },
            };

            match cmd {
                Command::Refresh { source, ack } => {
                    let res = self.refresh(source).await;
                    if let Some(ack) = ack {
                        let _ = ack.send(res);
                    }
                }
            }
        }

        self.rx.close();
        while let Ok(Command::Refresh { ack, .. }) = self.rx.try_recv() {
            if let Some(ack) = ack {
                let _ = ack.send(Err(self.stopped()));
            }
        }
        emit(self.bus.as_ref(), || {
            Event::new(EventKind::MachineStopped)
                .with_name(Arc::clone(&self.core.name))
                .with_state(self.core.current.as_str())
        });
    }

    async fn refresh(&mut self, source: Arc<str>) -> Result<(), ScriptError> {
        self.core.previous = Some(self.core.current.clone());
        let mut source = source;
        let mut work: Vec<String> = Vec::new();

        loop {
            if self.token.is_cancelled() {
                return Err(self.stopped());
            }

            self.core.begin_tick();
            emit(self.bus.as_ref(), || {
                let ev = Event::new(EventKind::MachineTick)
                    .with_name(Arc::clone(&self.core.name))
                    .with_state(self.core.current.as_str())
                    .with_source(Arc::clone(&source));
                match self.core.previous.as_deref() {
                    Some(previous) => ev.with_previous(previous),
                    None => ev,
                }
            });

            let state = self.core.current.clone();
            let res = {
                let mut tick = Tick::new(&mut self.core, &self.token);
                self.logic.logic(&state, &mut tick).await
            };
            self.state_tx.send_replace(self.core.snapshot());

            if let Err(err) = res {
                emit(self.bus.as_ref(), || {
                    Event::new(EventKind::MachineFailed)
                        .with_name(Arc::clone(&self.core.name))
                        .with_state(state.as_str())
                        .with_reason(err.to_string())
                });
                if self.core.completed {
                    self.token.cancel();
                }
                return Err(err);
            }
            if self.core.completed {
                emit(self.bus.as_ref(), || {
                    Event::new(EventKind::MachineCompleted)
                        .with_name(Arc::clone(&self.core.name))
                        .with_state(self.core.current.as_str())
                });
                self.token.cancel();
                return Ok(());
            }

            work.extend(self.core.pending.drain(..).rev());
            let Some(next) = work.pop() else {
                return Ok(());
            };
            self.core.current = next;
            source = Arc::from(WHEN_SOURCE);
        }
    }

    fn stopped(&self) -> ScriptError {
        ScriptError::MachineStopped {
            machine: self.core.name.to_string(),
        }
    }
}
