//! # Script: one host for handlers, loops, machines and their observers.
//!
//! A [`Script`] owns the shared pieces every primitive needs: the [`Config`],
//! the event [`Bus`], the [`Channel`] used by reactive variables, a root
//! [`CancellationToken`], and a tracker of everything running in the
//! background. Primitives created through it are wired to all of these.
//!
//! ```text
//! Script::new(cfg, channel, subscribers)
//!   └─ listener: Bus.subscribe() ──► SubscriberSet::emit(Event)
//!
//! script.handler / handlers  ──► CommandHandler (bus, cfg.backoff)
//! script.par                 ──► run_par (bus)
//! script.poll_loop / wait_for──► PollLoop (child token, bus), awaited in place
//! script.bg_loop             ──► PollLoop (child token, bus), spawned + tracked
//! script.machine             ──► Machine (child token, bus, tracker)
//!
//! shutdown()
//!   ├─ publish(ShutdownRequested)
//!   ├─ root token.cancel()          → loops, machines, monitors
//!   ├─ timeout(grace, tracker.wait())
//!   │     ├─ Ok  → publish(AllStoppedWithin)
//!   │     └─ Err → publish(GraceExceeded) + RuntimeError::GraceExceeded{stuck}
//!   └─ stop listener (drain) → SubscriberSet::shutdown()
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::channel::Channel;
use crate::config::Config;
use crate::core::AliveTracker;
use crate::error::{RuntimeError, ScriptError};
use crate::events::{Bus, Event, EventKind};
use crate::flow::{run_par, stop_when, LoopHandle, LoopResult, PollLoop};
use crate::handler::{CommandHandler, Handlers};
use crate::machine::Machine;
use crate::subscribers::{Subscribe, SubscriberSet};

/// Host of a running script.
///
/// ## Example
/// ```rust
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use seqflow::{stop_when, Config, InMemoryChannel, Script, ScriptError};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let script = Script::new(Config::default(), Arc::new(InMemoryChannel::new()), Vec::new());
///
/// let exposures = script
///     .par((1..=3).map(|n| async move { Ok::<_, ScriptError>(n * 10) }))
///     .await?;
/// assert_eq!(exposures, vec![10, 20, 30]);
///
/// let ticks = Arc::new(AtomicU32::new(0));
/// let t = ticks.clone();
/// script
///     .poll_loop(move || {
///         let t = t.clone();
///         async move { stop_when(t.fetch_add(1, Ordering::SeqCst) + 1 == 2) }
///     })
///     .await?;
///
/// script.shutdown().await?;
/// # Ok(())
/// # }
/// ```
pub struct Script {
    cfg: Config,
    bus: Bus,
    channel: Arc<dyn Channel>,
    token: CancellationToken,
    tracker: AliveTracker,
    subs: Arc<SubscriberSet>,
    listener: JoinHandle<()>,
    listener_stop: CancellationToken,
}

impl Script {
    /// Creates the script and starts delivering its events to `subscribers`.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(
        cfg: Config,
        channel: Arc<dyn Channel>,
        subscribers: Vec<Arc<dyn Subscribe>>,
    ) -> Self {
        let bus = Bus::new(cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(subscribers, bus.clone()));
        let listener_stop = CancellationToken::new();
        let listener = Self::subscriber_listener(&bus, Arc::clone(&subs), listener_stop.clone());

        Self {
            cfg,
            bus,
            channel,
            token: CancellationToken::new(),
            tracker: AliveTracker::new(),
            subs,
            listener,
            listener_stop,
        }
    }

    /// Forwards bus events to the subscriber set until `stop`, then drains what is buffered.
    fn subscriber_listener(
        bus: &Bus,
        set: Arc<SubscriberSet>,
        stop: CancellationToken,
    ) -> JoinHandle<()> {
        let mut rx = bus.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = stop.cancelled() => break,
                    ev = rx.recv() => match ev {
                        Ok(ev) => set.emit(ev),
                        Err(RecvError::Lagged(_)) => continue,
                        Err(RecvError::Closed) => return,
                    },
                }
            }
            loop {
                match rx.try_recv() {
                    Ok(ev) => set.emit(ev),
                    Err(TryRecvError::Lagged(_)) => continue,
                    Err(_) => break,
                }
            }
        })
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn channel(&self) -> Arc<dyn Channel> {
        Arc::clone(&self.channel)
    }

    /// Root token; cancelling it stops every loop and machine of this script.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Creates a retrying handler using the configured backoff.
    pub fn handler<I, O, F, Fut>(&self, name: impl Into<Arc<str>>, op: F) -> CommandHandler<I, O>
    where
        I: Clone + Send + 'static,
        O: Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, ScriptError>> + Send + 'static,
    {
        CommandHandler::new(name, op)
            .with_backoff(self.cfg.backoff)
            .with_bus(self.bus.clone())
    }

    /// Creates an empty command registry wired to this script.
    pub fn handlers<I>(&self) -> Handlers<I>
    where
        I: Clone + Send + 'static,
    {
        Handlers::wired(self.cfg.backoff, self.bus.clone())
    }

    /// Creates a state machine bound to this script's channel.
    pub fn machine(&self, name: impl Into<Arc<str>>, initial: impl Into<String>) -> Machine {
        Machine::new(name, initial, Arc::clone(&self.channel), &self.cfg)
            .with_bus(self.bus.clone())
            .with_token(&self.token)
            .with_tracker(self.tracker.clone())
    }

    /// [`par`](crate::par) with failures reported on the bus.
    pub async fn par<T, Fut, I>(&self, tasks: I) -> Result<Vec<T>, ScriptError>
    where
        I: IntoIterator<Item = Fut>,
        Fut: Future<Output = Result<T, ScriptError>> + Send + 'static,
        T: Send + 'static,
    {
        run_par(Some(&self.bus), "par", tasks).await
    }

    /// Runs a loop at the configured default interval.
    pub async fn poll_loop<F, Fut>(&self, body: F) -> Result<(), ScriptError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = LoopResult>,
    {
        self.poll_loop_with_interval(self.cfg.loop_interval, body)
            .await
    }

    /// Runs a loop at `min_interval`, floored at `Config::loop_interval`.
    pub async fn poll_loop_with_interval<F, Fut>(
        &self,
        min_interval: Duration,
        body: F,
    ) -> Result<(), ScriptError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = LoopResult>,
    {
        self.prepare_loop("loop", min_interval).run(body).await
    }

    /// Spawns a named background loop. Shutdown cancels it and waits for it.
    pub fn bg_loop<F, Fut>(
        &self,
        name: impl Into<Arc<str>>,
        min_interval: Duration,
        body: F,
    ) -> LoopHandle
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = LoopResult> + Send + 'static,
    {
        self.prepare_loop(name, min_interval)
            .spawn(body, Some(&self.tracker))
    }

    /// Polls `condition` at the default interval until it yields `true`.
    pub async fn wait_for<F, Fut>(&self, mut condition: F) -> Result<(), ScriptError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool, ScriptError>>,
    {
        self.prepare_loop("wait_for", self.cfg.loop_interval)
            .run(move || {
                let ready = condition();
                async move { stop_when(ready.await?) }
            })
            .await
    }

    fn prepare_loop(&self, name: impl Into<Arc<str>>, min_interval: Duration) -> PollLoop {
        PollLoop::new(name, self.cfg.effective_interval(min_interval))
            .with_token(self.token.child_token())
            .with_bus(self.bus.clone())
    }

    /// Stops everything and waits up to `Config::grace` for it to finish.
    ///
    /// Subscribers receive every event published before this returns.
    pub async fn shutdown(self) -> Result<(), RuntimeError> {
        self.bus.publish(Event::new(EventKind::ShutdownRequested));
        self.token.cancel();

        let grace = self.cfg.grace;
        let res = match self.tracker.wait(grace).await {
            Ok(()) => {
                self.bus.publish(Event::new(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(stuck) => {
                self.bus.publish(
                    Event::new(EventKind::GraceExceeded).with_reason(stuck.join(",")),
                );
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        };

        self.listener_stop.cancel();
        let _ = self.listener.await;
        if let Ok(subs) = Arc::try_unwrap(self.subs) {
            subs.shutdown().await;
        }
        res
    }
}
