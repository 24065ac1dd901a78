use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::actor::{MachineActor, MachineCore};
use super::logic::Logic;
use super::var::Var;
use crate::channel::Channel;
use crate::config::Config;
use crate::core::AliveTracker;
use crate::error::{panic_reason, ScriptError};
use crate::events::{emit, Bus, Event, EventKind};

/// Mailbox message of a machine actor.
pub(crate) enum Command {
    Refresh {
        source: Arc<str>,
        ack: Option<oneshot::Sender<Result<(), ScriptError>>>,
    },
}

/// Point-in-time view of a machine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub name: Arc<str>,
    pub current: String,
    /// State recorded at the start of the last refresh (`None` before the first one).
    pub previous: Option<String>,
    /// Number of logic dispatches so far, chained ones included.
    pub ticks: u64,
}

/// What a variable needs to know about the machine it belongs to.
#[derive(Clone)]
pub(crate) struct Owner {
    pub(crate) name: Arc<str>,
    pub(crate) tx: mpsc::Sender<Command>,
    pub(crate) token: CancellationToken,
    pub(crate) bus: Option<Bus>,
    pub(crate) tracker: Option<AliveTracker>,
}

impl Owner {
    /// Enqueues a refresh without waiting for it.
    ///
    /// A full mailbox drops the request (reported as `MailboxOverflow`); a
    /// stopped machine is an error.
    pub(crate) fn notify(&self, source: &str) -> Result<(), ScriptError> {
        let cmd = Command::Refresh {
            source: Arc::from(source),
            ack: None,
        };
        match self.tx.try_send(cmd) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                emit(self.bus.as_ref(), || {
                    Event::new(EventKind::MailboxOverflow)
                        .with_name(Arc::clone(&self.name))
                        .with_source(source)
                });
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(ScriptError::MachineStopped {
                machine: self.name.to_string(),
            }),
        }
    }
}

/// A state machine under construction.
///
/// Create variables with [`var`](Machine::var), then hand the logic to
/// [`start`](Machine::start).
pub struct Machine {
    core: MachineCore,
    owner: Owner,
    rx: mpsc::Receiver<Command>,
    channel: Arc<dyn Channel>,
    get_timeout: Option<Duration>,
}

impl Machine {
    pub fn new(
        name: impl Into<Arc<str>>,
        initial: impl Into<String>,
        channel: Arc<dyn Channel>,
        cfg: &Config,
    ) -> Self {
        let name = name.into();
        let (tx, rx) = mpsc::channel(cfg.mailbox_capacity_clamped());
        Self {
            core: MachineCore::new(Arc::clone(&name), initial.into()),
            owner: Owner {
                name,
                tx,
                token: CancellationToken::new(),
                bus: None,
                tracker: None,
            },
            rx,
            channel,
            get_timeout: cfg.pv_get_timeout(),
        }
    }

    pub(crate) fn with_bus(mut self, bus: Bus) -> Self {
        self.owner.bus = Some(bus);
        self
    }

    /// Ties the machine (and its monitors) to `parent`'s cancellation.
    pub(crate) fn with_token(mut self, parent: &CancellationToken) -> Self {
        self.owner.token = parent.child_token();
        self
    }

    pub(crate) fn with_tracker(mut self, tracker: AliveTracker) -> Self {
        self.owner.tracker = Some(tracker);
        self
    }

    pub fn name(&self) -> &str {
        &self.owner.name
    }

    /// Creates an unset variable bound to channel `key`.
    pub fn var<T>(&self, key: impl Into<Arc<str>>) -> Var<T>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    {
        Var::new(
            key.into(),
            None,
            Arc::clone(&self.channel),
            self.owner.clone(),
            self.get_timeout,
        )
    }

    /// Creates a variable bound to `key` with a cached initial value.
    ///
    /// Nothing is published until [`Var::pv_put`] is called.
    pub fn var_with<T>(&self, key: impl Into<Arc<str>>, initial: T) -> Var<T>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    {
        Var::new(
            key.into(),
            Some(initial),
            Arc::clone(&self.channel),
            self.owner.clone(),
            self.get_timeout,
        )
    }

    /// Spawns the machine actor. No dispatch happens until the first refresh.
    pub fn start<L: Logic>(self, logic: L) -> MachineHandle {
        let Machine {
            core, owner, rx, ..
        } = self;

        let (state_tx, state_rx) = watch::channel(core.snapshot());
        let actor = MachineActor::new(
            core,
            logic,
            rx,
            owner.token.clone(),
            owner.bus.clone(),
            state_tx,
        );
        let join = match &owner.tracker {
            Some(tracker) => tracker.spawn(Arc::clone(&owner.name), actor.run()),
            None => tokio::spawn(actor.run()),
        };

        MachineHandle {
            owner,
            state: state_rx,
            join,
        }
    }
}

/// Handle to a running machine.
///
/// Dropping the handle does not stop the machine; call [`stop`](Self::stop).
pub struct MachineHandle {
    owner: Owner,
    state: watch::Receiver<Snapshot>,
    join: JoinHandle<()>,
}

impl MachineHandle {
    pub fn name(&self) -> &str {
        &self.owner.name
    }

    /// Requests a refresh and waits until it (and every chained dispatch) is done.
    ///
    /// Returns the logic's error if a dispatch failed.
    pub async fn refresh(&self, source: &str) -> Result<(), ScriptError> {
        let (ack, done) = oneshot::channel();
        let cmd = Command::Refresh {
            source: Arc::from(source),
            ack: Some(ack),
        };
        self.owner.tx.send(cmd).await.map_err(|_| self.stopped())?;
        done.await.map_err(|_| self.stopped())?
    }

    /// Enqueues a refresh without waiting for it.
    pub fn trigger(&self, source: &str) -> Result<(), ScriptError> {
        self.owner.notify(source)
    }

    pub fn snapshot(&self) -> Snapshot {
        self.state.borrow().clone()
    }

    /// Receiver updated after every dispatch.
    pub fn watch(&self) -> watch::Receiver<Snapshot> {
        self.state.clone()
    }

    /// Cancels the machine and its monitors. Pending refreshes fail with
    /// [`ScriptError::MachineStopped`].
    pub fn stop(&self) {
        self.owner.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Waits for the actor to exit.
    pub async fn join(self) -> Result<(), ScriptError> {
        match self.join.await {
            Ok(()) => Ok(()),
            Err(err) if err.is_panic() => Err(ScriptError::Panicked {
                task: self.owner.name.to_string(),
                reason: panic_reason(err.into_panic().as_ref()),
            }),
            Err(_) => Err(ScriptError::Canceled),
        }
    }

    fn stopped(&self) -> ScriptError {
        ScriptError::MachineStopped {
            machine: self.owner.name.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{InMemoryChannel, Sample, SampleStream};
    use crate::machine::{LogicFn, Tick};
    use async_trait::async_trait;
    use futures::StreamExt;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::task::Poll;
    use tokio::time::Instant;

    fn machine(initial: &str) -> (Machine, InMemoryChannel) {
        let channel = InMemoryChannel::new();
        let m = Machine::new("temp", initial, Arc::new(channel.clone()), &Config::default());
        (m, channel)
    }

    struct Temperature {
        temp: Var<i64>,
    }

    #[async_trait]
    impl Logic for Temperature {
        async fn logic(&mut self, state: &str, tick: &mut Tick<'_>) -> Result<(), ScriptError> {
            let temp = self.temp.get().unwrap_or_default();
            match state {
                "Init" => {
                    if let Some(mut next) = tick.when(true) {
                        self.temp.set(45);
                        self.temp.pv_put().await?;
                        next.become_state("Ok");
                    }
                }
                "Ok" => {
                    if let Some(mut next) = tick.when(temp > 40) {
                        self.temp.set(25);
                        next.become_state("High");
                    }
                }
                "High" => {
                    if let Some(mut next) = tick.when(temp < 30) {
                        next.become_state("Ok");
                    }
                }
                _ => {}
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn transition_chain_runs_within_one_refresh() {
        let (m, channel) = machine("Init");
        let temp = m.var_with("esw.epic.temp", 0_i64);
        let handle = m.start(Temperature { temp: temp.clone() });

        handle.refresh("Init").await.unwrap();

        let snap = handle.snapshot();
        assert_eq!(snap.current, "Ok");
        assert_eq!(snap.previous.as_deref(), Some("Init"));
        assert_eq!(snap.ticks, 4);
        assert_eq!(temp.get(), Some(25));
        assert_eq!(
            channel.latest("esw.epic.temp").unwrap().value,
            serde_json::json!(45)
        );
        handle.stop();
    }

    #[tokio::test]
    async fn previous_state_is_the_state_before_each_refresh() {
        let (m, _) = machine("A");
        let handle = m.start(LogicFn::new(|state, tick| {
            let next = match state {
                "A" => "B",
                "B" => "C",
                _ => return Ok(()),
            };
            if let Some(mut t) = tick.when(true) {
                t.become_state(next);
            }
            Ok(())
        }));

        assert_eq!(handle.snapshot().previous, None);

        handle.refresh("first").await.unwrap();
        let snap = handle.snapshot();
        assert_eq!(snap.current, "C");
        assert_eq!(snap.previous.as_deref(), Some("A"));

        handle.refresh("second").await.unwrap();
        assert_eq!(handle.snapshot().previous.as_deref(), Some("C"));
        handle.stop();
    }

    #[tokio::test]
    async fn entry_fires_once_per_state_entered() {
        let (m, _) = machine("Idle");
        let go = Arc::new(AtomicBool::new(false));
        let entries = Arc::new(Mutex::new(Vec::new()));

        let (g, e) = (go.clone(), entries.clone());
        let handle = m.start(LogicFn::new(move |state, tick| {
            if tick.entry() {
                e.lock().unwrap().push(state.to_string());
            }
            if state == "Idle" {
                if let Some(mut next) = tick.when(g.load(Ordering::SeqCst)) {
                    next.become_state("Busy");
                }
            }
            Ok(())
        }));

        handle.refresh("a").await.unwrap();
        handle.refresh("b").await.unwrap();
        go.store(true, Ordering::SeqCst);
        handle.refresh("c").await.unwrap();
        handle.refresh("d").await.unwrap();

        assert_eq!(*entries.lock().unwrap(), vec!["Idle", "Busy"]);
        assert_eq!(handle.snapshot().ticks, 5);
        handle.stop();
    }

    #[tokio::test]
    async fn long_transition_chains_do_not_grow_the_stack() {
        let (m, _) = machine("0");
        let handle = m.start(LogicFn::new(|state, tick| {
            let n: u32 = state.parse().map_err(ScriptError::fatal)?;
            if let Some(mut next) = tick.when(n < 10_000) {
                next.become_state((n + 1).to_string());
            }
            Ok(())
        }));

        handle.refresh("go").await.unwrap();

        let snap = handle.snapshot();
        assert_eq!(snap.current, "10000");
        assert_eq!(snap.ticks, 10_001);
        handle.stop();
    }

    #[tokio::test]
    async fn every_satisfied_when_dispatches_its_state() {
        let (m, _) = machine("A");
        let dispatched = Arc::new(Mutex::new(Vec::new()));
        let entries = Arc::new(Mutex::new(Vec::new()));

        let (d, e) = (dispatched.clone(), entries.clone());
        let handle = m.start(LogicFn::new(move |state, tick| {
            d.lock().unwrap().push(state.to_string());
            if tick.entry() {
                e.lock().unwrap().push(state.to_string());
            }
            if state == "A" {
                if let Some(mut next) = tick.when(true) {
                    next.become_state("B");
                }
                if let Some(mut next) = tick.when(true) {
                    next.become_state("C");
                }
            }
            Ok(())
        }));

        handle.refresh("go").await.unwrap();

        assert_eq!(*dispatched.lock().unwrap(), vec!["A", "B", "C"]);
        assert_eq!(*entries.lock().unwrap(), vec!["A", "B", "C"]);
        let snap = handle.snapshot();
        assert_eq!(snap.current, "C");
        assert_eq!(snap.previous.as_deref(), Some("A"));
        assert_eq!(snap.ticks, 3);
        handle.stop();
    }

    #[tokio::test]
    async fn chained_dispatches_run_before_later_siblings() {
        let (m, _) = machine("A");
        let dispatched = Arc::new(Mutex::new(Vec::new()));

        let d = dispatched.clone();
        let handle = m.start(LogicFn::new(move |state, tick| {
            d.lock().unwrap().push(state.to_string());
            let targets: &[&str] = match state {
                "A" => &["B", "C"],
                "B" => &["D"],
                _ => &[],
            };
            for target in targets {
                if let Some(mut next) = tick.when(true) {
                    next.become_state(*target);
                }
            }
            Ok(())
        }));

        handle.refresh("go").await.unwrap();

        assert_eq!(*dispatched.lock().unwrap(), vec!["A", "B", "D", "C"]);
        assert_eq!(handle.snapshot().current, "C");
        handle.stop();
    }

    #[tokio::test]
    async fn complete_ends_the_machine_after_the_dispatch() {
        let (m, _) = machine("Run");
        let bus = Bus::new(64);
        let mut events = bus.subscribe();
        let handle = m.with_bus(bus).start(LogicFn::new(|state, tick| {
            if state == "Run" {
                if let Some(mut next) = tick.when(true) {
                    next.become_state("Done");
                }
            } else {
                tick.complete();
                // Dropped: completion wins over queued dispatches.
                let _ = tick.when(true);
            }
            Ok(())
        }));

        handle.refresh("go").await.unwrap();
        let snap = handle.snapshot();
        assert_eq!(snap.current, "Done");
        assert_eq!(snap.ticks, 2);

        assert_eq!(
            handle.refresh("late").await,
            Err(ScriptError::MachineStopped {
                machine: "temp".into()
            })
        );
        handle.join().await.unwrap();

        let mut kinds = Vec::new();
        while let Ok(ev) = events.try_recv() {
            kinds.push(ev.kind);
        }
        assert!(kinds.contains(&EventKind::MachineCompleted));
        assert!(kinds.ends_with(&[EventKind::MachineStopped]));
    }

    #[tokio::test]
    async fn logic_error_fails_refresh_but_machine_survives() {
        let (m, _) = machine("Arm");
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let handle = m.start(LogicFn::new(move |_, _| {
            if c.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(ScriptError::fail("interlock open"))
            } else {
                Ok(())
            }
        }));

        assert_eq!(
            handle.refresh("a").await,
            Err(ScriptError::fail("interlock open"))
        );
        handle.refresh("b").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        handle.stop();
    }

    #[tokio::test]
    async fn stopped_machine_rejects_refresh() {
        let (m, _) = machine("Idle");
        let handle = m.start(LogicFn::new(|_, _| Ok(())));

        handle.stop();
        let err = handle.refresh("late").await.unwrap_err();
        assert_eq!(
            err,
            ScriptError::MachineStopped {
                machine: "temp".into()
            }
        );
        handle.join().await.unwrap();
    }

    struct Delayed;

    #[async_trait]
    impl Logic for Delayed {
        async fn logic(&mut self, state: &str, tick: &mut Tick<'_>) -> Result<(), ScriptError> {
            if state == "Wait" {
                if let Some(mut next) = tick.when_after(Duration::from_secs(1)).await {
                    next.become_state("Done");
                }
            }
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn when_after_delays_the_transition() {
        let (m, _) = machine("Wait");
        let handle = m.start(Delayed);
        let started = Instant::now();

        handle.refresh("go").await.unwrap();

        assert!(started.elapsed() >= Duration::from_secs(1));
        let snap = handle.snapshot();
        assert_eq!(snap.current, "Done");
        assert_eq!(snap.ticks, 2);
        handle.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn stop_interrupts_when_after() {
        let (m, _) = machine("Wait");
        let handle = m.start(Delayed);
        let mut watch = handle.watch();

        handle.trigger("go").unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.stop();

        watch.changed().await.unwrap();
        assert_eq!(watch.borrow().current, "Wait");
        handle.join().await.unwrap();
    }

    /// Records every dispatch and whether one started while another was running.
    struct Sequencer {
        busy: Arc<AtomicBool>,
        overlapped: Arc<AtomicBool>,
        seen: Arc<Mutex<Vec<(String, Option<String>)>>>,
    }

    #[async_trait]
    impl Logic for Sequencer {
        async fn logic(&mut self, state: &str, tick: &mut Tick<'_>) -> Result<(), ScriptError> {
            if self.busy.swap(true, Ordering::SeqCst) {
                self.overlapped.store(true, Ordering::SeqCst);
            }
            self.seen.lock().unwrap().push((
                state.to_string(),
                tick.previous_state().map(str::to_string),
            ));
            match state {
                "Idle" => {
                    if let Some(mut next) = tick.when_after(Duration::from_millis(100)).await {
                        next.become_state("Busy");
                    }
                }
                "Busy" => {
                    tokio::time::sleep(Duration::from_millis(30)).await;
                    tick.become_state("Done");
                }
                _ => tokio::time::sleep(Duration::from_millis(10)).await,
            }
            self.busy.store(false, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_refreshes_are_serialized() {
        let (m, channel) = machine("Idle");
        let temp = m.var::<i64>("tcs.temp");
        let overlapped = Arc::new(AtomicBool::new(false));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handle = m.start(Sequencer {
            busy: Arc::new(AtomicBool::new(false)),
            overlapped: overlapped.clone(),
            seen: seen.clone(),
        });
        let monitor = temp.pv_monitor().await.unwrap();

        handle.trigger("first").unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        // Both arrive while the first refresh is parked in `when_after`.
        channel
            .publish(Sample::encode("tcs.temp", &41_i64).unwrap())
            .await
            .unwrap();
        handle.trigger("second").unwrap();

        let mut watch = handle.watch();
        watch.wait_for(|s| s.ticks == 4).await.unwrap();

        assert!(!overlapped.load(Ordering::SeqCst));
        let prev = |s: &str| Some(s.to_string());
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                ("Idle".to_string(), prev("Idle")),
                ("Busy".to_string(), prev("Idle")),
                ("Done".to_string(), prev("Done")),
                ("Done".to_string(), prev("Done")),
            ]
        );
        assert_eq!(temp.get(), Some(41));

        monitor.cancel();
        monitor.join().await.unwrap();
        handle.stop();
    }

    #[tokio::test]
    async fn pv_get_caches_value_then_refreshes() {
        let (m, channel) = machine("Idle");
        let temp = m.var::<i64>("tcs.temp");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (s, t) = (seen.clone(), temp.clone());
        let handle = m.start(LogicFn::new(move |_, _| {
            s.lock().unwrap().push(t.get());
            Ok(())
        }));

        channel
            .publish(Sample::encode("tcs.temp", &7_i64).unwrap())
            .await
            .unwrap();
        assert_eq!(temp.pv_get().await.unwrap(), 7);

        let mut watch = handle.watch();
        watch.wait_for(|s| s.ticks == 1).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![Some(7)]);
        handle.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn pv_get_honors_timeout() {
        let channel = InMemoryChannel::new();
        let cfg = Config {
            get_timeout: Duration::from_millis(200),
            ..Config::default()
        };
        let m = Machine::new("temp", "Idle", Arc::new(channel), &cfg);
        let temp = m.var::<i64>("never.published");

        assert_eq!(
            temp.pv_get().await,
            Err(ScriptError::Timeout {
                timeout: Duration::from_millis(200)
            })
        );
    }

    #[tokio::test]
    async fn pv_monitor_drives_ticks() {
        let (m, channel) = machine("Idle");
        let temp = m.var::<i64>("tcs.temp");
        let handle = m.start(LogicFn::new(|_, _| Ok(())));

        let monitor = temp.pv_monitor().await.unwrap();
        for v in [10_i64, 20, 30] {
            channel
                .publish(Sample::encode("tcs.temp", &v).unwrap())
                .await
                .unwrap();
            tokio::task::yield_now().await;
        }

        let mut watch = handle.watch();
        watch.wait_for(|s| s.ticks >= 3).await.unwrap();
        assert_eq!(temp.get(), Some(30));

        monitor.cancel();
        monitor.join().await.unwrap();
        handle.stop();
    }

    #[tokio::test]
    async fn monitor_skips_values_that_do_not_decode() {
        let (m, channel) = machine("Idle");
        let bus = Bus::new(64);
        let mut events = bus.subscribe();
        let m = m.with_bus(bus);
        let temp = m.var::<i64>("tcs.temp");
        let handle = m.start(LogicFn::new(|_, _| Ok(())));

        let monitor = temp.pv_monitor().await.unwrap();
        channel
            .publish(Sample::new("tcs.temp", serde_json::json!("hot")))
            .await
            .unwrap();

        loop {
            let ev = events.recv().await.unwrap();
            if ev.kind == EventKind::VarRejected {
                assert_eq!(ev.source.as_deref(), Some("tcs.temp"));
                break;
            }
        }
        assert_eq!(temp.get(), None);
        assert!(!monitor.is_finished());
        handle.stop();
    }

    #[tokio::test]
    async fn full_mailbox_drops_refresh_requests() {
        let channel = InMemoryChannel::new();
        let cfg = Config {
            mailbox_capacity: 1,
            ..Config::default()
        };
        let bus = Bus::new(64);
        let mut events = bus.subscribe();
        let m = Machine::new("temp", "Idle", Arc::new(channel.clone()), &cfg).with_bus(bus);
        let temp = m.var::<i64>("tcs.temp");

        channel
            .publish(Sample::encode("tcs.temp", &1_i64).unwrap())
            .await
            .unwrap();
        temp.pv_get().await.unwrap();
        temp.pv_get().await.unwrap();

        loop {
            let ev = events.recv().await.unwrap();
            if ev.kind == EventKind::MailboxOverflow {
                assert_eq!(ev.name.as_deref(), Some("temp"));
                break;
            }
        }
    }

    #[tokio::test]
    async fn var_put_and_display() {
        let (m, channel) = machine("Idle");
        let temp = m.var::<i64>("tcs.temp");

        assert_eq!(temp.to_string(), "<unset>");
        temp.pv_put().await.unwrap();
        assert!(channel.latest("tcs.temp").is_none());

        temp.set(12);
        temp.pv_put().await.unwrap();
        assert_eq!(temp.to_string(), "12");
        assert_eq!(
            channel.latest("tcs.temp").unwrap().decode::<i64>().unwrap(),
            12
        );
    }

    struct BrokenFeed;

    #[async_trait]
    impl Channel for BrokenFeed {
        async fn publish(&self, _sample: Sample) -> Result<(), ScriptError> {
            Ok(())
        }

        async fn subscribe(&self, _key: &str) -> Result<SampleStream, ScriptError> {
            let stream = futures::stream::poll_fn(|_| -> Poll<Option<Sample>> {
                panic!("feed lost")
            });
            Ok(stream.boxed())
        }
    }

    #[tokio::test]
    async fn monitor_join_surfaces_a_panicking_feed() {
        let m = Machine::new("temp", "Idle", Arc::new(BrokenFeed), &Config::default());
        let temp = m.var::<i64>("tcs.temp");

        let monitor = temp.pv_monitor().await.unwrap();
        assert_eq!(
            monitor.join().await,
            Err(ScriptError::Panicked {
                task: "tcs.temp".into(),
                reason: "feed lost".into()
            })
        );
    }
}
