//! # Poll loops with a minimum iteration interval.
//!
//! A loop repeatedly runs an async body until the body raises the stop signal
//! ([`stop_when`]), returns a genuine error, or the loop is cancelled.
//!
//! ```text
//! loop {
//!     token cancelled? ──► LoopCanceled ──► Err(Canceled)
//!     join!(body(), sleep(interval))        // iteration lasts max(body, interval)
//!        ├─ Ok(())                ──► next iteration
//!        ├─ Err(LoopExit::Stop)   ──► LoopStopped ──► Ok(())
//!        └─ Err(LoopExit::Failed) ──► LoopFailed  ──► Err(e)
//! }
//! ```
//!
//! ## Rules
//! - The interval is floored at [`DEFAULT_LOOP_INTERVAL`]; shorter requests are raised to it.
//! - The iteration that stops still waits out its interval, so `n` iterations at
//!   50ms take at least `n * 50ms`.
//! - Statements after a satisfied `stop_when(...)?` do not run.
//! - Cancellation is observed between iterations only.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::DEFAULT_LOOP_INTERVAL;
use crate::core::AliveTracker;
use crate::error::{panic_reason, ScriptError};
use crate::events::{emit, Bus, Event, EventKind};

/// Why a loop body ended an iteration early.
///
/// The stop signal travels through the `Err` side so that `?` can short-circuit
/// the body, but it is not an error: the loop itself returns `Ok(())` on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopExit {
    /// The loop's termination condition was met.
    Stop,
    /// The body failed; the loop ends with this error.
    Failed(ScriptError),
}

impl From<ScriptError> for LoopExit {
    fn from(err: ScriptError) -> Self {
        LoopExit::Failed(err)
    }
}

/// Result type of one loop iteration.
pub type LoopResult = Result<(), LoopExit>;

/// Returns the stop signal when `condition` holds.
///
/// Use it with `?` anywhere in a loop body, any number of times.
///
/// ```rust
/// use seqflow::{poll_loop, stop_when};
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let exposures = Arc::new(AtomicU32::new(0));
/// let e = exposures.clone();
/// poll_loop(move || {
///     let e = e.clone();
///     async move {
///         let n = e.fetch_add(1, Ordering::SeqCst) + 1;
///         stop_when(n == 3)
///     }
/// })
/// .await
/// .unwrap();
/// assert_eq!(exposures.load(Ordering::SeqCst), 3);
/// # }
/// ```
#[inline]
pub fn stop_when(condition: bool) -> LoopResult {
    if condition {
        Err(LoopExit::Stop)
    } else {
        Ok(())
    }
}

/// Runs `body` every 50ms until it stops or fails.
pub async fn poll_loop<F, Fut>(body: F) -> Result<(), ScriptError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = LoopResult>,
{
    PollLoop::new("loop", DEFAULT_LOOP_INTERVAL).run(body).await
}

/// Runs `body` at most once per `min_interval` (never faster than 50ms).
pub async fn poll_loop_with_interval<F, Fut>(
    min_interval: Duration,
    body: F,
) -> Result<(), ScriptError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = LoopResult>,
{
    PollLoop::new("loop", min_interval).run(body).await
}

/// Starts a poll loop on the runtime and returns immediately.
///
/// The returned [`LoopHandle`] cancels or awaits the loop. Dropping the handle
/// detaches the loop; it keeps running until it stops on its own.
pub fn bg_loop<F, Fut>(min_interval: Duration, body: F) -> LoopHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = LoopResult> + Send + 'static,
{
    PollLoop::new("bg_loop", min_interval).spawn(body, None)
}

/// Polls `condition` every 50ms and returns once it yields `true`.
///
/// An error from `condition` ends the wait with that error.
pub async fn wait_for<F, Fut>(mut condition: F) -> Result<(), ScriptError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, ScriptError>>,
{
    poll_loop(move || {
        let ready = condition();
        async move { stop_when(ready.await?) }
    })
    .await
}

/// Handle to a loop running in the background.
pub struct LoopHandle {
    name: Arc<str>,
    token: CancellationToken,
    join: JoinHandle<Result<(), ScriptError>>,
}

impl LoopHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Requests cancellation; the loop exits before its next iteration.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Waits for the loop to end and returns how it ended.
    ///
    /// A panicking body yields [`ScriptError::Panicked`] with the loop's name.
    pub async fn join(self) -> Result<(), ScriptError> {
        match self.join.await {
            Ok(res) => res,
            Err(err) if err.is_panic() => Err(ScriptError::Panicked {
                task: self.name.to_string(),
                reason: panic_reason(err.into_panic().as_ref()),
            }),
            Err(_) => Err(ScriptError::Canceled),
        }
    }
}

/// Configured loop, ready to run in place or be spawned.
pub(crate) struct PollLoop {
    name: Arc<str>,
    interval: Duration,
    token: CancellationToken,
    bus: Option<Bus>,
}

impl PollLoop {
    pub(crate) fn new(name: impl Into<Arc<str>>, min_interval: Duration) -> Self {
        Self {
            name: name.into(),
            interval: min_interval.max(DEFAULT_LOOP_INTERVAL),
            token: CancellationToken::new(),
            bus: None,
        }
    }

    pub(crate) fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub(crate) fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub(crate) async fn run<F, Fut>(self, mut body: F) -> Result<(), ScriptError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = LoopResult>,
    {
        let mut iterations: u32 = 0;
        loop {
            if self.token.is_cancelled() {
                emit(self.bus.as_ref(), || {
                    Event::new(EventKind::LoopCanceled)
                        .with_name(Arc::clone(&self.name))
                        .with_attempt(iterations)
                });
                return Err(ScriptError::Canceled);
            }

            iterations = iterations.saturating_add(1);
            let (res, ()) = tokio::join!(body(), tokio::time::sleep(self.interval));

            match res {
                Ok(()) => {}
                Err(LoopExit::Stop) => {
                    emit(self.bus.as_ref(), || {
                        Event::new(EventKind::LoopStopped)
                            .with_name(Arc::clone(&self.name))
                            .with_attempt(iterations)
                    });
                    return Ok(());
                }
                Err(LoopExit::Failed(err)) => {
                    emit(self.bus.as_ref(), || {
                        Event::new(EventKind::LoopFailed)
                            .with_name(Arc::clone(&self.name))
                            .with_attempt(iterations)
                            .with_reason(err.to_string())
                    });
                    return Err(err);
                }
            }
        }
    }

    /// Spawns the loop, tracked by `tracker` when one is given.
    pub(crate) fn spawn<F, Fut>(self, body: F, tracker: Option<&AliveTracker>) -> LoopHandle
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = LoopResult> + Send + 'static,
    {
        let name = Arc::clone(&self.name);
        let token = self.token.clone();
        let fut = self.run(body);
        let join = match tracker {
            Some(tracker) => tracker.spawn(Arc::clone(&name), fut),
            None => tokio::spawn(fut),
        };
        LoopHandle { name, token, join }
    }
}
