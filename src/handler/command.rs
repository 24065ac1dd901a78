//! # CommandHandler: bounded-retry wrapper around one operation.
//!
//! A handler is registered once per command name and executed for every
//! inbound command. Each `execute` walks an [`ExecutionState`]:
//!
//! ```text
//! execute(input)
//!   attempt 1 ─► op(input) ─ Ok ──────────────────────────────► Success
//!                   │
//!                   └ Err ─► on_error(err) ─► retries left? ─ no ─► Failed (err returned)
//!                                                  │
//!                                                 yes ─► sleep(backoff.next(k)) ─► attempt k+2
//! ```
//!
//! ## Rules
//! - Attempts of one `execute` run **sequentially**.
//! - `on_error` runs once per failed attempt, including the last one.
//! - The caller only ever sees the final result or the **last** error.
//! - The retry budget is per `execute`; executions never drain each other's budget.
//! - `retry*` and `on_error` are configuration: once the first `execute` has
//!   started they fail with [`RuntimeError::HandlerStarted`].
//! - Fatal, canceled and panicked attempts ([`ScriptError::is_retryable`]) end the
//!   execution at once.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::error::{RuntimeError, ScriptError};
use crate::events::{emit, Bus, Event, EventKind};
use crate::handler::execution::ExecutionState;
use crate::policies::BackoffPolicy;

type Operation<I, O> = Arc<dyn Fn(I) -> BoxFuture<'static, Result<O, ScriptError>> + Send + Sync>;
type ErrorHook = Arc<dyn Fn(ScriptError) -> BoxFuture<'static, ()> + Send + Sync>;

/// Retrying wrapper around a fallible async operation.
///
/// # Example
/// ```rust
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use seqflow::{CommandHandler, ScriptError};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let calls = Arc::new(AtomicU32::new(0));
/// let c = calls.clone();
/// let mut handler = CommandHandler::new("open-shutter", move |angle: u32| {
///     let c = c.clone();
///     async move {
///         if c.fetch_add(1, Ordering::SeqCst) == 0 {
///             return Err(ScriptError::fail("drive not ready"));
///         }
///         Ok(angle * 2)
///     }
/// });
/// handler.retry(2)?;
///
/// assert_eq!(handler.execute(21).await?, 42);
/// assert_eq!(calls.load(Ordering::SeqCst), 2);
/// # Ok(())
/// # }
/// ```
pub struct CommandHandler<I, O> {
    name: Arc<str>,
    op: Operation<I, O>,
    retries: u32,
    backoff: BackoffPolicy,
    on_error: Option<ErrorHook>,
    started: AtomicBool,
    last: Mutex<ExecutionState>,
    bus: Option<Bus>,
}

impl<I, O> CommandHandler<I, O>
where
    I: Clone + Send + 'static,
    O: Send + 'static,
{
    /// Wraps `op`. No retries, no observer, retries happen immediately.
    pub fn new<F, Fut>(name: impl Into<Arc<str>>, op: F) -> Self
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, ScriptError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            op: Arc::new(move |input| op(input).boxed()),
            retries: 0,
            backoff: BackoffPolicy::default(),
            on_error: None,
            started: AtomicBool::new(false),
            last: Mutex::new(ExecutionState::Idle),
            bus: None,
        }
    }

    pub(crate) fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub(crate) fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    fn ensure_idle(&self) -> Result<(), RuntimeError> {
        if self.started.load(Ordering::Acquire) {
            return Err(RuntimeError::HandlerStarted {
                handler: self.name.to_string(),
            });
        }
        Ok(())
    }

    /// Allows `count` additional attempts after the first failure.
    pub fn retry(&mut self, count: u32) -> Result<&mut Self, RuntimeError> {
        self.ensure_idle()?;
        self.retries = count;
        Ok(self)
    }

    /// Like [`retry`](Self::retry), waiting `interval` before each retry.
    pub fn retry_with_interval(
        &mut self,
        count: u32,
        interval: Duration,
    ) -> Result<&mut Self, RuntimeError> {
        self.retry_with_backoff(count, BackoffPolicy::constant(interval))
    }

    /// Like [`retry`](Self::retry), with delays computed by `backoff`.
    pub fn retry_with_backoff(
        &mut self,
        count: u32,
        backoff: BackoffPolicy,
    ) -> Result<&mut Self, RuntimeError> {
        self.ensure_idle()?;
        self.retries = count;
        self.backoff = backoff;
        Ok(self)
    }

    /// Installs the observer invoked with every failed attempt's error.
    pub fn on_error<F, Fut>(&mut self, hook: F) -> Result<&mut Self, RuntimeError>
    where
        F: Fn(ScriptError) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.ensure_idle()?;
        self.on_error = Some(Arc::new(move |err| hook(err).boxed()));
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configured retry count.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Final (or current) state of the most recent execution.
    pub fn last_execution(&self) -> ExecutionState {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, state: ExecutionState) {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Runs the operation, retrying failed attempts within the budget.
    ///
    /// Resolves to the first successful output or to the last attempt's error.
    pub async fn execute(&self, input: I) -> Result<O, ScriptError> {
        self.started.store(true, Ordering::Release);

        let bus = self.bus.as_ref();
        let mut state = ExecutionState::Idle;
        state.begin();
        self.record(state);

        loop {
            let attempt = state.attempts();
            emit(bus, || {
                Event::new(EventKind::HandlerStarting)
                    .with_name(self.name.clone())
                    .with_attempt(attempt)
            });

            let err = match (self.op)(input.clone()).await {
                Ok(output) => {
                    state.succeed();
                    self.record(state);
                    emit(bus, || {
                        Event::new(EventKind::HandlerSucceeded)
                            .with_name(self.name.clone())
                            .with_attempt(attempt)
                    });
                    return Ok(output);
                }
                Err(err) => err,
            };

            emit(bus, || {
                Event::new(EventKind::HandlerFailed)
                    .with_name(self.name.clone())
                    .with_attempt(attempt)
                    .with_reason(err.to_string())
            });
            if let Some(hook) = &self.on_error {
                hook(err.clone()).await;
            }

            let retry_index = attempt - 1;
            if !err.is_retryable() || retry_index >= self.retries {
                state.give_up();
                self.record(state);
                emit(bus, || {
                    Event::new(EventKind::HandlerExhausted)
                        .with_name(self.name.clone())
                        .with_attempt(attempt)
                        .with_reason(err.to_string())
                });
                return Err(err);
            }

            let delay = self.backoff.next(retry_index);
            emit(bus, || {
                Event::new(EventKind::RetryScheduled)
                    .with_name(self.name.clone())
                    .with_attempt(attempt)
                    .with_delay(delay)
            });
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            state.retry();
            self.record(state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use tokio::time::Instant;

    /// Operation failing until it has been called `succeed_on` times (0 = never succeeds).
    fn flaky(
        calls: Arc<AtomicU32>,
        succeed_on: u32,
    ) -> impl Fn(u32) -> BoxFuture<'static, Result<u32, ScriptError>> + Send + Sync + 'static {
        move |input| {
            let calls = calls.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if succeed_on != 0 && n >= succeed_on {
                    Ok(input)
                } else {
                    Err(ScriptError::fail(format!("attempt {n}")))
                }
            }
            .boxed()
        }
    }

    fn counting_hook(
        errors: Arc<AtomicU32>,
    ) -> impl Fn(ScriptError) -> BoxFuture<'static, ()> + Send + Sync + 'static {
        move |_err| {
            let errors = errors.clone();
            async move {
                errors.fetch_add(1, Ordering::SeqCst);
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let errors = Arc::new(AtomicU32::new(0));
        let mut handler = CommandHandler::new("setup", flaky(calls.clone(), 2));
        handler
            .retry(2)
            .unwrap()
            .on_error(counting_hook(errors.clone()))
            .unwrap();

        assert_eq!(handler.execute(7).await, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert_eq!(
            handler.last_execution(),
            ExecutionState::Success { attempts: 2 }
        );
    }

    #[tokio::test]
    async fn permanent_failure_uses_whole_budget_and_returns_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let errors = Arc::new(AtomicU32::new(0));
        let mut handler = CommandHandler::new("setup", flaky(calls.clone(), 0));
        handler.retry(2).unwrap();
        handler.on_error(counting_hook(errors.clone())).unwrap();

        let err = handler.execute(1).await.unwrap_err();
        assert_eq!(err, ScriptError::fail("attempt 3"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(errors.load(Ordering::SeqCst), 3);
        assert_eq!(
            handler.last_execution(),
            ExecutionState::Failed { attempts: 3 }
        );
    }

    #[tokio::test]
    async fn without_retry_a_failure_propagates_after_one_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let errors = Arc::new(AtomicU32::new(0));
        let mut handler = CommandHandler::new("observe", flaky(calls.clone(), 0));
        handler.on_error(counting_hook(errors.clone())).unwrap();

        assert!(handler.execute(1).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn success_never_calls_the_observer() {
        let calls = Arc::new(AtomicU32::new(0));
        let errors = Arc::new(AtomicU32::new(0));
        let mut handler = CommandHandler::new("observe", flaky(calls.clone(), 1));
        handler.on_error(counting_hook(errors.clone())).unwrap();

        assert_eq!(handler.execute(5).await, Ok(5));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(errors.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn configuration_after_first_execute_is_rejected() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut handler = CommandHandler::new("late", flaky(calls, 1));
        handler.execute(1).await.unwrap();

        let err = handler.retry(3).err().unwrap();
        assert_eq!(err.as_label(), "runtime_handler_started");
        assert!(handler.on_error(|_e| async {}).is_err());
        assert_eq!(handler.retries(), 0);
    }

    #[tokio::test]
    async fn budget_is_per_execution() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut handler = CommandHandler::new("repeat", flaky(calls.clone(), 0));
        handler.retry(1).unwrap();

        assert!(handler.execute(1).await.is_err());
        assert!(handler.execute(1).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn fatal_errors_skip_remaining_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let mut handler = CommandHandler::new("fatal", move |_: ()| {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(ScriptError::fatal("limit switch"))
            }
        });
        handler.retry(5).unwrap();

        assert_eq!(
            handler.execute(()).await,
            Err(ScriptError::fatal("limit switch"))
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn channel_failures_spend_the_budget() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let mut handler = CommandHandler::new("read", move |_: ()| {
            let c = c.clone();
            async move {
                if c.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(ScriptError::ChannelClosed {
                        key: "tcs.temp".into(),
                    })
                } else {
                    Ok(20_i64)
                }
            }
        });
        handler.retry(2).unwrap();

        assert_eq!(handler.execute(()).await, Ok(20));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_interval_spaces_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut handler = CommandHandler::new("slow", flaky(calls.clone(), 3));
        handler
            .retry_with_interval(3, Duration::from_millis(200))
            .unwrap();

        let started = Instant::now();
        assert_eq!(handler.execute(9).await, Ok(9));
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(400), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(450), "{elapsed:?}");
    }

    #[tokio::test]
    async fn publishes_attempt_events() {
        let bus = Bus::new(32);
        let mut rx = bus.subscribe();
        let calls = Arc::new(AtomicU32::new(0));
        let mut handler = CommandHandler::new("evt", flaky(calls, 2)).with_bus(bus);
        handler.retry(1).unwrap();
        handler.execute(0).await.unwrap();

        let mut kinds = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            assert_eq!(ev.name.as_deref(), Some("evt"));
            kinds.push(ev.kind);
        }
        assert_eq!(
            kinds,
            vec![
                EventKind::HandlerStarting,
                EventKind::HandlerFailed,
                EventKind::RetryScheduled,
                EventKind::HandlerStarting,
                EventKind::HandlerSucceeded,
            ]
        );
    }
}
