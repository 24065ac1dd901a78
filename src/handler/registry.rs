//! # Handlers: command-name registry and outcome reporting.
//!
//! A script registers one [`CommandHandler`] per command name, then the host
//! dispatches inbound commands by name. Completion or failure is reported
//! through the external [`OutcomeSink`] contract (the host's command-response
//! service); the handlers themselves never report.
//!
//! ```text
//! dispatch(id, "move", cmd, sink)
//!    ├─ unknown name ──► Err(UnknownCommand)        (nothing reported)
//!    └─ handler.execute(cmd)
//!          ├─ Ok  ──► sink.report(id, Completed)
//!          └─ Err ──► sink.report(id, Failed(err))
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{RuntimeError, ScriptError};
use crate::events::{emit, Bus, Event, EventKind};
use crate::handler::command::CommandHandler;
use crate::policies::BackoffPolicy;

/// Final outcome of one dispatched command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandOutcome {
    Completed,
    Failed(ScriptError),
}

/// External sink for command completion notifications.
#[async_trait]
pub trait OutcomeSink: Send + Sync {
    async fn report(&self, id: &str, outcome: CommandOutcome);
}

/// Named command handlers for one input type.
pub struct Handlers<I> {
    handlers: HashMap<String, CommandHandler<I, ()>>,
    backoff: BackoffPolicy,
    bus: Option<Bus>,
}

impl<I> Default for Handlers<I> {
    fn default() -> Self {
        Self {
            handlers: HashMap::new(),
            backoff: BackoffPolicy::default(),
            bus: None,
        }
    }
}

impl<I> Handlers<I>
where
    I: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn wired(backoff: BackoffPolicy, bus: Bus) -> Self {
        Self {
            handlers: HashMap::new(),
            backoff,
            bus: Some(bus),
        }
    }

    /// Registers the handler for `command` and returns it for configuration.
    pub fn on_command<F, Fut>(
        &mut self,
        command: impl Into<String>,
        op: F,
    ) -> Result<&mut CommandHandler<I, ()>, RuntimeError>
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ScriptError>> + Send + 'static,
    {
        let command = command.into();
        if self.handlers.contains_key(&command) {
            return Err(RuntimeError::DuplicateHandler { command });
        }

        let mut handler = CommandHandler::new(Arc::<str>::from(command.as_str()), op)
            .with_backoff(self.backoff);
        if let Some(bus) = &self.bus {
            handler = handler.with_bus(bus.clone());
        }
        Ok(self.handlers.entry(command).or_insert(handler))
    }

    pub fn get(&self, command: &str) -> Option<&CommandHandler<I, ()>> {
        self.handlers.get(command)
    }

    pub fn contains(&self, command: &str) -> bool {
        self.handlers.contains_key(command)
    }

    /// Executes the handler for `command` and reports its outcome under `id`.
    ///
    /// Handler failures are reported, not returned; only an unknown command
    /// name is an error.
    pub async fn dispatch(
        &self,
        id: &str,
        command: &str,
        input: I,
        sink: &dyn OutcomeSink,
    ) -> Result<(), RuntimeError> {
        let handler = self
            .handlers
            .get(command)
            .ok_or_else(|| RuntimeError::UnknownCommand {
                command: command.to_string(),
            })?;

        let outcome = match handler.execute(input).await {
            Ok(()) => {
                emit(self.bus.as_ref(), || {
                    Event::new(EventKind::CommandCompleted)
                        .with_name(command)
                        .with_source(id)
                });
                CommandOutcome::Completed
            }
            Err(err) => {
                emit(self.bus.as_ref(), || {
                    Event::new(EventKind::CommandFailed)
                        .with_name(command)
                        .with_source(id)
                        .with_reason(err.to_string())
                });
                CommandOutcome::Failed(err)
            }
        };
        sink.report(id, outcome).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        outcomes: Mutex<Vec<(String, CommandOutcome)>>,
    }

    #[async_trait]
    impl OutcomeSink for Recorder {
        async fn report(&self, id: &str, outcome: CommandOutcome) {
            self.outcomes.lock().unwrap().push((id.to_string(), outcome));
        }
    }

    #[tokio::test]
    async fn dispatch_reports_completion_and_failure() {
        let mut handlers: Handlers<u32> = Handlers::new();
        handlers.on_command("even", |n: u32| async move {
            if n % 2 == 0 {
                Ok(())
            } else {
                Err(ScriptError::fail(format!("{n} is odd")))
            }
        })
        .unwrap();

        let sink = Recorder::default();
        handlers.dispatch("c-1", "even", 4, &sink).await.unwrap();
        handlers.dispatch("c-2", "even", 3, &sink).await.unwrap();

        let outcomes = sink.outcomes.lock().unwrap().clone();
        assert_eq!(
            outcomes,
            vec![
                ("c-1".to_string(), CommandOutcome::Completed),
                (
                    "c-2".to_string(),
                    CommandOutcome::Failed(ScriptError::fail("3 is odd"))
                ),
            ]
        );
    }

    #[tokio::test]
    async fn unknown_command_is_an_error_and_not_reported() {
        let handlers: Handlers<()> = Handlers::new();
        let sink = Recorder::default();

        let err = handlers.dispatch("c-9", "park", (), &sink).await.unwrap_err();
        assert_eq!(
            err,
            RuntimeError::UnknownCommand {
                command: "park".into()
            }
        );
        assert!(sink.outcomes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn registered_handler_keeps_its_retry_configuration() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let mut handlers: Handlers<()> = Handlers::new();
        handlers
            .on_command("home", move |_| {
                let c = c.clone();
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(ScriptError::fail("encoder glitch"))
                    } else {
                        Ok(())
                    }
                }
            })
            .unwrap()
            .retry(2)
            .unwrap();

        let sink = Recorder::default();
        handlers.dispatch("c-1", "home", (), &sink).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            sink.outcomes.lock().unwrap()[0].1,
            CommandOutcome::Completed
        );
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut handlers: Handlers<()> = Handlers::new();
        handlers.on_command("abort", |_| async { Ok(()) }).unwrap();
        let err = handlers
            .on_command("abort", |_| async { Ok(()) })
            .err()
            .unwrap();
        assert_eq!(err.as_label(), "runtime_duplicate_handler");
        assert!(handlers.contains("abort"));
    }
}
