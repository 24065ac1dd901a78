//! # LogWriter: one line per runtime event
//!
//! A minimal subscriber that prints events to stdout. Intended for demos and
//! for watching a script from a terminal.
//!
//! ## Example output
//! ```text
//! [attempt] handler="move-filter" attempt=1
//! [failed] handler="move-filter" attempt=1 err="execution failed: stalled"
//! [retry] handler="move-filter" delay_ms=200 after_attempt=1
//! [tick] machine="temp" prev="Init" state="Ok" source="when"
//! [var] machine="temp" key="esw.epic.temp"
//! [loop-stopped] loop="poll" iterations=5
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event printer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn s(v: &Option<std::sync::Arc<str>>) -> &str {
    v.as_deref().unwrap_or("-")
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let name = s(&e.name);
        match e.kind {
            EventKind::HandlerStarting => {
                println!("[attempt] handler={name:?} attempt={:?}", e.attempt);
            }
            EventKind::HandlerFailed => println!(
                "[failed] handler={name:?} attempt={:?} err={:?}",
                e.attempt,
                s(&e.reason)
            ),
            EventKind::RetryScheduled => println!(
                "[retry] handler={name:?} delay_ms={:?} after_attempt={:?}",
                e.delay_ms, e.attempt
            ),
            EventKind::HandlerSucceeded => {
                println!("[succeeded] handler={name:?} attempt={:?}", e.attempt);
            }
            EventKind::HandlerExhausted => println!(
                "[exhausted] handler={name:?} attempts={:?} err={:?}",
                e.attempt,
                s(&e.reason)
            ),
            EventKind::CommandCompleted => {
                println!("[completed] command={name:?} id={:?}", s(&e.source));
            }
            EventKind::CommandFailed => println!(
                "[command-failed] command={name:?} id={:?} err={:?}",
                s(&e.source),
                s(&e.reason)
            ),
            EventKind::ParFailed => println!("[par-failed] {name} err={:?}", s(&e.reason)),
            EventKind::LoopStopped => {
                println!("[loop-stopped] loop={name:?} iterations={:?}", e.attempt);
            }
            EventKind::LoopFailed => println!(
                "[loop-failed] loop={name:?} iterations={:?} err={:?}",
                e.attempt,
                s(&e.reason)
            ),
            EventKind::LoopCanceled => {
                println!("[loop-canceled] loop={name:?} iterations={:?}", e.attempt);
            }
            EventKind::MachineTick => println!(
                "[tick] machine={name:?} prev={:?} state={:?} source={:?}",
                s(&e.previous),
                s(&e.state),
                s(&e.source)
            ),
            EventKind::MachineFailed => println!(
                "[machine-failed] machine={name:?} state={:?} err={:?}",
                s(&e.state),
                s(&e.reason)
            ),
            EventKind::MachineCompleted => {
                println!("[machine-completed] machine={name:?} state={:?}", s(&e.state));
            }
            EventKind::MachineStopped => {
                println!("[machine-stopped] machine={name:?} state={:?}", s(&e.state));
            }
            EventKind::MailboxOverflow => {
                println!("[mailbox-full] machine={name:?} source={:?}", s(&e.source));
            }
            EventKind::VarUpdated => println!("[var] machine={name:?} key={:?}", s(&e.source)),
            EventKind::VarRejected => println!(
                "[var-rejected] machine={name:?} key={:?} err={:?}",
                s(&e.source),
                s(&e.reason)
            ),
            EventKind::ShutdownRequested => println!("[shutdown-requested]"),
            EventKind::AllStoppedWithin => println!("[all-stopped-within-grace]"),
            EventKind::GraceExceeded => println!("[grace-exceeded] stuck={:?}", s(&e.reason)),
            EventKind::SubscriberOverflow => println!(
                "[subscriber-overflow] subscriber={name:?} reason={:?}",
                s(&e.reason)
            ),
            EventKind::SubscriberPanicked => println!(
                "[subscriber-panicked] subscriber={name} info={}",
                s(&e.reason)
            ),
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
