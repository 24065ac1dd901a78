//! # Example: retry_handler
//!
//! Demonstrates how a [`CommandHandler`] retries a flaky operation within its
//! budget, reporting every failed attempt to the `on_error` observer, and how
//! [`Handlers`] dispatches commands by name and reports outcomes.
//!
//! ## Flow
//! ```text
//! execute(filter)
//!   ├─► attempt 1 → Err("wheel stuck #1") ─► on_error ─► RetryScheduled{100ms}
//!   ├─► attempt 2 → Err("wheel stuck #2") ─► on_error ─► RetryScheduled{≈200ms}
//!   └─► attempt 3 → Ok(position)
//!
//! dispatch("c-1", "exposure", ..) ─► Completed
//! dispatch("c-2", "exposure", ..) ─► Failed(Fatal)   (no retries spent)
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example retry_handler --features logging
//! ```

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use seqflow::{
    BackoffPolicy, CommandOutcome, Config, InMemoryChannel, JitterPolicy, OutcomeSink, Script,
    ScriptError,
};

static ATTEMPTS: AtomicU32 = AtomicU32::new(0);

/// Prints outcomes instead of sending them to a command-response service.
struct PrintSink;

#[async_trait]
impl OutcomeSink for PrintSink {
    async fn report(&self, id: &str, outcome: CommandOutcome) {
        println!("[sink] {id}: {outcome:?}");
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Configure backoff between retries (exponential, equal jitter)
    let cfg = Config {
        backoff: BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(1),
            factor: 2.0,
            jitter: JitterPolicy::Equal,
        },
        ..Config::default()
    };

    #[cfg(feature = "logging")]
    let subs: Vec<Arc<dyn seqflow::Subscribe>> = vec![Arc::new(seqflow::LogWriter::new())];
    #[cfg(not(feature = "logging"))]
    let subs: Vec<Arc<dyn seqflow::Subscribe>> = Vec::new();

    let script = Script::new(cfg, Arc::new(InMemoryChannel::new()), subs);

    // 2. A filter wheel that jams twice before moving
    let mut move_filter = script.handler("move_filter", |filter: String| async move {
        let attempt = ATTEMPTS.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= 2 {
            return Err(ScriptError::fail(format!("wheel stuck #{attempt}")));
        }
        Ok(format!("{filter} in beam"))
    });
    move_filter.retry(2)?.on_error(|err| async move {
        println!("[on_error] {}", err.as_message());
    })?;

    let position = move_filter.execute("H-band".to_string()).await?;
    println!("[main] {position} after {:?}", move_filter.last_execution());

    // 3. Named commands with outcome reporting
    let mut handlers = script.handlers::<u64>();
    handlers.on_command("exposure", |ms: u64| async move {
        if ms == 0 {
            return Err(ScriptError::fatal("exposure time must be positive"));
        }
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok(())
    })?;

    handlers.dispatch("c-1", "exposure", 50, &PrintSink).await?;
    handlers.dispatch("c-2", "exposure", 0, &PrintSink).await?;

    script.shutdown().await?;
    println!("[main] done.");
    Ok(())
}
