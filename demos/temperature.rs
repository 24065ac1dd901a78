//! # Example: temperature
//!
//! Two state machines watching a temperature key on an in-memory channel.
//!
//! - `temp-get` walks `Init → Ok → High → Ok` inside a single refresh, because
//!   every satisfied `when` chains one more dispatch.
//! - `temp-monitor` subscribes to the key on entry to `Init` and is then ticked
//!   by every value a background loop publishes.
//!
//! ## Flow
//! ```text
//! bg_loop(200ms) ── set(random) + pv_put ──► Channel["esw.epic.temp"]
//!                                                  │ pv_monitor
//!                                                  ▼
//!                                  temp-monitor: refresh("esw.epic.temp")
//!                                     Ok   ── temp > 40 ──► High
//!                                     High ── temp < 30 ──► Ok
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example temperature --features logging
//! ```

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use seqflow::{stop_when, Config, InMemoryChannel, Logic, Script, ScriptError, Tick, Var};

const TEMP_KEY: &str = "esw.epic.temp";

/// Walks the whole transition chain from one refresh.
struct TempGet {
    temp: Var<i64>,
}

#[async_trait]
impl Logic for TempGet {
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
        println!("[{}] {state} temp = {}", tick.machine(), self.temp);
        Ok(())
    }
}

/// Ticked by channel values once its monitor is up.
struct TempMonitor {
    temp: Var<i64>,
}

#[async_trait]
impl Logic for TempMonitor {
    async fn logic(&mut self, state: &str, tick: &mut Tick<'_>) -> Result<(), ScriptError> {
        let temp = self.temp.get().unwrap_or_default();
        match state {
            "Init" => {
                if tick.entry() {
                    // Detached: runs until the machine stops.
                    let monitor = self.temp.pv_monitor().await?;
                    println!("[{}] monitoring {}", tick.machine(), monitor.key());
                }
                if let Some(mut next) = tick.when_after(Duration::from_millis(500)).await {
                    next.become_state("Ok");
                }
            }
            "Ok" => {
                if let Some(mut next) = tick.when(temp > 40) {
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
        println!(
            "[{}] {state} (previous {:?}) temp = {}",
            tick.machine(),
            tick.previous_state(),
            self.temp
        );
        Ok(())
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(feature = "logging")]
    let subs: Vec<Arc<dyn seqflow::Subscribe>> = vec![Arc::new(seqflow::LogWriter::new())];
    #[cfg(not(feature = "logging"))]
    let subs: Vec<Arc<dyn seqflow::Subscribe>> = Vec::new();

    let channel = InMemoryChannel::new();
    let script = Script::new(Config::default(), Arc::new(channel.clone()), subs);

    println!("============= temp-get =============");
    let machine = script.machine("temp-get", "Init");
    let temp = machine.var_with(TEMP_KEY, 0_i64);
    let temp_get = machine.start(TempGet { temp });
    temp_get.refresh("Init").await?;
    println!("[main] temp-get settled: {:?}", temp_get.snapshot());

    println!("============= temp-monitor =============");
    let machine = script.machine("temp-monitor", "Init");
    let temp = machine.var_with(TEMP_KEY, 0_i64);
    let temp_monitor = machine.start(TempMonitor { temp: temp.clone() });
    temp_monitor.refresh("Init").await?;

    let published = Arc::new(AtomicU32::new(0));
    let p = published.clone();
    let producer = script.bg_loop("producer", Duration::from_millis(200), move || {
        let temp = temp.clone();
        let p = p.clone();
        async move {
            temp.set(rand::random_range(20..=60));
            temp.pv_put().await?;
            stop_when(p.fetch_add(1, Ordering::SeqCst) + 1 == 10)
        }
    });
    producer.join().await?;

    println!("[main] temp-monitor: {:?}", temp_monitor.snapshot());
    println!("[main] last published: {:?}", channel.latest(TEMP_KEY));

    script.shutdown().await?;
    Ok(())
}
