//! # Example: loops
//!
//! Paced loops and fan-out.
//!
//! ## Flow
//! ```text
//! par([expose(1), expose(2), expose(3)])        ─► ~100ms, not 300ms
//! poll_loop(50ms)   { count; stop_when(n == 5) } ─► ~250ms
//! bg_loop(300ms)    { count; stop_when(n == 3) } ─► runs while main continues
//! wait_for(ready)                                ─► returns once a timer flips `ready`
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example loops
//! ```

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use seqflow::{stop_when, Config, InMemoryChannel, Script, ScriptError};
use tokio::time::Instant;

async fn expose(detector: u32) -> Result<u32, ScriptError> {
    tokio::time::sleep(Duration::from_millis(100)).await;
    Ok(detector * 1000)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let script = Script::new(Config::default(), Arc::new(InMemoryChannel::new()), Vec::new());

    // 1. Fan-out
    let started = Instant::now();
    let frames = script.par((1..=3).map(expose)).await?;
    println!("[par] {frames:?} in {:?}", started.elapsed());

    // 2. Foreground loop at the default interval
    let counter = Arc::new(AtomicU32::new(0));
    let c = counter.clone();
    let started = Instant::now();
    script
        .poll_loop(move || {
            let c = c.clone();
            async move { stop_when(c.fetch_add(1, Ordering::SeqCst) + 1 == 5) }
        })
        .await?;
    println!("[loop] 5 iterations in {:?}", started.elapsed());

    // 3. Background loop
    let slow = Arc::new(AtomicU32::new(0));
    let s = slow.clone();
    let handle = script.bg_loop("slow", Duration::from_millis(300), move || {
        let s = s.clone();
        async move { stop_when(s.fetch_add(1, Ordering::SeqCst) + 1 == 3) }
    });
    println!("[bg_loop] running, count = {}", slow.load(Ordering::SeqCst));
    handle.join().await?;
    println!("[bg_loop] finished, count = {}", slow.load(Ordering::SeqCst));

    // 4. Wait for a condition flipped elsewhere
    let ready = Arc::new(AtomicBool::new(false));
    let r = ready.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        r.store(true, Ordering::SeqCst);
    });
    let started = Instant::now();
    script
        .wait_for(move || {
            let ready = ready.clone();
            async move { Ok(ready.load(Ordering::SeqCst)) }
        })
        .await?;
    println!("[wait_for] ready after {:?}", started.elapsed());

    script.shutdown().await?;
    Ok(())
}
