//! # Tracker of background work owned by a script.
//!
//! Every background loop and machine actor is spawned through
//! [`AliveTracker::spawn`], which registers its name for the lifetime of the
//! task. Shutdown waits on the underlying [`TaskTracker`] and reports whatever
//! is still registered as stuck.
//!
//! ```text
//! spawn(name, fut) ──► alive[id] = name ──► fut.await ──► drop(Registration) ──► alive.remove(id)
//!
//! wait(grace) ──► tracker.close() ──► timeout(grace, tracker.wait())
//!                                        ├─ done    ──► Ok(())
//!                                        └─ elapsed ──► Err(snapshot())
//! ```
//!
//! ## Rules
//! - Names need not be unique; entries are keyed by a private id.
//! - An aborted task deregisters too (the guard drops with the future).
//! - [`snapshot`](AliveTracker::snapshot) is sorted.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;

type Names = Arc<Mutex<BTreeMap<u64, Arc<str>>>>;

#[derive(Clone, Default)]
pub(crate) struct AliveTracker {
    tracker: TaskTracker,
    alive: Names,
    next_id: Arc<AtomicU64>,
}

/// Removes its entry when the tracked future completes or is dropped.
struct Registration {
    alive: Names,
    id: u64,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.alive
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

impl AliveTracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Spawns `fut` on the runtime and tracks it under `name`.
    pub(crate) fn spawn<F>(&self, name: Arc<str>, fut: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.alive
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, name);

        let registration = Registration {
            alive: Arc::clone(&self.alive),
            id,
        };
        self.tracker.spawn(async move {
            let _registration = registration;
            fut.await
        })
    }

    /// Sorted names of tracked tasks that have not finished yet.
    pub(crate) fn snapshot(&self) -> Vec<String> {
        let alive = self.alive.lock().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = alive.values().map(|n| n.to_string()).collect();
        names.sort_unstable();
        names
    }

    /// Waits up to `grace` for every tracked task; returns the stuck names on overrun.
    pub(crate) async fn wait(&self, grace: Duration) -> Result<(), Vec<String>> {
        self.tracker.close();
        match tokio::time::timeout(grace, self.tracker.wait()).await {
            Ok(()) => Ok(()),
            Err(_elapsed) => Err(self.snapshot()),
        }
    }
}
