//! # Fan-out/fan-in over independent operations.
//!
//! [`par`] spawns every future on the worker pool, waits for all of them and
//! returns their outputs in input order.
//!
//! ```text
//!  [f0, f1, f2] ──spawn──► JoinSet ──join_next──► slots[i] = Some(v)
//!                                       │
//!                          first Err ───┴──► abort_all() ──► Err(e)
//! ```
//!
//! ## Rules
//! - All tasks start before any is awaited.
//! - The first failure wins; every sibling still running is aborted.
//! - A panicking task is a failure ([`ScriptError::Panicked`], task = its index).
//! - Dropping the `par` future aborts every task it spawned.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio::task::JoinSet;

use crate::error::{panic_reason, ScriptError};
use crate::events::{emit, Bus, Event, EventKind};

/// Runs `tasks` concurrently and collects their results in order.
///
/// ```rust
/// use std::time::Duration;
/// use seqflow::{par, ScriptError};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), ScriptError> {
/// async fn read_encoder(axis: u32) -> Result<u32, ScriptError> {
///     tokio::time::sleep(Duration::from_millis(10)).await;
///     Ok(axis * 100)
/// }
///
/// let positions = par((1..=3).map(read_encoder)).await?;
/// assert_eq!(positions, vec![100, 200, 300]);
/// # Ok(())
/// # }
/// ```
pub async fn par<T, Fut, I>(tasks: I) -> Result<Vec<T>, ScriptError>
where
    I: IntoIterator<Item = Fut>,
    Fut: Future<Output = Result<T, ScriptError>> + Send + 'static,
    T: Send + 'static,
{
    run_par(None, "par", tasks).await
}

pub(crate) async fn run_par<T, Fut, I>(
    bus: Option<&Bus>,
    label: &str,
    tasks: I,
) -> Result<Vec<T>, ScriptError>
where
    I: IntoIterator<Item = Fut>,
    Fut: Future<Output = Result<T, ScriptError>> + Send + 'static,
    T: Send + 'static,
{
    let mut set = JoinSet::new();
    let mut slots: Vec<Option<T>> = Vec::new();

    for (index, task) in tasks.into_iter().enumerate() {
        slots.push(None);
        set.spawn(async move {
            let res = match AssertUnwindSafe(task).catch_unwind().await {
                Ok(res) => res,
                Err(payload) => Err(ScriptError::Panicked {
                    task: index.to_string(),
                    reason: panic_reason(payload.as_ref()),
                }),
            };
            (index, res)
        });
    }

    while let Some(joined) = set.join_next().await {
        let err = match joined {
            Ok((index, Ok(value))) => {
                slots[index] = Some(value);
                continue;
            }
            Ok((_, Err(err))) => err,
            Err(_aborted) => ScriptError::Canceled,
        };
        set.abort_all();
        emit(bus, || {
            Event::new(EventKind::ParFailed)
                .with_name(label)
                .with_reason(err.to_string())
        });
        return Err(err);
    }

    Ok(slots.into_iter().flatten().collect())
}
