//! # Reactive variables.
//!
//! A [`Var`] caches one value locally and mirrors it to and from a channel key.
//! Values that arrive from the channel (through [`Var::pv_get`] or a
//! [`Monitor`]) are stored in the cache first and only then trigger a refresh of
//! the owning machine, so the logic always sees the value that caused its tick.
//!
//! ```text
//! set(v) ─────────────► cache                         (local only)
//! pv_put() ── cache ──► channel.publish
//! pv_get() ◄─ channel.subscribe().next() ──► cache ──► machine refresh(key)
//! pv_monitor() ── spawn ──► for each sample ──► cache ──► machine refresh(key)
//! ```

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::handle::Owner;
use crate::channel::{Channel, Sample};
use crate::error::{panic_reason, ScriptError};
use crate::events::{emit, Event, EventKind};

/// Locally cached value mirrored to a channel key.
///
/// Clones share the cache.
pub struct Var<T> {
    key: Arc<str>,
    cache: Arc<RwLock<Option<T>>>,
    channel: Arc<dyn Channel>,
    owner: Owner,
    get_timeout: Option<Duration>,
}

impl<T> Clone for Var<T> {
    fn clone(&self) -> Self {
        Self {
            key: Arc::clone(&self.key),
            cache: Arc::clone(&self.cache),
            channel: Arc::clone(&self.channel),
            owner: self.owner.clone(),
            get_timeout: self.get_timeout,
        }
    }
}

impl<T> Var<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub(crate) fn new(
        key: Arc<str>,
        initial: Option<T>,
        channel: Arc<dyn Channel>,
        owner: Owner,
        get_timeout: Option<Duration>,
    ) -> Self {
        Self {
            key,
            cache: Arc::new(RwLock::new(initial)),
            channel,
            owner,
            get_timeout,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Updates the cached value. Nothing is published.
    pub fn set(&self, value: T) {
        *self.cache.write().unwrap_or_else(PoisonError::into_inner) = Some(value);
    }

    /// Returns the cached value, `None` if never set nor received.
    pub fn get(&self) -> Option<T> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Publishes the cached value. An unset variable publishes nothing.
    pub async fn pv_put(&self) -> Result<(), ScriptError> {
        let sample = {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            match cache.as_ref() {
                Some(value) => Sample::encode(Arc::clone(&self.key), value)?,
                None => return Ok(()),
            }
        };
        self.channel.publish(sample).await
    }

    /// Fetches the latest value for the key, caches it, then refreshes the machine.
    ///
    /// Waits for the first value if none was published yet, bounded by
    /// `Config::get_timeout` when set.
    pub async fn pv_get(&self) -> Result<T, ScriptError> {
        let mut stream = self.channel.subscribe(&self.key).await?;
        let next = match self.get_timeout {
            Some(limit) => tokio::time::timeout(limit, stream.next())
                .await
                .map_err(|_| ScriptError::Timeout { timeout: limit })?,
            None => stream.next().await,
        };
        let sample = next.ok_or_else(|| ScriptError::ChannelClosed {
            key: self.key.to_string(),
        })?;

        let value: T = sample.decode()?;
        self.accept(value.clone());
        self.owner.notify(&self.key)?;
        Ok(value)
    }

    /// Starts a standing subscription: every value received is cached and
    /// refreshes the machine.
    ///
    /// The subscription is established before this returns. It ends when the
    /// returned [`Monitor`] is cancelled, the machine stops, or the channel
    /// closes. Values that fail to decode are skipped (`VarRejected`).
    pub async fn pv_monitor(&self) -> Result<Monitor, ScriptError> {
        let mut stream = self.channel.subscribe(&self.key).await?;
        let token = self.owner.token.child_token();
        let var = self.clone();
        let stop = token.clone();

        let task = async move {
            loop {
                let sample = tokio::select! {
                    _ = stop.cancelled() => break,
                    next = stream.next() => match next {
                        Some(sample) => sample,
                        None => break,
                    },
                };
                match sample.decode::<T>() {
                    Ok(value) => {
                        var.accept(value);
                        if var.owner.notify(&var.key).is_err() {
                            break;
                        }
                    }
                    Err(err) => emit(var.owner.bus.as_ref(), || {
                        Event::new(EventKind::VarRejected)
                            .with_name(Arc::clone(&var.owner.name))
                            .with_source(Arc::clone(&var.key))
                            .with_reason(err.to_string())
                    }),
                }
            }
        };

        let name: Arc<str> = format!("{}/{}", self.owner.name, self.key).into();
        let join = match &self.owner.tracker {
            Some(tracker) => tracker.spawn(name, task),
            None => tokio::spawn(task),
        };
        Ok(Monitor {
            key: Arc::clone(&self.key),
            token,
            join,
        })
    }

    fn accept(&self, value: T) {
        self.set(value);
        emit(self.owner.bus.as_ref(), || {
            Event::new(EventKind::VarUpdated)
                .with_name(Arc::clone(&self.owner.name))
                .with_source(Arc::clone(&self.key))
        });
    }
}

impl<T> fmt::Display for Var<T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        match cache.as_ref() {
            Some(value) => write!(f, "{value:?}"),
            None => f.write_str("<unset>"),
        }
    }
}

/// Handle to a standing subscription started by [`Var::pv_monitor`].
///
/// Dropping it leaves the subscription running.
pub struct Monitor {
    key: Arc<str>,
    token: CancellationToken,
    join: JoinHandle<()>,
}

impl Monitor {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Waits for the subscription task to end.
    ///
    /// A panic inside the task is returned as [`ScriptError::Panicked`].
    pub async fn join(self) -> Result<(), ScriptError> {
        match self.join.await {
            Ok(()) => Ok(()),
            Err(err) if err.is_panic() => Err(ScriptError::Panicked {
                task: self.key.to_string(),
                reason: panic_reason(err.into_panic().as_ref()),
            }),
            Err(_) => Err(ScriptError::Canceled),
        }
    }
}
