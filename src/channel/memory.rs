//! # In-process channel backed by one broadcast ring per key.
//!
//! ```text
//! publish(s) ──► topics[s.key] ── latest = s
//!                              └─ tx.send(s) ──► rx ──► subscriber stream
//!
//! subscribe(k) ──► (latest, rx) taken under one lock
//!                  stream = iter(latest).chain(unfold(rx))
//! ```
//!
//! Taking the cached value and the receiver under the same lock means a
//! subscriber sees each published sample once: either as the cached head or
//! from the ring, never both and never neither.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio::sync::broadcast;

use super::{Channel, Sample, SampleStream};
use crate::error::ScriptError;

const DEFAULT_TOPIC_CAPACITY: usize = 256;

struct Topic {
    latest: Option<Sample>,
    tx: broadcast::Sender<Sample>,
}

/// [`Channel`] that lives entirely in memory.
///
/// Cloning is cheap; clones share topics.
#[derive(Clone)]
pub struct InMemoryChannel {
    topics: Arc<Mutex<HashMap<Arc<str>, Topic>>>,
    capacity: usize,
}

impl Default for InMemoryChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryChannel {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TOPIC_CAPACITY)
    }

    /// Creates a channel whose per-key rings hold `capacity` samples (min 1).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            topics: Arc::new(Mutex::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Returns the most recent sample for `key`.
    pub fn latest(&self, key: &str) -> Option<Sample> {
        let topics = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
        topics.get(key).and_then(|t| t.latest.clone())
    }

    fn topic<'a>(&self, topics: &'a mut HashMap<Arc<str>, Topic>, key: &str) -> &'a mut Topic {
        topics.entry(Arc::from(key)).or_insert_with(|| Topic {
            latest: None,
            tx: broadcast::channel(self.capacity).0,
        })
    }
}

#[async_trait]
impl Channel for InMemoryChannel {
    async fn publish(&self, sample: Sample) -> Result<(), ScriptError> {
        let mut topics = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
        let topic = self.topic(&mut topics, &sample.key);
        topic.latest = Some(sample.clone());
        // No receivers is fine: the sample is still cached as latest.
        let _ = topic.tx.send(sample);
        Ok(())
    }

    async fn subscribe(&self, key: &str) -> Result<SampleStream, ScriptError> {
        let (latest, rx) = {
            let mut topics = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
            let topic = self.topic(&mut topics, key);
            (topic.latest.clone(), topic.tx.subscribe())
        };

        let live = stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(sample) => return Some((sample, rx)),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });
        Ok(stream::iter(latest).chain(live).boxed())
    }
}
