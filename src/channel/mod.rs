//! # Keyed pub/sub channel contract.
//!
//! Reactive variables read and write through a [`Channel`]. The runtime only
//! relies on two operations: `publish` a [`Sample`] and `subscribe` to a key.
//!
//! ## Subscription contract
//! - The stream first yields the latest sample published for the key, if any.
//! - Afterwards it yields every later sample, in publish order.
//! - A subscriber that falls behind may miss samples; it never sees them out of order.
//! - The stream ends when the channel is dropped.

mod memory;
mod sample;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::ScriptError;

pub use memory::InMemoryChannel;
pub use sample::Sample;

/// Stream of samples for one key.
pub type SampleStream = BoxStream<'static, Sample>;

/// Transport used by reactive variables.
#[async_trait]
pub trait Channel: Send + Sync + 'static {
    /// Publishes `sample` under `sample.key`.
    async fn publish(&self, sample: Sample) -> Result<(), ScriptError>;

    /// Subscribes to `key`.
    async fn subscribe(&self, key: &str) -> Result<SampleStream, ScriptError>;
}
