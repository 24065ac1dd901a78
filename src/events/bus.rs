//! # Event bus for runtime events.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`]. Handlers, loops and
//! machine actors publish without blocking; the [`Script`](crate::Script) listener
//! forwards everything to its [`SubscriberSet`](crate::SubscriberSet).
//!
//! ```text
//!   CommandHandler ──┐
//!   poll loops     ──┼──► Bus ──► script listener ──► SubscriberSet
//!   MachineActor   ──┤
//!   Var monitors   ──┘
//! ```
//!
//! ## Rules
//! - `publish()` never blocks and never fails; with no receivers the event is dropped.
//! - A single ring buffer of `capacity` events is shared by all receivers.
//! - Slow receivers observe `RecvError::Lagged(n)` and skip the `n` oldest events.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for runtime events. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus; capacity is clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all active receivers.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a receiver that observes events sent after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

/// Publishes through an optional bus; primitives used standalone carry `None`.
#[inline]
pub(crate) fn emit(bus: Option<&Bus>, make: impl FnOnce() -> Event) {
    if let Some(bus) = bus {
        bus.publish(make());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn subscribers_receive_events_published_after_subscribe() {
        let bus = Bus::new(8);
        bus.publish(Event::new(EventKind::LoopStopped));

        let mut rx = bus.subscribe();
        bus.publish(Event::new(EventKind::MachineTick).with_name("m"));

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::MachineTick);
        assert_eq!(ev.name.as_deref(), Some("m"));
    }

    #[test]
    fn emit_without_bus_skips_construction() {
        let mut built = false;
        emit(None, || {
            built = true;
            Event::new(EventKind::LoopStopped)
        });
        assert!(!built);
    }
}
