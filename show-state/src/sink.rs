//! Outward event publication
//!
//! Publication is fire-and-forget. A sink whose receiver has gone away drops
//! the event and logs at debug level; it never blocks a device link.

use std::sync::mpsc;

use tokio::sync::{broadcast, mpsc as tokio_mpsc};
use tracing::debug;

use crate::event::ShowEvent;

/// Narrow publish interface used by every device link.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: ShowEvent);
}

impl EventSink for tokio_mpsc::UnboundedSender<ShowEvent> {
    fn publish(&self, event: ShowEvent) {
        if self.send(event).is_err() {
            debug!("Event receiver dropped");
        }
    }
}

impl EventSink for broadcast::Sender<ShowEvent> {
    fn publish(&self, event: ShowEvent) {
        // No subscribers is not an error for a broadcast channel.
        let _ = self.send(event);
    }
}

impl EventSink for mpsc::Sender<ShowEvent> {
    fn publish(&self, event: ShowEvent) {
        if self.send(event).is_err() {
            debug!("Event receiver dropped");
        }
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn publish(&self, _event: ShowEvent) {}
}

/// Adapts a closure into a sink.
pub struct FnSink<F>(pub F);

impl<F> EventSink for FnSink<F>
where
    F: Fn(ShowEvent) + Send + Sync,
{
    fn publish(&self, event: ShowEvent) {
        (self.0)(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_closed_channel_does_not_panic() {
        let (tx, rx) = tokio_mpsc::unbounded_channel();
        drop(rx);
        tx.publish(ShowEvent::Meter { value: 0.2 });

        let (tx, rx) = mpsc::channel();
        drop(rx);
        tx.publish(ShowEvent::Meter { value: 0.2 });
    }

    #[test]
    fn test_fn_sink_forwards() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = FnSink({
            let seen = Arc::clone(&seen);
            move |event| seen.lock().push(event)
        });
        sink.publish(ShowEvent::LevelChanged { value: 0.5 });
        assert_eq!(*seen.lock(), vec![ShowEvent::LevelChanged { value: 0.5 }]);
    }
}
