//! Sync iterator for consuming show events
//!
//! Provides a blocking iterator interface for processing events
//! without requiring async/await.

use std::sync::{mpsc, Arc};
use std::time::Duration;

use parking_lot::Mutex;
use show_state::ShowEvent;

/// Blocking iterator over show events
///
/// `next()` blocks until an event is available and ends once the worker has
/// stopped. Clones share the same underlying channel, so each event is seen
/// by exactly one of them.
pub struct EventIter {
    rx: Arc<Mutex<mpsc::Receiver<ShowEvent>>>,
}

impl EventIter {
    pub(crate) fn new(rx: Arc<Mutex<mpsc::Receiver<ShowEvent>>>) -> Self {
        Self { rx }
    }

    /// Block until an event is available
    ///
    /// Returns `None` once the worker has stopped.
    pub fn recv(&self) -> Option<ShowEvent> {
        self.rx.lock().recv().ok()
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&self) -> Option<ShowEvent> {
        self.rx.lock().try_recv().ok()
    }

    /// Block until an event is available or timeout expires
    pub fn recv_timeout(&self, timeout: Duration) -> Option<ShowEvent> {
        self.rx.lock().recv_timeout(timeout).ok()
    }

    /// Events already queued, without blocking.
    pub fn drain(&self) -> Vec<ShowEvent> {
        self.rx.lock().try_iter().collect()
    }
}

impl Iterator for EventIter {
    type Item = ShowEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.recv()
    }
}

impl Clone for EventIter {
    fn clone(&self) -> Self {
        Self {
            rx: Arc::clone(&self.rx),
        }
    }
}
