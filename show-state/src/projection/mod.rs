//! State projection
//!
//! Each device module turns a decoded [`Message`] into [`StateChange`]s.
//! [`Projector`] applies them to the [`StateStore`] and returns the events to
//! publish. Decoding is pure; only the projector touches the store.

pub mod cues;
pub mod mixer;
pub mod timer;

use osc_codec::Message;
use tracing::{debug, warn};

use crate::event::{Cue, DeviceKind, ShowEvent};
use crate::meter::MeterTap;
use crate::store::{StateChange, StateStore};

/// Round to three decimals, the resolution the control panel displays.
pub fn round3(value: f32) -> f64 {
    (f64::from(value) * 1000.0).round() / 1000.0
}

/// Applies device payloads to a [`StateStore`].
#[derive(Debug, Clone)]
pub struct Projector {
    store: StateStore,
    meter_tap: MeterTap,
}

impl Projector {
    pub fn new(store: StateStore) -> Self {
        Self {
            store,
            meter_tap: MeterTap::default(),
        }
    }

    pub fn with_meter_tap(mut self, tap: MeterTap) -> Self {
        self.meter_tap = tap;
        self
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Project a mixer message for the watched `channel` (1-based).
    pub fn mixer(&self, message: &Message, channel: Option<u8>) -> Vec<ShowEvent> {
        let changes = mixer::decode(message, channel, self.meter_tap);
        self.apply_all(DeviceKind::Mixer, message, changes)
    }

    /// Optimistic update after a fader level was sent.
    pub fn fader_sent(&self, level: f32) -> Option<ShowEvent> {
        self.store.apply(StateChange::FaderLevel(round3(level)))
    }

    pub fn timer(&self, message: &Message) -> Vec<ShowEvent> {
        let changes = timer::decode(message);
        self.apply_all(DeviceKind::Timer, message, changes)
    }

    pub fn cues(&self, message: &Message) -> Vec<ShowEvent> {
        let changes = cues::decode(message);
        self.apply_all(DeviceKind::Cues, message, changes)
    }

    /// Replace the cue tree directly.
    pub fn cue_tree(&self, tree: Vec<Cue>) -> Option<ShowEvent> {
        self.store.apply(StateChange::CueTree(tree))
    }

    pub fn connection(&self, device: DeviceKind, connected: bool) -> Option<ShowEvent> {
        self.store.set_connected(device, connected)
    }

    fn apply_all(
        &self,
        device: DeviceKind,
        message: &Message,
        changes: crate::Result<Vec<StateChange>>,
    ) -> Vec<ShowEvent> {
        match changes {
            Ok(changes) => {
                if changes.is_empty() {
                    debug!("Ignoring {} message {}", device, message);
                }
                changes
                    .into_iter()
                    .filter_map(|change| self.store.apply(change))
                    .collect()
            }
            Err(e) => {
                warn!("Dropping {} message {}: {}", device, message, e);
                Vec::new()
            }
        }
    }
}
