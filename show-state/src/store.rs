//! Last known device state
//!
//! The store holds one [`ShowState`] behind a `tokio::sync::watch` channel.
//! Projections hand it [`StateChange`]s; [`StateStore::apply`] writes the
//! change and returns the event to publish, if any. Publication rules live
//! here so every caller gets the same behavior:
//!
//! - fader, meter, timer ticks and cue trees publish on every update
//! - timer phases publish only when the phase differs from the current value
//! - connection flags publish only when they flip

use serde::Serialize;
use tokio::sync::watch;

use crate::event::{Cue, DeviceKind, ShowEvent, TimerPhase, TimerValue};

// ============================================================================
// ShowState
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MixerState {
    pub level: Option<f64>,
    pub meter: Option<f64>,
    pub connected: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimerState {
    pub value: TimerValue,
    pub connected: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CueState {
    pub tree: Vec<Cue>,
    pub connected: bool,
}

/// Snapshot of everything known about the show's devices.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ShowState {
    pub mixer: MixerState,
    pub timer: TimerState,
    pub cues: CueState,
}

impl ShowState {
    pub fn is_connected(&self, device: DeviceKind) -> bool {
        match device {
            DeviceKind::Mixer => self.mixer.connected,
            DeviceKind::Timer => self.timer.connected,
            DeviceKind::Cues => self.cues.connected,
        }
    }

    fn connected_mut(&mut self, device: DeviceKind) -> &mut bool {
        match device {
            DeviceKind::Mixer => &mut self.mixer.connected,
            DeviceKind::Timer => &mut self.timer.connected,
            DeviceKind::Cues => &mut self.cues.connected,
        }
    }
}

// ============================================================================
// StateChange
// ============================================================================

/// A single decoded update, not yet applied.
#[derive(Debug, Clone, PartialEq)]
pub enum StateChange {
    FaderLevel(f64),
    MeterLevel(f64),
    TimerTick(i32),
    TimerPhase(TimerPhase),
    CueTree(Vec<Cue>),
    Connection { device: DeviceKind, connected: bool },
}

// ============================================================================
// StateStore
// ============================================================================

/// Shared handle to the current [`ShowState`]. Clones share the same state.
#[derive(Debug, Clone)]
pub struct StateStore {
    state: std::sync::Arc<watch::Sender<ShowState>>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ShowState::default());
        Self {
            state: std::sync::Arc::new(tx),
        }
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> ShowState {
        self.state.borrow().clone()
    }

    /// Receiver notified after every modifying [`apply`](Self::apply).
    pub fn subscribe(&self) -> watch::Receiver<ShowState> {
        self.state.subscribe()
    }

    pub fn is_connected(&self, device: DeviceKind) -> bool {
        self.state.borrow().is_connected(device)
    }

    /// Write `change` and return the event it produces.
    pub fn apply(&self, change: StateChange) -> Option<ShowEvent> {
        let mut event = None;
        self.state.send_if_modified(|state| {
            event = apply_change(state, change);
            event.is_some()
        });
        event
    }

    /// Shorthand for a connection flag change.
    pub fn set_connected(&self, device: DeviceKind, connected: bool) -> Option<ShowEvent> {
        self.apply(StateChange::Connection { device, connected })
    }
}

fn apply_change(state: &mut ShowState, change: StateChange) -> Option<ShowEvent> {
    match change {
        StateChange::FaderLevel(value) => {
            state.mixer.level = Some(value);
            Some(ShowEvent::LevelChanged { value })
        }
        StateChange::MeterLevel(value) => {
            state.mixer.meter = Some(value);
            Some(ShowEvent::Meter { value })
        }
        StateChange::TimerTick(seconds) => {
            state.timer.value = TimerValue::Running(seconds);
            Some(ShowEvent::TimerState {
                value: state.timer.value,
            })
        }
        StateChange::TimerPhase(phase) => {
            let value = TimerValue::Phase(phase);
            if state.timer.value == value {
                return None;
            }
            state.timer.value = value;
            Some(ShowEvent::TimerState { value })
        }
        StateChange::CueTree(tree) => {
            state.cues.tree = tree.clone();
            Some(ShowEvent::Cues { tree })
        }
        StateChange::Connection { device, connected } => {
            let flag = state.connected_mut(device);
            if *flag == connected {
                return None;
            }
            *flag = connected;
            Some(ShowEvent::ConnectionChanged { device, connected })
        }
    }
}
