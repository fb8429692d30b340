//! Events published to the outside world
//!
//! Every variant serializes as a flat JSON object tagged by `type`, e.g.
//! `{"type":"level-changed","value":0.75}`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The three devices a show talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// Digital mixing console
    Mixer,
    /// Countdown timer appliance
    Timer,
    /// Cue-automation tool
    Cues,
}

impl DeviceKind {
    pub const ALL: [DeviceKind; 3] = [DeviceKind::Mixer, DeviceKind::Timer, DeviceKind::Cues];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceKind::Mixer => "mixer",
            DeviceKind::Timer => "timer",
            DeviceKind::Cues => "cues",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-running timer phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerPhase {
    Ready,
    Paused,
    Finished,
}

impl TimerPhase {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ready" => Some(TimerPhase::Ready),
            "paused" => Some(TimerPhase::Paused),
            "finished" => Some(TimerPhase::Finished),
            _ => None,
        }
    }
}

/// What the timer is showing: elapsed seconds while running, or a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimerValue {
    Running(i32),
    Phase(TimerPhase),
}

impl Default for TimerValue {
    fn default() -> Self {
        TimerValue::Phase(TimerPhase::Ready)
    }
}

/// One node of the cue tool's workspace tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    #[serde(rename = "listName", default)]
    pub list_name: String,
    #[serde(rename = "uniqueID")]
    pub unique_id: String,
    #[serde(rename = "type", default)]
    pub cue_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(default)]
    pub cues: Vec<Cue>,
}

impl Cue {
    /// Depth-first walk over this cue and all of its children.
    pub fn walk(&self) -> Vec<&Cue> {
        let mut out = vec![self];
        for child in &self.cues {
            out.extend(child.walk());
        }
        out
    }
}

/// Typed application event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ShowEvent {
    /// Mixer fader moved (0.0 ..= 1.0, three decimals)
    LevelChanged { value: f64 },
    /// Mixer meter sample (three decimals)
    Meter { value: f64 },
    /// Timer tick or phase change
    TimerState { value: TimerValue },
    /// A device link came up or went down
    ConnectionChanged { device: DeviceKind, connected: bool },
    /// Cue tool workspace tree
    Cues { tree: Vec<Cue> },
}

impl ShowEvent {
    /// The device this event originates from.
    pub fn device(&self) -> DeviceKind {
        match self {
            ShowEvent::LevelChanged { .. } | ShowEvent::Meter { .. } => DeviceKind::Mixer,
            ShowEvent::TimerState { .. } => DeviceKind::Timer,
            ShowEvent::Cues { .. } => DeviceKind::Cues,
            ShowEvent::ConnectionChanged { device, .. } => *device,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_wire_shape() {
        let event = ShowEvent::LevelChanged { value: 0.75 };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"type": "level-changed", "value": 0.75})
        );

        let event = ShowEvent::ConnectionChanged {
            device: DeviceKind::Cues,
            connected: false,
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"type": "connection-changed", "device": "cues", "connected": false})
        );
    }

    #[test]
    fn test_timer_value_is_untagged() {
        let running = ShowEvent::TimerState {
            value: TimerValue::Running(93),
        };
        assert_eq!(
            serde_json::to_value(&running).unwrap(),
            json!({"type": "timer-state", "value": 93})
        );

        let paused: ShowEvent =
            serde_json::from_value(json!({"type": "timer-state", "value": "paused"})).unwrap();
        assert_eq!(
            paused,
            ShowEvent::TimerState {
                value: TimerValue::Phase(TimerPhase::Paused)
            }
        );
    }

    #[test]
    fn test_cue_tree_field_names() {
        let cue: Cue = serde_json::from_value(json!({
            "listName": "Main Cue List",
            "uniqueID": "A1",
            "type": "Cue List",
            "cues": [
                {"listName": "Walk-in", "uniqueID": "B2", "type": "Audio", "number": "1"}
            ]
        }))
        .unwrap();

        assert_eq!(cue.unique_id, "A1");
        assert_eq!(cue.cues[0].number.as_deref(), Some("1"));
        assert!(cue.cues[0].cues.is_empty());
        assert_eq!(
            cue.walk().iter().map(|c| c.unique_id.as_str()).collect::<Vec<_>>(),
            vec!["A1", "B2"]
        );
    }

    #[test]
    fn test_event_device() {
        assert_eq!(ShowEvent::Meter { value: 0.1 }.device(), DeviceKind::Mixer);
        assert_eq!(ShowEvent::Cues { tree: vec![] }.device(), DeviceKind::Cues);
        assert_eq!(DeviceKind::Timer.to_string(), "timer");
    }
}
