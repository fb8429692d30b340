//! Commands accepted from the control surface
//!
//! Commands arrive as JSON objects tagged by `type`, for example
//! `{"type":"fire-cues","ids":["A1","A2"]}`, and are routed to the link of
//! the device they address.

use device_link::{CueCommand, MixerCommand, TimerCommand};
use serde::{Deserialize, Serialize};
use show_state::DeviceKind;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ShowCommand {
    StartTimer,
    PauseTimer,
    /// Reset the timer, optionally to a new duration in seconds
    ResetTimer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seconds: Option<f32>,
    },
    /// Move the watched mixer channel's fader (0.0 ..= 1.0)
    SetFader { level: f32 },
    /// Ask the cue tool for its cue lists
    GetCues,
    /// Start cues by unique id, in order
    FireCues { ids: Vec<String> },
}

impl ShowCommand {
    /// Parse one JSON command.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn device(&self) -> DeviceKind {
        match self {
            ShowCommand::StartTimer | ShowCommand::PauseTimer | ShowCommand::ResetTimer { .. } => {
                DeviceKind::Timer
            }
            ShowCommand::SetFader { .. } => DeviceKind::Mixer,
            ShowCommand::GetCues | ShowCommand::FireCues { .. } => DeviceKind::Cues,
        }
    }

    /// The device-level command this translates to.
    pub fn route(self) -> Routed {
        match self {
            ShowCommand::StartTimer => Routed::Timer(TimerCommand::Start),
            ShowCommand::PauseTimer => Routed::Timer(TimerCommand::Pause),
            ShowCommand::ResetTimer { seconds } => Routed::Timer(TimerCommand::Reset(seconds)),
            ShowCommand::SetFader { level } => Routed::Mixer(MixerCommand::SetFader(level)),
            ShowCommand::GetCues => Routed::Cues(CueCommand::GetCues),
            ShowCommand::FireCues { ids } => Routed::Cues(CueCommand::Fire(ids)),
        }
    }
}

/// A [`ShowCommand`] addressed to one link.
#[derive(Debug, Clone, PartialEq)]
pub enum Routed {
    Mixer(MixerCommand),
    Timer(TimerCommand),
    Cues(CueCommand),
}
