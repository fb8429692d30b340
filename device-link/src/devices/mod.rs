//! Device handlers

pub mod cues;
pub mod mixer;
pub mod timer;

pub use cues::{CueCommand, CueDevice};
pub use mixer::{MixerCommand, MixerDevice};
pub use timer::{TimerCommand, TimerDevice};
