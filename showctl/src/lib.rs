//! # showctl
//!
//! Sync-first control of a live show: a mixing console's fader and meter, a
//! countdown timer and a cue-automation tool, all spoken to over OSC/UDP.
//!
//! [`ShowControl`] starts every device link on a background thread. Device
//! addresses are polled from a settings source, so devices can be added,
//! moved or removed while the show runs. Commands go in as [`ShowCommand`]s;
//! typed [`show_state::ShowEvent`]s come out through [`ShowControl::events`].

pub mod command;
pub mod control;
pub mod error;
pub mod iter;
mod worker;

pub use command::{Routed, ShowCommand};
pub use control::ShowControl;
pub use error::{ControlError, Result};
pub use iter::EventIter;

pub use device_link::{LinkSettings, SharedConfig, ShowConfig, Ticket};
pub use show_state::{DeviceKind, ShowEvent, ShowState};
