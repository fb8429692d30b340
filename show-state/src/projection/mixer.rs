//! Mixer payload decoder
//!
//! Handles the watched channel's fader (`/ch/NN/mix/fader ,f`) and the
//! meter bank (`/meters/6 ,b`). Everything else the console pushes through
//! its remote subscription is ignored.

use osc_codec::{Argument, Message};

use super::round3;
use crate::error::{Result, StateError};
use crate::meter::{MeterBlob, MeterTap};
use crate::store::StateChange;

/// Address of the fader for a 1-based channel, e.g. `ch/03/mix/fader`.
pub fn fader_address(channel: u8) -> [String; 4] {
    [
        "ch".to_string(),
        format!("{channel:02}"),
        "mix".to_string(),
        "fader".to_string(),
    ]
}

pub fn decode(message: &Message, channel: Option<u8>, tap: MeterTap) -> Result<Vec<StateChange>> {
    if message.is_address(&["meters", "6"]) {
        let blob = message
            .first_arg()
            .and_then(Argument::as_blob)
            .ok_or_else(|| StateError::UnexpectedArgument {
                address: message.path(),
                expected: "blob",
            })?;
        let meter = MeterBlob::parse(blob)?;
        return Ok(meter
            .level(tap)
            .map(|level| vec![StateChange::MeterLevel(round3(level))])
            .unwrap_or_default());
    }

    let Some(channel) = channel else {
        return Ok(vec![]);
    };
    if message.address != fader_address(channel) {
        return Ok(vec![]);
    }

    let level = message
        .first_arg()
        .and_then(Argument::as_float)
        .ok_or_else(|| StateError::UnexpectedArgument {
            address: message.path(),
            expected: "float",
        })?;
    Ok(vec![StateChange::FaderLevel(round3(level))])
}
