//! Timer payload decoder
//!
//! The timer reports on `/state`: an int while counting, or one of
//! `ready`, `paused`, `finished` otherwise.

use osc_codec::{Argument, Message};

use crate::error::{Result, StateError};
use crate::event::TimerPhase;
use crate::store::StateChange;

pub fn decode(message: &Message) -> Result<Vec<StateChange>> {
    if !message.is_address(&["state"]) {
        return Ok(vec![]);
    }

    match message.first_arg() {
        Some(Argument::Int(seconds)) => Ok(vec![StateChange::TimerTick(*seconds)]),
        Some(Argument::String(s)) => TimerPhase::parse(s)
            .map(|phase| vec![StateChange::TimerPhase(phase)])
            .ok_or_else(|| StateError::Parse(format!("unknown timer phase `{s}`"))),
        _ => Err(StateError::UnexpectedArgument {
            address: message.path(),
            expected: "int or string",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_and_phase() {
        let tick = Message::new(["state"]).with_arg(61);
        assert_eq!(decode(&tick).unwrap(), vec![StateChange::TimerTick(61)]);

        let phase = Message::new(["state"]).with_arg("finished");
        assert_eq!(
            decode(&phase).unwrap(),
            vec![StateChange::TimerPhase(TimerPhase::Finished)]
        );
    }

    #[test]
    fn test_unknown_values() {
        assert!(decode(&Message::new(["state"]).with_arg("exploded")).is_err());
        assert!(decode(&Message::new(["state"])).is_err());
        assert!(decode(&Message::new(["battery"]).with_arg(3)).unwrap().is_empty());
    }
}
