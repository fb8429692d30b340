//! Countdown timer appliance

use osc_codec::Message;
use show_state::{DeviceKind, Projector};
use tokio::time::Instant;

use crate::error::{respond, CommandError, Responder};
use crate::handler::{Action, DeviceHandler};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimerCommand {
    Start,
    Pause,
    /// Reset, optionally to a new duration in seconds
    Reset(Option<f32>),
}

impl TimerCommand {
    /// Wire form. A zero reset duration is sent as a plain reset.
    pub fn to_message(self) -> Message {
        match self {
            TimerCommand::Start => Message::new(["start"]),
            TimerCommand::Pause => Message::new(["pause"]),
            TimerCommand::Reset(Some(seconds)) if seconds != 0.0 => {
                Message::new(["reset"]).with_arg(seconds)
            }
            TimerCommand::Reset(_) => Message::new(["reset"]),
        }
    }
}

pub struct TimerDevice {
    projector: Projector,
}

impl TimerDevice {
    pub fn new(projector: Projector) -> Self {
        Self { projector }
    }
}

impl DeviceHandler for TimerDevice {
    type Command = TimerCommand;

    fn kind(&self) -> DeviceKind {
        DeviceKind::Timer
    }

    fn on_open(&mut self, _now: Instant) -> Vec<Action> {
        vec![Action::send(Message::new(["subscribe"]))]
    }

    fn on_keepalive(&mut self, _now: Instant) -> Vec<Action> {
        vec![Action::send(Message::new(["subscribe"]))]
    }

    fn on_message(&mut self, message: &Message, _now: Instant) -> Vec<Action> {
        Action::publish_all(self.projector.timer(message))
    }

    fn on_command(
        &mut self,
        command: TimerCommand,
        responder: Option<Responder>,
        _now: Instant,
    ) -> Vec<Action> {
        if let TimerCommand::Reset(Some(seconds)) = command {
            if !seconds.is_finite() || seconds < 0.0 {
                respond(
                    responder,
                    Err(CommandError::Invalid(format!("reset to {seconds} seconds"))),
                );
                return Vec::new();
            }
        }
        vec![Action::send_with_ack(command.to_message(), responder)]
    }
}
