//! Mixing console (X32 / XAir remote protocol)

use osc_codec::Message;
use show_state::projection::mixer::fader_address;
use show_state::{DeviceKind, Projector};
use tokio::time::Instant;
use tracing::error;

use crate::config::DeviceConfig;
use crate::error::{respond, CommandError, Responder};
use crate::handler::{Action, DeviceHandler};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MixerCommand {
    /// Move the watched channel's fader (0.0 ..= 1.0)
    SetFader(f32),
}

/// Watches one channel's fader and meter and moves its fader on request.
pub struct MixerDevice {
    projector: Projector,
    channel: Option<u8>,
}

impl MixerDevice {
    pub fn new(projector: Projector) -> Self {
        Self {
            projector,
            channel: None,
        }
    }

    pub fn channel(&self) -> Option<u8> {
        self.channel
    }

    /// `/xremote` keeps pushed updates coming; `/meters` asks for the meter
    /// bank of the watched channel.
    fn subscription(&self) -> Vec<Action> {
        let mut actions = vec![Action::send(Message::new(["xremote"]))];
        if let Some(channel) = self.channel {
            actions.push(Action::send(
                Message::new(["meters"])
                    .with_arg("/meters/6")
                    .with_arg(i32::from(channel) - 1)
                    .with_arg(0)
                    .with_arg(1),
            ));
        }
        actions
    }

    /// Ask the console for the fader's current position.
    fn fader_request(&self) -> Option<Action> {
        self.channel
            .map(|channel| Action::send(Message::new(fader_address(channel))))
    }
}

impl DeviceHandler for MixerDevice {
    type Command = MixerCommand;

    fn kind(&self) -> DeviceKind {
        DeviceKind::Mixer
    }

    fn configure(&mut self, config: &DeviceConfig) -> Vec<Action> {
        if config.channel == self.channel {
            return Vec::new();
        }
        self.channel = config.channel;
        let mut actions = self.subscription();
        actions.extend(self.fader_request());
        actions
    }

    fn on_open(&mut self, _now: Instant) -> Vec<Action> {
        let mut actions = self.subscription();
        actions.extend(self.fader_request());
        actions
    }

    fn on_keepalive(&mut self, _now: Instant) -> Vec<Action> {
        self.subscription()
    }

    fn on_message(&mut self, message: &Message, _now: Instant) -> Vec<Action> {
        Action::publish_all(self.projector.mixer(message, self.channel))
    }

    fn on_command(
        &mut self,
        command: MixerCommand,
        responder: Option<Responder>,
        _now: Instant,
    ) -> Vec<Action> {
        match command {
            MixerCommand::SetFader(level) => {
                let Some(channel) = self.channel else {
                    error!("No mixer channel configured, fader command not sent");
                    respond(
                        responder,
                        Err(CommandError::Unconfigured("no mixer channel".to_string())),
                    );
                    return Vec::new();
                };
                if !(0.0..=1.0).contains(&level) {
                    respond(
                        responder,
                        Err(CommandError::Invalid(format!(
                            "fader level {level} outside 0.0..=1.0"
                        ))),
                    );
                    return Vec::new();
                }

                let mut actions = vec![Action::send_with_ack(
                    Message::new(fader_address(channel)).with_arg(level),
                    responder,
                )];
                actions.extend(self.projector.fader_sent(level).map(Action::Publish));
                actions
            }
        }
    }
}
