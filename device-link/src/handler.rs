//! Device-specific behavior plugged into the generic link driver
//!
//! A handler never touches the socket. It reacts to link events by returning
//! [`Action`]s, which the driver performs in order.

use std::fmt;

use osc_codec::Message;
use show_state::{DeviceKind, ShowEvent};
use tokio::time::Instant;

use crate::config::DeviceConfig;
use crate::error::Responder;

/// Something a handler wants the driver to do.
#[derive(Debug)]
pub enum Action {
    /// Send a message; `ack` is resolved with the send outcome
    Send {
        message: Message,
        ack: Option<Responder>,
    },
    /// Publish an event
    Publish(ShowEvent),
    /// Tear the link down; recovery happens on the next reconcile
    Disconnect(&'static str),
}

impl Action {
    pub fn send(message: Message) -> Self {
        Action::Send { message, ack: None }
    }

    pub fn send_with_ack(message: Message, ack: Option<Responder>) -> Self {
        Action::Send { message, ack }
    }

    /// Publish every event in `events`.
    pub fn publish_all(events: impl IntoIterator<Item = ShowEvent>) -> Vec<Action> {
        events.into_iter().map(Action::Publish).collect()
    }
}

/// Per-device protocol logic.
///
/// Every method runs on the link's task, so calls never interleave.
pub trait DeviceHandler: Send + 'static {
    /// Commands accepted by this device
    type Command: Send + fmt::Debug + 'static;

    fn kind(&self) -> DeviceKind;

    /// Configuration was polled. Actions are performed only if the link stays
    /// open without being reopened.
    fn configure(&mut self, _config: &DeviceConfig) -> Vec<Action> {
        Vec::new()
    }

    /// A new socket was opened.
    fn on_open(&mut self, _now: Instant) -> Vec<Action> {
        Vec::new()
    }

    /// The keepalive interval elapsed while open.
    fn on_keepalive(&mut self, _now: Instant) -> Vec<Action> {
        Vec::new()
    }

    /// A datagram arrived and was decoded.
    fn on_message(&mut self, message: &Message, now: Instant) -> Vec<Action>;

    /// A caller issued a command. The link is open when this is called.
    fn on_command(
        &mut self,
        command: Self::Command,
        responder: Option<Responder>,
        now: Instant,
    ) -> Vec<Action>;

    /// `message` was written to the socket.
    fn on_sent(&mut self, _message: &Message, _now: Instant) {}

    /// Next handler-owned deadline, if any.
    fn deadline(&self) -> Option<Instant> {
        None
    }

    /// The deadline returned by [`deadline`](Self::deadline) passed.
    fn on_deadline(&mut self, _now: Instant) -> Vec<Action> {
        Vec::new()
    }

    /// The socket was dropped. Pending work must be abandoned here.
    fn on_teardown(&mut self) {}
}
