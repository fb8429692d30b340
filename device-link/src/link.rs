//! Socket lifecycle for one device
//!
//! A [`DeviceLink`] owns at most one UDP socket. It is opened and replaced
//! only by [`DeviceLink::reconcile`], and dropped by [`DeviceLink::teardown`]
//! on errors and timeouts. The socket itself never leaves this type.

use std::io;
use std::net::Ipv4Addr;

use osc_codec::{encode, Message};
use show_state::DeviceKind;
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{DeviceSettings, DeviceTarget};
use crate::error::{LinkError, Result};

/// Largest datagram accepted from a device.
pub const MAX_DATAGRAM: usize = 65_536;

/// Connection state of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No socket
    Disconnected,
    /// Socket open, waiting for the device to answer
    Connecting,
    /// Socket open and the device is known to be there
    Connected,
}

/// What a call to [`DeviceLink::reconcile`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Transition {
    /// An existing socket was closed
    pub closed: bool,
    /// The closed socket belonged to a connected link
    pub was_connected: bool,
    /// A new socket was opened
    pub opened: bool,
}

#[derive(Debug)]
pub struct DeviceLink {
    kind: DeviceKind,
    settings: DeviceSettings,
    socket: Option<UdpSocket>,
    bound: Option<DeviceTarget>,
    state: LinkState,
    liveness_deadline: Option<Instant>,
    keepalive_at: Option<Instant>,
}

impl DeviceLink {
    pub fn new(kind: DeviceKind, settings: DeviceSettings) -> Self {
        Self {
            kind,
            settings,
            socket: None,
            bound: None,
            state: LinkState::Disconnected,
            liveness_deadline: None,
            keepalive_at: None,
        }
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    /// Target the open socket is connected to.
    pub fn bound(&self) -> Option<&DeviceTarget> {
        self.bound.as_ref()
    }

    /// Local address of the open socket.
    pub fn local_addr(&self) -> Option<std::net::SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }

    pub fn liveness_deadline(&self) -> Option<Instant> {
        self.liveness_deadline
    }

    pub fn keepalive_at(&self) -> Option<Instant> {
        self.keepalive_at
    }

    /// Bring the socket in line with the configured target.
    ///
    /// `None` closes any open socket. A target that differs from the bound
    /// one, or any target while no socket is open, (re)opens. Open failures
    /// are logged and leave the link disconnected until the next call.
    pub async fn reconcile(&mut self, target: Option<&DeviceTarget>) -> Transition {
        let mut transition = Transition::default();

        let Some(target) = target else {
            if self.socket.is_some() {
                info!("{} address cleared, closing socket", self.kind);
                transition.closed = true;
                transition.was_connected = self.teardown();
            }
            return transition;
        };

        if self.socket.is_some() && self.bound.as_ref() == Some(target) {
            return transition;
        }

        if self.socket.is_some() {
            info!(
                "{} address changed to {}, reopening socket",
                self.kind, target
            );
            transition.closed = true;
            transition.was_connected = self.teardown();
        }

        match self.open(target).await {
            Ok(()) => transition.opened = true,
            Err(e) => warn!("{}", e),
        }
        transition
    }

    async fn open(&mut self, target: &DeviceTarget) -> Result<()> {
        let port = self.settings.local_port;
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map_err(|source| LinkError::Bind {
                device: self.kind,
                port,
                source,
            })?;

        let remote_port = target.port_or(self.settings.remote_port);
        socket
            .connect((target.host.as_str(), remote_port))
            .await
            .map_err(|source| LinkError::Connect {
                device: self.kind,
                target: target.to_string(),
                source,
            })?;

        let now = Instant::now();
        self.socket = Some(socket);
        self.bound = Some(target.clone());
        self.keepalive_at = self.settings.keepalive.map(|interval| now + interval);
        match self.settings.handshake {
            Some(window) => {
                self.state = LinkState::Connecting;
                self.liveness_deadline = Some(now + window);
                info!("{} socket open to {}, awaiting reply", self.kind, target);
            }
            None => {
                self.state = LinkState::Connected;
                self.liveness_deadline = None;
                info!("Connected to {} at {}", self.kind, target);
            }
        }
        Ok(())
    }

    /// Drop the socket and every timer tied to it.
    ///
    /// Returns whether the link was connected.
    pub fn teardown(&mut self) -> bool {
        let was_connected = self.state == LinkState::Connected;
        if self.socket.take().is_some() {
            debug!("{} socket closed", self.kind);
        }
        self.bound = None;
        self.state = LinkState::Disconnected;
        self.liveness_deadline = None;
        self.keepalive_at = None;
        was_connected
    }

    /// Record that the device answered. Returns true on the transition to
    /// [`LinkState::Connected`].
    pub fn mark_alive(&mut self) -> bool {
        self.liveness_deadline = None;
        if self.state == LinkState::Connecting {
            self.state = LinkState::Connected;
            info!("Connected to {}", self.kind);
            return true;
        }
        false
    }

    /// Schedule the next keepalive after one fired.
    pub fn keepalive_fired(&mut self, now: Instant) {
        self.keepalive_at = match (self.socket.is_some(), self.settings.keepalive) {
            (true, Some(interval)) => Some(now + interval),
            _ => None,
        };
    }

    /// Encode and send one message.
    pub async fn send(&self, message: &Message) -> Result<()> {
        let socket = self.socket.as_ref().ok_or(LinkError::NotOpen(self.kind))?;
        let bytes = encode(message)?;
        socket.send(&bytes).await.map_err(|source| LinkError::Send {
            device: self.kind,
            source,
        })?;
        debug!("-> {} {}", self.kind, message);
        Ok(())
    }

    /// Receive one datagram. Pends forever while no socket is open.
    pub async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        match &self.socket {
            Some(socket) => socket.recv(buf).await,
            None => std::future::pending().await,
        }
    }
}
