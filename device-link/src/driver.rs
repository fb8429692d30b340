//! The per-device task
//!
//! A [`LinkDriver`] owns one [`DeviceLink`] and one [`DeviceHandler`] and
//! runs them on a single task, selecting over its inbox, the socket and the
//! link's deadlines. Callers talk to it through a cloneable [`LinkHandle`].

use std::sync::Arc;

use osc_codec::decode;
use show_state::{DeviceKind, EventSink, StateStore};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

use crate::config::{DeviceConfig, DeviceSettings};
use crate::error::{respond, CommandError, CommandResult, LinkError, Responder};
use crate::handler::{Action, DeviceHandler};
use crate::link::{DeviceLink, MAX_DATAGRAM};

/// Messages accepted by a link task.
#[derive(Debug)]
pub enum LinkInput<C> {
    /// Apply freshly polled configuration
    Reconcile(DeviceConfig),
    /// Run a device command
    Command {
        command: C,
        responder: Option<Responder>,
    },
    /// Close the socket and stop
    Shutdown,
}

/// Pending outcome of a tracked command.
#[derive(Debug)]
pub struct Ticket {
    rx: oneshot::Receiver<CommandResult>,
}

impl Ticket {
    pub(crate) fn new(rx: oneshot::Receiver<CommandResult>) -> Self {
        Self { rx }
    }

    /// Wait for the outcome.
    pub async fn outcome(self) -> CommandResult {
        self.rx.await.unwrap_or(Err(CommandError::LinkStopped))
    }

    /// Wait for the outcome from outside the runtime.
    ///
    /// # Panics
    ///
    /// Panics if called from within an asynchronous execution context.
    pub fn blocking_outcome(self) -> CommandResult {
        self.rx.blocking_recv().unwrap_or(Err(CommandError::LinkStopped))
    }

    /// The outcome, if already known.
    pub fn try_outcome(&mut self) -> Option<CommandResult> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(CommandError::LinkStopped)),
        }
    }
}

/// Sender side of a link task.
#[derive(Debug)]
pub struct LinkHandle<C> {
    kind: DeviceKind,
    tx: mpsc::UnboundedSender<LinkInput<C>>,
}

impl<C> Clone for LinkHandle<C> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            tx: self.tx.clone(),
        }
    }
}

impl<C: Send + 'static> LinkHandle<C> {
    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    /// Fire-and-forget command.
    pub fn command(&self, command: C) -> crate::Result<()> {
        self.tx
            .send(LinkInput::Command {
                command,
                responder: None,
            })
            .map_err(|_| LinkError::Shutdown(format!("{} link is stopped", self.kind)))
    }

    /// Command whose outcome is reported through the returned ticket.
    pub fn request(&self, command: C) -> Ticket {
        let (tx, rx) = oneshot::channel();
        // A stopped link drops the responder, which the ticket reports.
        let _ = self.tx.send(LinkInput::Command {
            command,
            responder: Some(tx),
        });
        Ticket::new(rx)
    }

    /// Ask the task to close its socket and exit.
    pub fn shutdown(&self) {
        let _ = self.tx.send(LinkInput::Shutdown);
    }

    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Anything the configuration watcher can push configuration into.
pub trait Reconcile: Send + Sync {
    fn kind(&self) -> DeviceKind;

    /// Queue a reconcile. Returns false if the link is gone.
    fn reconcile(&self, config: DeviceConfig) -> bool;
}

impl<C: Send + 'static> Reconcile for LinkHandle<C> {
    fn kind(&self) -> DeviceKind {
        self.kind
    }

    fn reconcile(&self, config: DeviceConfig) -> bool {
        self.tx.send(LinkInput::Reconcile(config)).is_ok()
    }
}

/// Spawn a link task on the current runtime.
pub fn spawn_link<H: DeviceHandler>(
    handler: H,
    settings: DeviceSettings,
    store: StateStore,
    sink: Arc<dyn EventSink>,
) -> (LinkHandle<H::Command>, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let kind = handler.kind();
    let driver = LinkDriver {
        link: DeviceLink::new(kind, settings),
        handler,
        store,
        sink,
        inbox: rx,
    };
    let task = tokio::spawn(driver.run());
    (LinkHandle { kind, tx }, task)
}

pub struct LinkDriver<H: DeviceHandler> {
    link: DeviceLink,
    handler: H,
    store: StateStore,
    sink: Arc<dyn EventSink>,
    inbox: mpsc::UnboundedReceiver<LinkInput<H::Command>>,
}

impl<H: DeviceHandler> LinkDriver<H> {
    pub async fn run(mut self) {
        let kind = self.link.kind();
        let mut buf = vec![0u8; MAX_DATAGRAM];
        debug!("{} link task started", kind);

        loop {
            let liveness = self.link.liveness_deadline();
            let keepalive = self.link.keepalive_at();
            let handler_deadline = self.handler.deadline();

            tokio::select! {
                input = self.inbox.recv() => match input {
                    Some(LinkInput::Reconcile(config)) => self.reconcile(config).await,
                    Some(LinkInput::Command { command, responder }) => {
                        self.command(command, responder).await
                    }
                    Some(LinkInput::Shutdown) | None => break,
                },
                received = self.link.recv(&mut buf) => match received {
                    Ok(len) => self.received(&buf[..len]).await,
                    // Nothing listening yet; the device may still come up.
                    Err(e) if e.kind() == std::io::ErrorKind::ConnectionRefused => {
                        debug!("{} refused a datagram", kind);
                    }
                    Err(e) => {
                        warn!("{} socket error: {}", kind, e);
                        self.teardown();
                    }
                },
                _ = sleep_opt(liveness) => {
                    warn!("{} did not answer in time, closing socket", kind);
                    self.teardown();
                }
                _ = sleep_opt(keepalive) => {
                    let now = Instant::now();
                    self.link.keepalive_fired(now);
                    let actions = self.handler.on_keepalive(now);
                    self.execute(actions).await;
                }
                _ = sleep_opt(handler_deadline) => {
                    let actions = self.handler.on_deadline(Instant::now());
                    self.execute(actions).await;
                }
            }
        }

        self.teardown();
        info!("{} link stopped", kind);
    }

    async fn reconcile(&mut self, config: DeviceConfig) {
        let actions = self.handler.configure(&config);
        let transition = self.link.reconcile(config.target.as_ref()).await;

        if transition.closed {
            self.handler.on_teardown();
            self.set_connected(false);
        }

        if transition.opened {
            if self.link.state() == crate::link::LinkState::Connected {
                self.set_connected(true);
            }
            let actions = self.handler.on_open(Instant::now());
            self.execute(actions).await;
        } else if self.link.is_open() {
            self.execute(actions).await;
        }
    }

    async fn command(&mut self, command: H::Command, responder: Option<Responder>) {
        if !self.link.is_open() {
            error!(
                "{} is not connected, dropping command {:?}",
                self.link.kind(),
                command
            );
            respond(responder, Err(CommandError::NotConnected(self.link.kind())));
            return;
        }
        debug!("{} command {:?}", self.link.kind(), command);
        let actions = self.handler.on_command(command, responder, Instant::now());
        self.execute(actions).await;
    }

    async fn received(&mut self, datagram: &[u8]) {
        let decoded = decode(datagram);
        for anomaly in &decoded.anomalies {
            warn!("{} sent a malformed message: {}", self.link.kind(), anomaly);
        }
        debug!("<- {} {}", self.link.kind(), decoded.message);

        if self.link.mark_alive() {
            self.set_connected(true);
        }
        let actions = self.handler.on_message(&decoded.message, Instant::now());
        self.execute(actions).await;
    }

    /// Perform actions in order. A transport failure tears the link down and
    /// fails any acks still pending in `actions`.
    async fn execute(&mut self, actions: Vec<Action>) {
        let mut actions = actions.into_iter();
        while let Some(action) = actions.next() {
            match action {
                Action::Send { message, ack } => match self.link.send(&message).await {
                    Ok(()) => {
                        self.handler.on_sent(&message, Instant::now());
                        respond(ack, Ok(()));
                    }
                    Err(LinkError::Encode(e)) => {
                        error!("Cannot encode {}: {}", message, e);
                        respond(ack, Err(CommandError::Invalid(e.to_string())));
                    }
                    Err(e) => {
                        warn!("{}", e);
                        respond(ack, Err(CommandError::Send(e.to_string())));
                        self.teardown();
                        self.abandon(actions);
                        return;
                    }
                },
                Action::Publish(event) => self.sink.publish(event),
                Action::Disconnect(reason) => {
                    warn!("Disconnecting {}: {}", self.link.kind(), reason);
                    self.teardown();
                    self.abandon(actions);
                    return;
                }
            }
        }
    }

    fn abandon(&self, actions: impl Iterator<Item = Action>) {
        for action in actions {
            if let Action::Send { ack, .. } = action {
                respond(ack, Err(CommandError::NotConnected(self.link.kind())));
            }
        }
    }

    fn teardown(&mut self) {
        self.link.teardown();
        self.handler.on_teardown();
        self.set_connected(false);
    }

    fn set_connected(&self, connected: bool) {
        if let Some(event) = self.store.set_connected(self.link.kind(), connected) {
            self.sink.publish(event);
        }
    }
}

async fn sleep_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use osc_codec::Message;
    use show_state::NullSink;

    use crate::config::DeviceTarget;

    /// Counts keepalives and teardowns, nothing else.
    struct Counting {
        keepalives: Arc<AtomicUsize>,
        teardowns: Arc<AtomicUsize>,
    }

    impl DeviceHandler for Counting {
        type Command = ();

        fn kind(&self) -> DeviceKind {
            DeviceKind::Timer
        }

        fn on_keepalive(&mut self, _now: Instant) -> Vec<Action> {
            self.keepalives.fetch_add(1, Ordering::SeqCst);
            vec![Action::send(Message::new(["subscribe"]))]
        }

        fn on_message(&mut self, _message: &Message, _now: Instant) -> Vec<Action> {
            Vec::new()
        }

        fn on_command(&mut self, _: (), _: Option<Responder>, _now: Instant) -> Vec<Action> {
            Vec::new()
        }

        fn on_teardown(&mut self) {
            self.teardowns.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn spawn_counting(
        settings: DeviceSettings,
    ) -> (LinkHandle<()>, JoinHandle<()>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let keepalives = Arc::new(AtomicUsize::new(0));
        let teardowns = Arc::new(AtomicUsize::new(0));
        let handler = Counting {
            keepalives: Arc::clone(&keepalives),
            teardowns: Arc::clone(&teardowns),
        };
        let (handle, task) = spawn_link(handler, settings, StateStore::new(), Arc::new(NullSink));
        (handle, task, keepalives, teardowns)
    }

    fn settings(keepalive: Duration, handshake: Option<Duration>) -> DeviceSettings {
        DeviceSettings {
            local_port: 0,
            remote_port: 9,
            keepalive: Some(keepalive),
            handshake,
        }
    }

    async fn sink() -> (tokio::net::UdpSocket, DeviceConfig) {
        let socket = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = socket.local_addr().unwrap().port();
        let config = DeviceConfig {
            target: Some(DeviceTarget::new("127.0.0.1").with_port(port)),
            channel: None,
        };
        (socket, config)
    }

    async fn wait_until(what: &AtomicUsize, at_least: usize) {
        for _ in 0..200 {
            if what.load(Ordering::SeqCst) >= at_least {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("Timeout waiting for {at_least}, saw {}", what.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_keepalive_without_socket() {
        let (handle, task, keepalives, _) =
            spawn_counting(settings(Duration::from_millis(100), None));

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(keepalives.load(Ordering::SeqCst), 0);

        handle.shutdown();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_keepalive_repeats_and_stops_when_cleared() {
        let (device, config) = sink().await;
        let (handle, task, keepalives, _) =
            spawn_counting(settings(Duration::from_millis(20), None));

        handle.reconcile(config);
        wait_until(&keepalives, 3).await;

        let mut buf = [0u8; 64];
        let (_, first) = device.recv_from(&mut buf).await.unwrap();
        let (_, second) = device.recv_from(&mut buf).await.unwrap();
        assert_eq!(first, second);

        handle.reconcile(DeviceConfig::default());
        tokio::time::sleep(Duration::from_millis(50)).await;
        let settled = keepalives.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(keepalives.load(Ordering::SeqCst), settled);

        handle.shutdown();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_silent_device_is_torn_down_after_handshake() {
        let (_device, config) = sink().await;
        let (handle, task, keepalives, teardowns) = spawn_counting(settings(
            Duration::from_secs(60),
            Some(Duration::from_millis(30)),
        ));

        handle.reconcile(config.clone());
        wait_until(&teardowns, 1).await;

        // The next reconcile reopens and the window starts over.
        handle.reconcile(config);
        wait_until(&teardowns, 2).await;
        assert_eq!(keepalives.load(Ordering::SeqCst), 0);

        handle.shutdown();
        task.await.unwrap();
    }
}
