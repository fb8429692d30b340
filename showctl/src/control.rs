//! Sync-first show control
//!
//! Provides a fully synchronous API over the device links. All async
//! operations are hidden in a background worker thread.

use std::path::Path;
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;

use device_link::{
    ConfigSource, CueCommand, JsonFileConfig, LinkHandle, LinkSettings, MixerCommand, Ticket,
    TimerCommand,
};
use parking_lot::Mutex;
use show_state::{ShowEvent, ShowState, StateStore};
use tokio::sync::oneshot;

use crate::command::{Routed, ShowCommand};
use crate::error::{ControlError, Result};
use crate::iter::EventIter;
use crate::worker::spawn_show_worker;

/// Sync handle to a running show
///
/// # Example
///
/// ```rust,no_run
/// use showctl::{ShowCommand, ShowControl};
///
/// let control = ShowControl::from_settings_file("settings.json")?;
///
/// control.execute(ShowCommand::StartTimer)?;
/// control.dispatch(ShowCommand::SetFader { level: 0.8 })?;
///
/// for event in control.events() {
///     println!("{}", serde_json::to_string(&event)?);
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct ShowControl {
    mixer: LinkHandle<MixerCommand>,
    timer: LinkHandle<TimerCommand>,
    cues: LinkHandle<CueCommand>,

    /// Shared with the worker's projections
    store: StateStore,

    /// Receive events from background worker
    event_rx: Arc<Mutex<mpsc::Receiver<ShowEvent>>>,

    shutdown_tx: Option<oneshot::Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl ShowControl {
    /// Start the links with `settings`, polling `source` for device
    /// addresses. Blocks until the links are running.
    pub fn start(settings: LinkSettings, source: Arc<dyn ConfigSource>) -> Result<Self> {
        let store = StateStore::new();
        let (event_tx, event_rx) = mpsc::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let (handles, worker) =
            spawn_show_worker(settings, source, store.clone(), event_tx, shutdown_rx)?;

        Ok(Self {
            mixer: handles.mixer,
            timer: handles.timer,
            cues: handles.cues,
            store,
            event_rx: Arc::new(Mutex::new(event_rx)),
            shutdown_tx: Some(shutdown_tx),
            worker: Some(worker),
        })
    }

    /// Default settings, device addresses read from a JSON settings file.
    pub fn from_settings_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::start(
            LinkSettings::default(),
            Arc::new(JsonFileConfig::new(path.as_ref())),
        )
    }

    /// Send a command without waiting for its outcome. Failures are logged by
    /// the link.
    pub fn dispatch(&self, command: ShowCommand) -> Result<()> {
        match command.route() {
            Routed::Mixer(command) => self.mixer.command(command)?,
            Routed::Timer(command) => self.timer.command(command)?,
            Routed::Cues(command) => self.cues.command(command)?,
        }
        Ok(())
    }

    /// Send a command and return a ticket for its outcome.
    pub fn request(&self, command: ShowCommand) -> Ticket {
        match command.route() {
            Routed::Mixer(command) => self.mixer.request(command),
            Routed::Timer(command) => self.timer.request(command),
            Routed::Cues(command) => self.cues.request(command),
        }
    }

    /// Send a command and block until it completes.
    ///
    /// # Panics
    ///
    /// Panics if called from within an asynchronous execution context.
    pub fn execute(&self, command: ShowCommand) -> Result<()> {
        Ok(self.request(command).blocking_outcome()?)
    }

    /// Current state of every device.
    pub fn snapshot(&self) -> ShowState {
        self.store.snapshot()
    }

    /// Get a blocking iterator over events
    pub fn events(&self) -> EventIter {
        EventIter::new(Arc::clone(&self.event_rx))
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Stop the links and wait for the worker thread to exit.
    pub fn shutdown(mut self) -> Result<()> {
        self.stop()
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        match self.worker.take() {
            Some(worker) => worker.join().map_err(|_| ControlError::WorkerDisconnected),
            None => Ok(()),
        }
    }
}

impl Drop for ShowControl {
    fn drop(&mut self) {
        tracing::debug!("ShowControl dropping, stopping worker");
        if let Err(e) = self.stop() {
            tracing::warn!("Show worker did not stop cleanly: {}", e);
        }
    }
}
