//! Background worker thread hosting the device links
//!
//! Spawns a thread with its own single-threaded tokio runtime. Every link,
//! the configuration watcher and all of their timers run there; the sync
//! [`ShowControl`](crate::ShowControl) talks to them through link handles.

use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};

use device_link::{
    ConfigSource, CueCommand, LinkHandle, LinkSettings, MixerCommand, ShowLinks, TimerCommand,
};
use show_state::{ShowEvent, StateStore};
use tokio::sync::oneshot;

use crate::error::{ControlError, Result};

/// Handles passed back to the caller once the links are running
pub struct Handles {
    pub mixer: LinkHandle<MixerCommand>,
    pub timer: LinkHandle<TimerCommand>,
    pub cues: LinkHandle<CueCommand>,
}

/// Spawns the worker and waits until its links are up.
///
/// The worker runs until `shutdown_rx` fires or its sender is dropped.
pub fn spawn_show_worker(
    settings: LinkSettings,
    source: Arc<dyn ConfigSource>,
    store: StateStore,
    event_tx: mpsc::Sender<ShowEvent>,
    shutdown_rx: oneshot::Receiver<()>,
) -> Result<(Handles, JoinHandle<()>)> {
    let (ready_tx, ready_rx) = mpsc::channel::<Result<Handles>>();

    let worker = thread::Builder::new()
        .name("showctl-worker".to_string())
        .spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    tracing::error!("Failed to create tokio runtime for show worker: {}", e);
                    let _ = ready_tx.send(Err(ControlError::WorkerStartup(e.to_string())));
                    return;
                }
            };

            rt.block_on(run_links(settings, source, store, event_tx, ready_tx, shutdown_rx));
        })
        .map_err(|e| ControlError::WorkerStartup(e.to_string()))?;

    match ready_rx.recv() {
        Ok(Ok(handles)) => Ok((handles, worker)),
        Ok(Err(e)) => {
            let _ = worker.join();
            Err(e)
        }
        Err(_) => {
            let _ = worker.join();
            Err(ControlError::WorkerDisconnected)
        }
    }
}

async fn run_links(
    settings: LinkSettings,
    source: Arc<dyn ConfigSource>,
    store: StateStore,
    event_tx: mpsc::Sender<ShowEvent>,
    ready_tx: mpsc::Sender<Result<Handles>>,
    shutdown_rx: oneshot::Receiver<()>,
) {
    let links = match ShowLinks::start_with_store(settings, source, Arc::new(event_tx), store) {
        Ok(links) => links,
        Err(e) => {
            tracing::error!("Failed to start show links: {}", e);
            let _ = ready_tx.send(Err(e.into()));
            return;
        }
    };

    let handles = Handles {
        mixer: links.mixer.clone(),
        timer: links.timer.clone(),
        cues: links.cues.clone(),
    };
    if ready_tx.send(Ok(handles)).is_err() {
        tracing::debug!("Show control went away during startup");
    }
    tracing::info!("Show worker started");

    // A dropped sender counts as a shutdown request too.
    let _ = shutdown_rx.await;

    if let Err(e) = links.shutdown().await {
        tracing::warn!("Show links did not stop cleanly: {}", e);
    }
    tracing::info!("Show worker shut down");
}
