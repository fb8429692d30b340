//! All device links plus the watcher, started and stopped together

use std::sync::Arc;
use std::time::Duration;

use show_state::{EventSink, Projector, ShowState, StateStore};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::info;

use crate::config::{ConfigSource, LinkSettings};
use crate::devices::{CueCommand, CueDevice, MixerCommand, MixerDevice, TimerCommand, TimerDevice};
use crate::driver::{spawn_link, LinkHandle, Reconcile};
use crate::error::{LinkError, Result};
use crate::queue::CommandQueue;
use crate::watcher::ConfigWatcher;

/// The running show: one link per device and the configuration watcher.
pub struct ShowLinks {
    pub mixer: LinkHandle<MixerCommand>,
    pub timer: LinkHandle<TimerCommand>,
    pub cues: LinkHandle<CueCommand>,
    store: StateStore,
    watcher: ConfigWatcher,
    tasks: Vec<JoinHandle<()>>,
}

impl ShowLinks {
    /// Spawn everything on the current tokio runtime.
    pub fn start(
        settings: LinkSettings,
        source: Arc<dyn ConfigSource>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self> {
        Self::start_with_store(settings, source, sink, StateStore::new())
    }

    /// Like [`start`](Self::start), projecting into an existing store.
    pub fn start_with_store(
        settings: LinkSettings,
        source: Arc<dyn ConfigSource>,
        sink: Arc<dyn EventSink>,
        store: StateStore,
    ) -> Result<Self> {
        settings.validate()?;

        let projector = Projector::new(store.clone()).with_meter_tap(settings.meter_tap);

        let (mixer, mixer_task) = spawn_link(
            MixerDevice::new(projector.clone()),
            settings.mixer.clone(),
            store.clone(),
            Arc::clone(&sink),
        );
        let (timer, timer_task) = spawn_link(
            TimerDevice::new(projector.clone()),
            settings.timer.clone(),
            store.clone(),
            Arc::clone(&sink),
        );
        let (cues, cues_task) = spawn_link(
            CueDevice::new(projector, CommandQueue::new(settings.command_timeout)),
            settings.cues.clone(),
            store.clone(),
            sink,
        );

        let links: Vec<Arc<dyn Reconcile>> = vec![
            Arc::new(mixer.clone()),
            Arc::new(timer.clone()),
            Arc::new(cues.clone()),
        ];
        let watcher = ConfigWatcher::start(source, links, settings.poll_interval);

        info!("Show links started");
        Ok(Self {
            mixer,
            timer,
            cues,
            store,
            watcher,
            tasks: vec![mixer_task, timer_task, cues_task],
        })
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn snapshot(&self) -> ShowState {
        self.store.snapshot()
    }

    /// Stop polling, close every socket and wait for the link tasks.
    pub async fn shutdown(self) -> Result<()> {
        self.watcher.shutdown().await?;

        self.mixer.shutdown();
        self.timer.shutdown();
        self.cues.shutdown();

        for task in self.tasks {
            match timeout(Duration::from_secs(5), task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Err(LinkError::Shutdown(format!("Link task panicked: {e}"))),
                Err(_) => {
                    return Err(LinkError::Shutdown(
                        "Link task shutdown timed out after 5 seconds".to_string(),
                    ))
                }
            }
        }
        info!("Show links stopped");
        Ok(())
    }
}
