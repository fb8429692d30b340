//! Configuration polling
//!
//! The [`ConfigWatcher`] runs a background task that snapshots the
//! [`ConfigSource`] on a fixed interval and hands every link its slice of the
//! configuration. Links decide for themselves whether anything changed.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, warn};

use crate::config::ConfigSource;
use crate::driver::Reconcile;
use crate::error::{LinkError, Result};

pub struct ConfigWatcher {
    /// Handle to the background poll task
    background_task: Option<JoinHandle<()>>,
    /// Channel for signaling shutdown
    shutdown_tx: Option<mpsc::Sender<()>>,
}

impl ConfigWatcher {
    /// Start polling. The first poll happens immediately.
    pub fn start(
        source: Arc<dyn ConfigSource>,
        links: Vec<Arc<dyn Reconcile>>,
        poll_interval: Duration,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let background_task = tokio::spawn(Self::poll_task(
            source,
            links,
            poll_interval,
            shutdown_rx,
        ));

        Self {
            background_task: Some(background_task),
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Stop polling, waiting up to 5 seconds for the task to finish.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(()).await;
        }

        if let Some(task) = self.background_task.take() {
            match timeout(Duration::from_secs(5), task).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(LinkError::Shutdown(format!("Config watcher panicked: {e}"))),
                Err(_) => Err(LinkError::Shutdown(
                    "Config watcher shutdown timed out after 5 seconds".to_string(),
                )),
            }
        } else {
            Ok(())
        }
    }

    async fn poll_task(
        source: Arc<dyn ConfigSource>,
        links: Vec<Arc<dyn Reconcile>>,
        poll_interval: Duration,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        let mut ticker = interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let config = source.snapshot();
                    for link in &links {
                        if !link.reconcile(config.device(link.kind())) {
                            warn!("{} link is gone, skipping reconcile", link.kind());
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    debug!("Config watcher stopping");
                    break;
                }
            }
        }
    }
}

impl Drop for ConfigWatcher {
    fn drop(&mut self) {
        if let Some(task) = self.background_task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DeviceConfig, SharedConfig, ShowConfig};
    use parking_lot::Mutex;
    use show_state::DeviceKind;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<DeviceConfig>>,
    }

    impl Reconcile for Recorder {
        fn kind(&self) -> DeviceKind {
            DeviceKind::Timer
        }

        fn reconcile(&self, config: DeviceConfig) -> bool {
            self.seen.lock().push(config);
            true
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_on_interval() {
        let shared = SharedConfig::new(ShowConfig::default().with_timer("10.0.0.5"));
        let recorder = Arc::new(Recorder::default());
        let watcher = ConfigWatcher::start(
            Arc::new(shared.clone()),
            vec![recorder.clone() as Arc<dyn Reconcile>],
            Duration::from_secs(1),
        );

        tokio::time::sleep(Duration::from_millis(2500)).await;
        shared.set(ShowConfig::default());
        tokio::time::sleep(Duration::from_secs(1)).await;
        watcher.shutdown().await.unwrap();

        let seen = recorder.seen.lock();
        assert_eq!(seen.len(), 4);
        assert_eq!(
            seen[0].target.as_ref().map(|t| t.host.as_str()),
            Some("10.0.0.5")
        );
        assert_eq!(seen[3].target, None);
    }
}
