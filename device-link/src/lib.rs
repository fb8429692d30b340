//! # device-link
//!
//! UDP links to the show devices: a mixing console, a countdown timer and a
//! cue-automation tool.
//!
//! Each device gets one task that owns its socket. A [`ConfigWatcher`] polls a
//! [`ConfigSource`] and tells every link where its device lives; the link opens,
//! replaces or closes its socket to match. Datagrams are decoded, projected
//! into the shared state and published as [`show_state::ShowEvent`]s.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use device_link::{LinkSettings, SharedConfig, ShowConfig, ShowLinks, TimerCommand};
//! use show_state::NullSink;
//!
//! # async fn run() -> device_link::Result<()> {
//! let config = SharedConfig::new(ShowConfig::default().with_timer("10.0.0.21"));
//! let links = ShowLinks::start(LinkSettings::default(), Arc::new(config), Arc::new(NullSink))?;
//!
//! let outcome = links.timer.request(TimerCommand::Start).outcome().await;
//! println!("start: {outcome:?}");
//!
//! links.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod devices;
pub mod driver;
pub mod error;
pub mod handler;
pub mod link;
pub mod queue;
pub mod system;
pub mod watcher;

pub use config::{
    ConfigSource, DeviceConfig, DeviceSettings, DeviceTarget, JsonFileConfig, LinkSettings,
    SharedConfig, ShowConfig,
};
pub use devices::{CueCommand, CueDevice, MixerCommand, MixerDevice, TimerCommand, TimerDevice};
pub use driver::{spawn_link, LinkHandle, Reconcile, Ticket};
pub use error::{CommandError, CommandResult, LinkError, Responder, Result};
pub use handler::{Action, DeviceHandler};
pub use link::{DeviceLink, LinkState};
pub use queue::{CommandQueue, QueueState};
pub use system::ShowLinks;
pub use watcher::ConfigWatcher;
