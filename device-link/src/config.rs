//! Configuration for device links
//!
//! Two kinds of configuration live here:
//!
//! - [`ShowConfig`]: the live, user-editable device addresses and mixer
//!   channel, read through a [`ConfigSource`] on every poll tick
//! - [`LinkSettings`]: fixed tunables (ports, intervals, timeouts) chosen when
//!   the links start

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use show_state::{DeviceKind, MeterTap};
use tracing::warn;

use crate::error::{LinkError, Result};

// ============================================================================
// Live configuration
// ============================================================================

/// Device addresses as stored in the settings file.
///
/// Unknown keys are ignored so the struct can be read straight from a larger
/// settings document. Addresses are a host name, an IP, or `host:port`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowConfig {
    #[serde(default, alias = "xairAddress")]
    pub mixer_address: Option<String>,

    #[serde(default)]
    pub timer_address: Option<String>,

    #[serde(default, alias = "qlabAddress")]
    pub cue_address: Option<String>,

    /// 1-based mixer channel to watch
    #[serde(default, alias = "musicChannel")]
    pub mixer_channel: Option<u8>,
}

impl ShowConfig {
    pub fn with_mixer(mut self, address: impl Into<String>, channel: u8) -> Self {
        self.mixer_address = Some(address.into());
        self.mixer_channel = Some(channel);
        self
    }

    pub fn with_timer(mut self, address: impl Into<String>) -> Self {
        self.timer_address = Some(address.into());
        self
    }

    pub fn with_cues(mut self, address: impl Into<String>) -> Self {
        self.cue_address = Some(address.into());
        self
    }

    /// The slice of configuration one device link cares about.
    pub fn device(&self, kind: DeviceKind) -> DeviceConfig {
        let address = match kind {
            DeviceKind::Mixer => &self.mixer_address,
            DeviceKind::Timer => &self.timer_address,
            DeviceKind::Cues => &self.cue_address,
        };
        let channel = match kind {
            DeviceKind::Mixer => self.mixer_channel.filter(|c| (1..=32).contains(c)),
            _ => None,
        };
        DeviceConfig {
            target: address.as_deref().and_then(DeviceTarget::parse),
            channel,
        }
    }
}

/// Per-device view of [`ShowConfig`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceConfig {
    pub target: Option<DeviceTarget>,
    pub channel: Option<u8>,
}

/// Where a device lives. A missing port means the device's default port.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceTarget {
    pub host: String,
    pub port: Option<u16>,
}

impl DeviceTarget {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Parse `host`, `host:port` or `[v6]:port`. Blank input is no target.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }
        if let Ok(addr) = s.parse::<std::net::SocketAddr>() {
            return Some(Self::new(addr.ip().to_string()).with_port(addr.port()));
        }
        if let Some((host, port)) = s.rsplit_once(':') {
            if !host.contains(':') {
                if let Ok(port) = port.parse::<u16>() {
                    return Some(Self::new(host).with_port(port));
                }
            }
        }
        Some(Self::new(s))
    }

    pub fn port_or(&self, default: u16) -> u16 {
        self.port.unwrap_or(default)
    }
}

impl fmt::Display for DeviceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) if self.host.contains(':') => write!(f, "[{}]:{}", self.host, port),
            Some(port) => write!(f, "{}:{}", self.host, port),
            None => f.write_str(&self.host),
        }
    }
}

/// Anything that can report the current configuration.
///
/// Polled once per tick; implementations must be cheap and must not fail.
/// A source that cannot read fresh data returns its last good value.
pub trait ConfigSource: Send + Sync {
    fn snapshot(&self) -> ShowConfig;
}

/// In-memory configuration shared with whoever edits it.
#[derive(Debug, Clone, Default)]
pub struct SharedConfig {
    inner: Arc<RwLock<ShowConfig>>,
}

impl SharedConfig {
    pub fn new(config: ShowConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    pub fn set(&self, config: ShowConfig) {
        *self.inner.write() = config;
    }

    pub fn update(&self, f: impl FnOnce(&mut ShowConfig)) {
        f(&mut self.inner.write());
    }
}

impl ConfigSource for SharedConfig {
    fn snapshot(&self) -> ShowConfig {
        self.inner.read().clone()
    }
}

/// Settings file re-read on every poll.
///
/// A missing or unparseable file yields the last value that did parse; the
/// failure is logged once until it changes.
#[derive(Debug)]
pub struct JsonFileConfig {
    path: PathBuf,
    last_good: Mutex<ShowConfig>,
    last_error: Mutex<Option<String>>,
}

impl JsonFileConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_good: Mutex::new(ShowConfig::default()),
            last_error: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> std::result::Result<ShowConfig, String> {
        let text = std::fs::read_to_string(&self.path)
            .map_err(|e| format!("cannot read {}: {}", self.path.display(), e))?;
        serde_json::from_str(&text)
            .map_err(|e| format!("cannot parse {}: {}", self.path.display(), e))
    }
}

impl ConfigSource for JsonFileConfig {
    fn snapshot(&self) -> ShowConfig {
        match self.read() {
            Ok(config) => {
                *self.last_error.lock() = None;
                *self.last_good.lock() = config.clone();
                config
            }
            Err(e) => {
                let mut last_error = self.last_error.lock();
                if last_error.as_deref() != Some(e.as_str()) {
                    warn!("Keeping previous settings: {}", e);
                    *last_error = Some(e);
                }
                self.last_good.lock().clone()
            }
        }
    }
}

// ============================================================================
// Link tunables
// ============================================================================

/// Socket and timing parameters for one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSettings {
    /// Local UDP port to bind (0 picks an ephemeral port)
    pub local_port: u16,

    /// Device port used when the target has none
    pub remote_port: u16,

    /// Interval for re-sending the device subscription
    pub keepalive: Option<Duration>,

    /// Window in which the first reply must arrive before the link counts
    /// as connected; `None` means connected as soon as the socket is
    pub handshake: Option<Duration>,
}

/// Configuration for all device links
#[derive(Debug, Clone, PartialEq)]
pub struct LinkSettings {
    /// Interval between configuration polls
    /// Default: 1 second
    pub poll_interval: Duration,

    /// Time a queued cue command may wait for its reply
    /// Default: 2 seconds
    pub command_timeout: Duration,

    /// Mixer: bind 52361, send to 10023, resubscribe every 9 seconds
    pub mixer: DeviceSettings,

    /// Timer: bind 61616, send to 8000, resubscribe every 8 seconds
    pub timer: DeviceSettings,

    /// Cue tool: bind 53001, send to 53000, 2 second handshake
    pub cues: DeviceSettings,

    /// Which meter sample(s) represent the watched mixer channel
    pub meter_tap: MeterTap,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            command_timeout: Duration::from_secs(2),
            mixer: DeviceSettings {
                local_port: 52361,
                remote_port: 10023,
                keepalive: Some(Duration::from_secs(9)),
                handshake: None,
            },
            timer: DeviceSettings {
                local_port: 61616,
                remote_port: 8000,
                keepalive: Some(Duration::from_secs(8)),
                handshake: None,
            },
            cues: DeviceSettings {
                local_port: 53001,
                remote_port: 53000,
                keepalive: None,
                handshake: Some(Duration::from_secs(2)),
            },
            meter_tap: MeterTap::default(),
        }
    }
}

impl LinkSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default timings with ephemeral local ports, for running next to
    /// another instance or in tests.
    pub fn ephemeral() -> Self {
        let mut settings = Self::default();
        for kind in DeviceKind::ALL {
            settings.device_mut(kind).local_port = 0;
        }
        settings
    }

    /// Mixer console on the XAir port (10024) instead of the X32 one.
    pub fn xair() -> Self {
        let mut settings = Self::default();
        settings.mixer.remote_port = 10024;
        settings
    }

    pub fn device(&self, kind: DeviceKind) -> &DeviceSettings {
        match kind {
            DeviceKind::Mixer => &self.mixer,
            DeviceKind::Timer => &self.timer,
            DeviceKind::Cues => &self.cues,
        }
    }

    pub fn device_mut(&mut self, kind: DeviceKind) -> &mut DeviceSettings {
        match kind {
            DeviceKind::Mixer => &mut self.mixer,
            DeviceKind::Timer => &mut self.timer,
            DeviceKind::Cues => &mut self.cues,
        }
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(LinkError::Configuration(
                "Poll interval must be greater than 0".to_string(),
            ));
        }

        if self.command_timeout.is_zero() {
            return Err(LinkError::Configuration(
                "Command timeout must be greater than 0".to_string(),
            ));
        }

        for kind in DeviceKind::ALL {
            let device = self.device(kind);
            if device.remote_port == 0 {
                return Err(LinkError::Configuration(format!(
                    "{kind} remote port must be greater than 0"
                )));
            }
            if device.keepalive.is_some_and(|d| d.is_zero()) {
                return Err(LinkError::Configuration(format!(
                    "{kind} keepalive interval must be greater than 0"
                )));
            }
            if device.handshake.is_some_and(|d| d.is_zero()) {
                return Err(LinkError::Configuration(format!(
                    "{kind} handshake window must be greater than 0"
                )));
            }
        }

        let locals: Vec<u16> = DeviceKind::ALL
            .iter()
            .map(|k| self.device(*k).local_port)
            .filter(|p| *p != 0)
            .collect();
        for (i, port) in locals.iter().enumerate() {
            if locals[i + 1..].contains(port) {
                return Err(LinkError::Configuration(format!(
                    "Local port {port} is used by more than one device"
                )));
            }
        }

        Ok(())
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn with_handshake(mut self, kind: DeviceKind, window: Option<Duration>) -> Self {
        self.device_mut(kind).handshake = window;
        self
    }

    pub fn with_keepalive(mut self, kind: DeviceKind, interval: Option<Duration>) -> Self {
        self.device_mut(kind).keepalive = interval;
        self
    }

    pub fn with_local_port(mut self, kind: DeviceKind, port: u16) -> Self {
        self.device_mut(kind).local_port = port;
        self
    }

    pub fn with_remote_port(mut self, kind: DeviceKind, port: u16) -> Self {
        self.device_mut(kind).remote_port = port;
        self
    }

    pub fn with_meter_tap(mut self, tap: MeterTap) -> Self {
        self.meter_tap = tap;
        self
    }
}
