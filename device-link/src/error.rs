//! Error types for device-link

use std::io;
use std::time::Duration;

use osc_codec::EncodeError;
use show_state::DeviceKind;
use tokio::sync::oneshot;

/// Errors raised by a link's transport or configuration.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// The local socket could not be bound
    #[error("Failed to bind {device} socket to port {port}: {source}")]
    Bind {
        device: DeviceKind,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// The socket could not be connected to the device
    #[error("Failed to connect {device} socket to {target}: {source}")]
    Connect {
        device: DeviceKind,
        target: String,
        #[source]
        source: io::Error,
    },

    /// A datagram could not be sent
    #[error("Failed to send to {device}: {source}")]
    Send {
        device: DeviceKind,
        #[source]
        source: io::Error,
    },

    /// Outbound message could not be encoded
    #[error("Failed to encode message: {0}")]
    Encode(#[from] EncodeError),

    /// No socket is open
    #[error("{0} link has no open socket")]
    NotOpen(DeviceKind),

    /// Invalid configuration provided
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An error occurred during shutdown
    #[error("Shutdown error: {0}")]
    Shutdown(String),
}

/// Convenience type alias for Results using LinkError.
pub type Result<T> = std::result::Result<T, LinkError>;

/// Why a command did not take effect.
///
/// Cloneable so one failure can be reported to every caller whose command
/// was discarded with it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// The device has no open socket
    #[error("{0} is not connected")]
    NotConnected(DeviceKind),

    /// Configuration needed by the command is missing
    #[error("Not configured: {0}")]
    Unconfigured(String),

    /// The command itself is malformed
    #[error("Invalid command: {0}")]
    Invalid(String),

    /// The device answered with a non-ok status
    #[error("Device rejected command with status `{0}`")]
    Rejected(String),

    /// No matching reply arrived in time
    #[error("No reply within {0:?}")]
    TimedOut(Duration),

    /// Discarded because an earlier command failed or the link closed
    #[error("Command discarded: {0}")]
    Flushed(String),

    /// The datagram could not be written
    #[error("Send failed: {0}")]
    Send(String),

    /// The link task is gone
    #[error("Link stopped")]
    LinkStopped,
}

/// Outcome of a single command.
pub type CommandResult = std::result::Result<(), CommandError>;

/// One-shot channel a link resolves with a command's outcome.
pub type Responder = oneshot::Sender<CommandResult>;

/// Resolve `responder` if there is one. A caller that stopped waiting is not
/// an error.
pub(crate) fn respond(responder: Option<Responder>, result: CommandResult) {
    if let Some(responder) = responder {
        let _ = responder.send(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = CommandError::NotConnected(DeviceKind::Timer);
        assert_eq!(error.to_string(), "timer is not connected");

        let error = CommandError::Rejected("error".to_string());
        assert_eq!(error.to_string(), "Device rejected command with status `error`");

        let error = LinkError::Bind {
            device: DeviceKind::Mixer,
            port: 52361,
            source: io::Error::from(io::ErrorKind::AddrInUse),
        };
        assert!(error.to_string().starts_with("Failed to bind mixer socket to port 52361"));
    }

    #[test]
    fn test_respond_tolerates_dropped_receiver() {
        let (tx, rx) = oneshot::channel();
        drop(rx);
        respond(Some(tx), Ok(()));
        respond(None, Err(CommandError::LinkStopped));
    }
}
