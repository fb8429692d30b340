use device_link::{CommandError, LinkError};
use thiserror::Error;

/// Errors surfaced by [`ShowControl`](crate::ShowControl)
#[derive(Error, Debug)]
pub enum ControlError {
    /// Links could not be started or stopped cleanly
    #[error(transparent)]
    Link(#[from] LinkError),

    /// A tracked command failed
    #[error(transparent)]
    Command(#[from] CommandError),

    /// The worker thread could not be started
    #[error("Failed to start show worker: {0}")]
    WorkerStartup(String),

    /// The worker thread is gone
    #[error("Show worker has stopped")]
    WorkerDisconnected,

    /// A command line could not be parsed
    #[error("Invalid command: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Result type for facade operations
pub type Result<T> = std::result::Result<T, ControlError>;
