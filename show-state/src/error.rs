//! Error types for show-state

use thiserror::Error;

/// Result type for show-state operations
pub type Result<T> = std::result::Result<T, StateError>;

/// Errors raised while projecting device payloads.
///
/// Projection errors never reach callers of a device link; they are logged
/// and the offending message is dropped.
#[derive(Error, Debug)]
pub enum StateError {
    /// Payload did not have the expected layout
    #[error("Parse error: {0}")]
    Parse(String),

    /// Argument of the wrong type for its address
    #[error("Unexpected argument for {address}: expected {expected}")]
    UnexpectedArgument {
        address: String,
        expected: &'static str,
    },

    /// JSON reply body could not be read
    #[error("Invalid JSON reply: {0}")]
    Json(#[from] serde_json::Error),

    /// Device answered with a non-ok status
    #[error("Device reported status `{0}`")]
    Status(String),
}
