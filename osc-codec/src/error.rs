//! Error types for encoding operations

use thiserror::Error;

/// Errors that prevent a [`Message`](crate::Message) from being put on the wire.
///
/// Decoding has no error type: malformed input is reported through
/// [`Anomaly`](crate::Anomaly) values alongside a partial message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// The address has no segments
    #[error("Message address is empty")]
    EmptyAddress,

    /// A segment is empty or contains `/` or NUL
    #[error("Invalid address segment `{0}`")]
    InvalidSegment(String),

    /// A string argument contains an embedded NUL
    #[error("String argument {index} contains a NUL byte")]
    NulInString { index: usize },

    /// Blobs are only ever received from devices, never sent
    #[error("Blob argument {index} cannot be encoded")]
    BlobArgument { index: usize },
}

/// Result type alias for encoding operations
pub type Result<T> = std::result::Result<T, EncodeError>;
