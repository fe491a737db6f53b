//! Error types for the cnterra core library.

use thiserror::Error;

/// Result type alias using the core `Error`.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for relay configuration and envelope handling.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Bus message is not a valid envelope
    #[error("Invalid envelope: {0}")]
    Envelope(#[from] serde_json::Error),

    /// Envelope payload is not valid standard base64
    #[error("Invalid payload encoding: {0}")]
    Payload(#[from] base64::DecodeError),
}
