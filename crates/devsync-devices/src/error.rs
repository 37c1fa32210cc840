//! Error types for the device engine.

use thiserror::Error;

/// Failure of a single HTTP call.
///
/// Any HTTP status is a response; only failures to get one end up here.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Connection refused, DNS failure, TLS failure
    #[error("Connection error: {0}")]
    Connection(String),

    /// No response within the configured timeout
    #[error("Request timed out after {0}s")]
    Timeout(u64),

    /// Method or URL cannot be turned into a request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Response body could not be read
    #[error("Body error: {0}")]
    Body(String),

    #[error("Transport error: {0}")]
    Other(String),
}

/// Error returned by property reads and writes.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Configuration(#[from] devsync_core::Error),

    /// The synchronizer was stopped
    #[error("Synchronizer stopped")]
    Stopped,
}

/// Result type for synchronizer operations.
pub type SyncResult<T> = std::result::Result<T, SyncError>;
