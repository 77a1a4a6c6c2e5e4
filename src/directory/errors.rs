//! Error types for the directory data source.

use thiserror::Error;

/// Directory data source error type.
#[derive(Debug, Error)]
pub enum DataError {
    /// Transport-level failure talking to the backend.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    /// Backend answered with a non-success status.
    #[error("{endpoint} returned status {status}")]
    Status {
        /// Path that was requested.
        endpoint: &'static str,
        /// HTTP status code.
        status: u16,
    },
    /// Payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
    /// Backend URL is unusable.
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
}

/// Convenience result alias for directory operations.
pub type DataResult<T> = Result<T, DataError>;
