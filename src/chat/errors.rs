//! Error types for the chat subsystem.

use thiserror::Error;

/// Failure reported by a completion provider, either when opening the stream
/// or while it is being consumed.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Provider client could not be built.
    #[error("http client error: {0}")]
    HttpClient(#[from] rig::http_client::Error),
    /// Completion call failed (transport, provider or decoding error).
    #[error("completion error: {0}")]
    Completion(#[from] rig::completion::CompletionError),
    /// Request had nothing to send.
    #[error("empty request: {0}")]
    EmptyRequest(String),
    /// Provider-specific failure without a richer type.
    #[error("provider error: {0}")]
    Other(String),
}

impl ProviderError {
    /// Short label for structured logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::HttpClient(_) => "http_client",
            Self::Completion(_) => "completion",
            Self::EmptyRequest(_) => "empty_request",
            Self::Other(_) => "other",
        }
    }
}

/// Convenience result alias for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;
