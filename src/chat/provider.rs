//! Completion provider abstraction.
//!
//! The session only sees a boxed stream of UTF-8 fragments. How the provider
//! talks to its backend (and whether it performs tool lookups along the way)
//! is opaque here.

use std::future::Future;
use std::pin::Pin;

use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::chat::errors::ProviderResult;
use crate::chat::turn::HistoryEntry;

/// Boxed future type for provider operations.
pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Lazy, non-restartable sequence of text fragments.
pub type TextStream = BoxStream<'static, ProviderResult<String>>;

/// Input for a streaming completion.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Conversation preceding the new user message.
    pub history: Vec<HistoryEntry>,
    /// The new user message.
    pub message: String,
}

/// Streaming completion backend.
pub trait CompletionProvider: Send + Sync {
    /// Human-readable provider name for logs.
    fn name(&self) -> &str;

    /// Open a fragment stream for the request.
    ///
    /// # Errors
    /// Returns an error if the provider cannot be reached or rejects the request.
    fn open_stream(&self, request: CompletionRequest) -> ProviderFuture<'_, ProviderResult<TextStream>>;
}
