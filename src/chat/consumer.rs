//! Adapts a fragment stream into message store updates.

use std::future::Future;

use futures::{Stream, StreamExt};
use tracing::debug;

use crate::chat::errors::ProviderError;
use crate::chat::ids::TurnId;
use crate::chat::store::MessageStore;

/// How a consumed stream ended.
#[derive(Debug)]
pub enum StreamEnd {
    /// The provider signalled completion.
    Completed {
        /// Number of fragments applied.
        chunks: usize,
    },
    /// The provider failed mid-stream; partial text must not stand.
    Failed {
        /// Number of fragments applied before the failure.
        chunks: usize,
        /// Provider error.
        error: ProviderError,
    },
    /// The session asked to stop; further fragments are discarded.
    Cancelled {
        /// Number of fragments applied before cancellation.
        chunks: usize,
    },
}

/// Feeds fragments into one target turn.
pub struct StreamConsumer<'a> {
    store: &'a MessageStore,
    target: TurnId,
}

impl<'a> StreamConsumer<'a> {
    /// Create a consumer writing into `target`.
    #[must_use]
    pub const fn new(store: &'a MessageStore, target: TurnId) -> Self {
        Self { store, target }
    }

    /// Drain the stream, publishing the accumulated text after every fragment.
    ///
    /// `cancel` resolves when the session wants the stream abandoned; it is
    /// polled before each fragment so a pending cancellation always wins.
    pub async fn run<S, C>(self, stream: S, cancel: C) -> StreamEnd
    where
        S: Stream<Item = Result<String, ProviderError>>,
        C: Future<Output = ()>,
    {
        let mut stream = std::pin::pin!(stream);
        let mut cancel = std::pin::pin!(cancel);
        let mut accumulated = String::new();
        let mut chunks = 0_usize;

        loop {
            tokio::select! {
                biased;
                () = &mut cancel => {
                    debug!(turn_id = %self.target, chunks, "stream cancelled");
                    return StreamEnd::Cancelled { chunks };
                }
                next = stream.next() => match next {
                    Some(Ok(fragment)) => {
                        accumulated.push_str(&fragment);
                        chunks += 1;
                        self.store.update_text(self.target, &accumulated);
                        debug!(turn_id = %self.target, chunks, len = accumulated.len(), "fragment applied");
                    }
                    Some(Err(error)) => return StreamEnd::Failed { chunks, error },
                    None => return StreamEnd::Completed { chunks },
                }
            }
        }
    }
}
