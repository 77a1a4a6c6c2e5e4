//! Session controller: turn submission, placeholder lifecycle and the
//! single-submission guard.
//!
//! Phase machine:
//!
//! ```text
//! Idle -> Submitting -> Streaming(id) -> Idle        (completed / failed)
//!         Submitting | Streaming(id) -> Cancelling -> Idle
//! ```
//!
//! The phase lives in a `watch` channel so that the idle check and the move
//! to `Submitting` happen in one `send_if_modified` call. That call is the
//! concurrency guard: no lock is held across an await.

use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::chat::consumer::{StreamConsumer, StreamEnd};
use crate::chat::errors::ProviderError;
use crate::chat::ids::{SessionId, TurnId};
use crate::chat::provider::{CompletionProvider, CompletionRequest};
use crate::chat::store::{Conversation, MessageStore};
use crate::chat::turn::Turn;
use crate::chat::view::{self, ChatView, TurnView};
use crate::config::SessionConfig;

/// Current phase of the session state machine.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "turn_id", rename_all = "snake_case")]
pub enum SessionPhase {
    /// Ready for a new submission.
    #[default]
    Idle,
    /// User turn and placeholder appended; stream not open yet.
    Submitting,
    /// Fragments are flowing into the given model turn.
    Streaming(TurnId),
    /// A cancellation was requested and has not been observed yet.
    Cancelling,
}

impl SessionPhase {
    /// Whether a new submission would be accepted.
    #[must_use]
    pub const fn is_idle(self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Model turn currently receiving fragments, if any.
    #[must_use]
    pub const fn streaming_turn(self) -> Option<TurnId> {
        match self {
            Self::Streaming(id) => Some(id),
            Self::Idle | Self::Submitting | Self::Cancelling => None,
        }
    }
}

/// Why a submission was ignored.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Text was empty or whitespace only.
    EmptyInput,
    /// Another submission is still in flight.
    Busy,
}

/// Result of a submission, after its stream settled.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SubmitOutcome {
    /// Nothing was appended.
    Rejected(RejectReason),
    /// The model turn holds the full streamed text.
    Completed {
        /// Model turn id.
        turn_id: TurnId,
        /// Number of fragments received.
        chunks: usize,
    },
    /// The model turn holds the error message.
    Failed {
        /// Model turn id.
        turn_id: TurnId,
    },
    /// The stream was abandoned; the model turn keeps the text received so far.
    Cancelled {
        /// Model turn id.
        turn_id: TurnId,
    },
}

impl SubmitOutcome {
    /// Whether the submission appended turns.
    #[must_use]
    pub const fn is_accepted(self) -> bool {
        !matches!(self, Self::Rejected(_))
    }
}

/// The single active conversation and its phase.
pub struct ChatSession {
    id: SessionId,
    provider: Arc<dyn CompletionProvider>,
    store: MessageStore,
    phase: watch::Sender<SessionPhase>,
    error_message: String,
}

impl ChatSession {
    /// Create a session seeded with the configured welcome turn.
    #[must_use]
    pub fn new(provider: Arc<dyn CompletionProvider>, config: &SessionConfig) -> Self {
        let id = SessionId::new();
        info!(session_id = %id, provider = provider.name(), "chat session created");
        Self {
            id,
            provider,
            store: MessageStore::with_turns(vec![Turn::model(config.welcome_message.clone())]),
            phase: watch::Sender::new(SessionPhase::Idle),
            error_message: config.error_message.clone(),
        }
    }

    /// Session identifier.
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        *self.phase.borrow()
    }

    /// Observe phase transitions.
    #[must_use]
    pub fn subscribe_phase(&self) -> watch::Receiver<SessionPhase> {
        self.phase.subscribe()
    }

    /// Underlying message store (read access and subscriptions).
    #[must_use]
    pub const fn store(&self) -> &MessageStore {
        &self.store
    }

    /// Owned copy of the conversation.
    #[must_use]
    pub fn snapshot(&self) -> Conversation {
        self.store.snapshot()
    }

    /// Model turn currently streaming, used for the loading indicator.
    #[must_use]
    pub fn streaming_turn(&self) -> Option<TurnId> {
        self.phase().streaming_turn()
    }

    /// Render-ready turns for the current state.
    #[must_use]
    pub fn turn_views(&self) -> Vec<TurnView> {
        view::project(&self.snapshot(), self.streaming_turn())
    }

    /// Phase plus rendered turns.
    #[must_use]
    pub fn chat_view(&self) -> ChatView {
        let phase = self.phase();
        ChatView {
            phase,
            turns: view::project(&self.snapshot(), phase.streaming_turn()),
        }
    }

    /// Submit user text and drive the completion stream to its end.
    pub async fn submit(self: &Arc<Self>, text: &str) -> SubmitOutcome {
        match self.begin(text) {
            Ok(pending) => pending.run().await,
            Err(reason) => SubmitOutcome::Rejected(reason),
        }
    }

    /// Accept a submission: append the user turn and the placeholder.
    ///
    /// The returned handle must be run to open the stream; dropping it
    /// settles the placeholder and returns the session to idle.
    ///
    /// # Errors
    /// Returns the rejection reason when the text is blank or a submission
    /// is already in flight. Nothing is appended in that case.
    pub fn begin(self: &Arc<Self>, text: &str) -> Result<PendingSubmission, RejectReason> {
        if text.trim().is_empty() {
            debug!(session_id = %self.id, "ignoring blank submission");
            return Err(RejectReason::EmptyInput);
        }

        let acquired = self.phase.send_if_modified(|phase| {
            if phase.is_idle() {
                *phase = SessionPhase::Submitting;
                true
            } else {
                false
            }
        });
        if !acquired {
            debug!(session_id = %self.id, phase = ?self.phase(), "ignoring submission while busy");
            return Err(RejectReason::Busy);
        }

        let history = self.store.snapshot().history();
        let user = Turn::user(text);
        let user_turn = user.id;
        self.store.append(user);

        let placeholder = Turn::placeholder();
        let model_turn = placeholder.id;
        self.store.append(placeholder);

        info!(
            session_id = %self.id,
            user_turn = %user_turn,
            model_turn = %model_turn,
            history_len = history.len(),
            "submission accepted"
        );

        Ok(PendingSubmission {
            session: Arc::clone(self),
            user_turn,
            model_turn,
            request: CompletionRequest {
                history,
                message: text.to_string(),
            },
            settled: false,
        })
    }

    /// Ask the in-flight submission to stop.
    ///
    /// Returns `false` when there is nothing to cancel.
    pub fn cancel(&self) -> bool {
        let requested = self.phase.send_if_modified(|phase| match phase {
            SessionPhase::Submitting | SessionPhase::Streaming(_) => {
                *phase = SessionPhase::Cancelling;
                true
            }
            SessionPhase::Idle | SessionPhase::Cancelling => false,
        });
        if requested {
            info!(session_id = %self.id, "cancellation requested");
        }
        requested
    }

    fn cancellation(&self) -> impl Future<Output = ()> + Send + use<> {
        let mut rx = self.phase.subscribe();
        async move {
            let closed = rx
                .wait_for(|phase| *phase == SessionPhase::Cancelling)
                .await
                .is_err();
            if closed {
                std::future::pending::<()>().await;
            }
        }
    }

    fn mark_streaming(&self, turn_id: TurnId) {
        // A cancellation that raced the stream opening must not be overwritten.
        self.phase.send_if_modified(|phase| {
            if *phase == SessionPhase::Submitting {
                *phase = SessionPhase::Streaming(turn_id);
                true
            } else {
                false
            }
        });
    }

    fn settle_completed(&self, turn_id: TurnId, chunks: usize) -> SubmitOutcome {
        self.store.finalize(turn_id);
        self.phase.send_replace(SessionPhase::Idle);
        info!(session_id = %self.id, turn_id = %turn_id, chunks, "completion finished");
        SubmitOutcome::Completed { turn_id, chunks }
    }

    fn settle_failed(&self, turn_id: TurnId, chunks: usize, error: &ProviderError) -> SubmitOutcome {
        warn!(
            session_id = %self.id,
            turn_id = %turn_id,
            chunks,
            kind = error.kind(),
            error = %error,
            "completion failed, substituting error message"
        );
        self.store.substitute_error(turn_id, &self.error_message);
        self.phase.send_replace(SessionPhase::Idle);
        SubmitOutcome::Failed { turn_id }
    }

    fn settle_cancelled(&self, turn_id: TurnId, chunks: usize) -> SubmitOutcome {
        self.store.finalize(turn_id);
        self.phase.send_replace(SessionPhase::Idle);
        info!(session_id = %self.id, turn_id = %turn_id, chunks, "completion cancelled");
        SubmitOutcome::Cancelled { turn_id }
    }
}

/// An accepted submission whose stream has not been driven yet.
pub struct PendingSubmission {
    session: Arc<ChatSession>,
    user_turn: TurnId,
    model_turn: TurnId,
    request: CompletionRequest,
    settled: bool,
}

impl PendingSubmission {
    /// Id of the appended user turn.
    #[must_use]
    pub const fn user_turn(&self) -> TurnId {
        self.user_turn
    }

    /// Id of the placeholder model turn.
    #[must_use]
    pub const fn model_turn(&self) -> TurnId {
        self.model_turn
    }

    /// Open the provider stream and feed it into the placeholder.
    pub async fn run(mut self) -> SubmitOutcome {
        let session = Arc::clone(&self.session);
        let target = self.model_turn;
        let request = std::mem::take(&mut self.request);

        let opened = tokio::select! {
            biased;
            () = session.cancellation() => None,
            result = session.provider.open_stream(request) => Some(result),
        };

        let outcome = match opened {
            None => session.settle_cancelled(target, 0),
            Some(Err(error)) => session.settle_failed(target, 0, &error),
            Some(Ok(stream)) => {
                session.mark_streaming(target);
                let end = StreamConsumer::new(&session.store, target)
                    .run(stream, session.cancellation())
                    .await;
                match end {
                    StreamEnd::Completed { chunks } => session.settle_completed(target, chunks),
                    StreamEnd::Failed { chunks, error } => {
                        session.settle_failed(target, chunks, &error)
                    }
                    StreamEnd::Cancelled { chunks } => session.settle_cancelled(target, chunks),
                }
            }
        };

        self.settled = true;
        outcome
    }
}

impl Drop for PendingSubmission {
    fn drop(&mut self) {
        if !self.settled {
            warn!(
                session_id = %self.session.id,
                turn_id = %self.model_turn,
                "submission dropped before settling"
            );
            self.session.settle_cancelled(self.model_turn, 0);
        }
    }
}
