//! Streaming chat session for the Sentinel assistant.
//!
//! - `turn` / `ids`: conversation data model
//! - `store`: ordered, observable message store
//! - `provider` / `ollama`: completion backends producing fragment streams
//! - `consumer`: applies a fragment stream to one model turn
//! - `session`: the submit/stream/settle state machine
//! - `view`: render-ready projection of a snapshot

pub mod consumer;
pub mod errors;
pub mod ids;
pub mod ollama;
pub mod provider;
pub mod session;
pub mod store;
pub mod turn;
pub mod view;

pub use consumer::{StreamConsumer, StreamEnd};
pub use errors::{ProviderError, ProviderResult};
pub use ids::{SessionId, TurnId};
pub use ollama::OllamaCompletionProvider;
pub use provider::{CompletionProvider, CompletionRequest, ProviderFuture, TextStream};
pub use session::{ChatSession, PendingSubmission, RejectReason, SessionPhase, SubmitOutcome};
pub use store::{Conversation, MessageStore};
pub use turn::{HistoryEntry, Role, Turn, TurnStatus};
pub use view::{ChatView, TurnView};
