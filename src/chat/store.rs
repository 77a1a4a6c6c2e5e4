//! Ordered, append-only log of conversation turns.
//!
//! The conversation lives inside a `tokio::sync::watch` channel: every
//! mutation is a single atomic replace-in-place, and subscribers observe
//! each completed mutation. Readers only ever receive owned copies.

use serde::Serialize;
use tokio::sync::watch;
use tracing::error;

use crate::chat::ids::TurnId;
use crate::chat::turn::{HistoryEntry, Turn, TurnStatus};

/// Immutable, ordered view of the conversation.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    /// All turns in insertion order.
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Number of turns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether the conversation has no turns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Most recent turn.
    #[must_use]
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Look up a turn by id.
    #[must_use]
    pub fn get(&self, id: TurnId) -> Option<&Turn> {
        self.turns.iter().find(|turn| turn.id == id)
    }

    /// Map every turn to its `{role, text}` pair.
    #[must_use]
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.turns.iter().map(Turn::to_history_entry).collect()
    }

    fn get_mut(&mut self, id: TurnId) -> Option<&mut Turn> {
        self.turns.iter_mut().find(|turn| turn.id == id)
    }
}

/// Single-writer store holding the conversation.
#[derive(Debug)]
pub struct MessageStore {
    conversation: watch::Sender<Conversation>,
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            conversation: watch::Sender::new(Conversation::default()),
        }
    }

    /// Create a store seeded with the given turns.
    #[must_use]
    pub fn with_turns(turns: Vec<Turn>) -> Self {
        Self {
            conversation: watch::Sender::new(Conversation { turns }),
        }
    }

    /// Append a turn and return the resulting snapshot.
    pub fn append(&self, turn: Turn) -> Conversation {
        self.conversation.send_modify(|conversation| conversation.turns.push(turn));
        self.snapshot()
    }

    /// Replace the text of an open turn.
    ///
    /// The first update moves a pending placeholder to `Streaming`.
    /// Returns `false` (and asserts in debug builds) if the id is unknown or
    /// the turn is already sealed.
    pub fn update_text(&self, id: TurnId, text: &str) -> bool {
        self.mutate_open(id, "update_text", |turn| {
            text.clone_into(&mut turn.text);
            turn.status = TurnStatus::Streaming;
        })
    }

    /// Seal an open turn with its current text.
    pub fn finalize(&self, id: TurnId) -> bool {
        self.mutate_open(id, "finalize", |turn| turn.status = TurnStatus::Finalized)
    }

    /// Replace an open turn's text with an error message and seal it.
    pub fn substitute_error(&self, id: TurnId, message: &str) -> bool {
        self.mutate_open(id, "substitute_error", |turn| {
            message.clone_into(&mut turn.text);
            turn.status = TurnStatus::Errored;
        })
    }

    /// Owned copy of the current conversation.
    #[must_use]
    pub fn snapshot(&self) -> Conversation {
        self.conversation.borrow().clone()
    }

    /// Observe every subsequent mutation.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Conversation> {
        self.conversation.subscribe()
    }

    fn mutate_open<F>(&self, id: TurnId, operation: &'static str, apply: F) -> bool
    where
        F: FnOnce(&mut Turn),
    {
        let mut outcome = None;
        let modified = self.conversation.send_if_modified(|conversation| {
            match conversation.get_mut(id) {
                Some(turn) if turn.status.is_open() => {
                    apply(turn);
                    true
                }
                Some(turn) => {
                    outcome = Some(turn.status);
                    false
                }
                None => false,
            }
        });

        if !modified {
            match outcome {
                Some(status) => {
                    error!(turn_id = %id, ?status, operation, "attempted to mutate a sealed turn");
                }
                None => error!(turn_id = %id, operation, "attempted to mutate an unknown turn"),
            }
            debug_assert!(modified, "{operation} rejected for turn {id}");
        }

        modified
    }
}
