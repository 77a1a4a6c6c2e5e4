//! Conversation turn model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::chat::ids::TurnId;

/// Author of a turn.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Human input.
    User,
    /// Language model output.
    Model,
}

impl Role {
    /// Stable string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Self::User),
            "model" => Ok(Self::Model),
            _ => Err(value.to_string()),
        }
    }
}

/// Lifecycle of a turn's text.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    /// Empty placeholder waiting for the first fragment.
    Pending,
    /// Receiving fragments.
    Streaming,
    /// Text is final.
    Finalized,
    /// Text was replaced by the error message.
    Errored,
}

impl TurnStatus {
    /// Whether the text may still change.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Pending | Self::Streaming)
    }
}

/// A single conversation entry.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Unique turn identifier.
    pub id: TurnId,
    /// Author of the turn.
    pub role: Role,
    /// Text content.
    pub text: String,
    /// Capture time.
    pub created_at: DateTime<Utc>,
    /// Text lifecycle, maintained by the message store.
    pub status: TurnStatus,
}

impl Turn {
    /// Build a finalized user turn.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: TurnId::new(),
            role: Role::User,
            text: text.into(),
            created_at: Utc::now(),
            status: TurnStatus::Finalized,
        }
    }

    /// Build a finalized model turn (e.g. the welcome message).
    #[must_use]
    pub fn model(text: impl Into<String>) -> Self {
        Self {
            id: TurnId::new(),
            role: Role::Model,
            text: text.into(),
            created_at: Utc::now(),
            status: TurnStatus::Finalized,
        }
    }

    /// Build an empty model turn to be filled by a stream.
    #[must_use]
    pub fn placeholder() -> Self {
        Self {
            id: TurnId::new(),
            role: Role::Model,
            text: String::new(),
            created_at: Utc::now(),
            status: TurnStatus::Pending,
        }
    }

    /// Project to the `{role, text}` pair sent to the completion provider.
    #[must_use]
    pub fn to_history_entry(&self) -> HistoryEntry {
        HistoryEntry {
            role: self.role,
            text: self.text.clone(),
        }
    }
}

/// Role and text of a past turn, as seen by the completion provider.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Author of the turn.
    pub role: Role,
    /// Turn text.
    pub text: String,
}
