//! Read-only projection of a conversation into render-ready turns.

use std::fmt::Display;

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::Serialize;

use crate::chat::ids::TurnId;
use crate::chat::session::SessionPhase;
use crate::chat::store::Conversation;
use crate::chat::turn::Role;

/// Display format for turn timestamps.
pub const TIME_FORMAT: &str = "%H:%M";

/// One turn as the UI renders it.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct TurnView {
    /// Stable rendering key.
    pub id: TurnId,
    /// Author of the turn.
    pub role: Role,
    /// Text so far (partial while streaming).
    pub text: String,
    /// Formatted capture time.
    pub time: String,
    /// Whether this is the turn currently receiving fragments.
    pub is_streaming: bool,
}

/// Phase plus rendered turns, as served to clients.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ChatView {
    /// Session phase.
    pub phase: SessionPhase,
    /// Rendered turns.
    pub turns: Vec<TurnView>,
}

/// Project a snapshot using local time.
#[must_use]
pub fn project(conversation: &Conversation, streaming: Option<TurnId>) -> Vec<TurnView> {
    project_in(conversation, streaming, &Local)
}

/// Project a snapshot, formatting timestamps in `tz`.
#[must_use]
pub fn project_in<Tz>(
    conversation: &Conversation,
    streaming: Option<TurnId>,
    tz: &Tz,
) -> Vec<TurnView>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    conversation
        .turns()
        .iter()
        .map(|turn| TurnView {
            id: turn.id,
            role: turn.role,
            text: turn.text.clone(),
            time: format_time(turn.created_at, tz),
            is_streaming: streaming == Some(turn.id),
        })
        .collect()
}

/// Format a capture time as `HH:MM` in `tz`.
#[must_use]
pub fn format_time<Tz>(at: DateTime<Utc>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    at.with_timezone(tz).format(TIME_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::store::MessageStore;
    use crate::chat::turn::Turn;
    use chrono::FixedOffset;

    fn sample() -> (MessageStore, TurnId) {
        let store = MessageStore::with_turns(vec![Turn::model("welcome"), Turn::user("fire")]);
        let placeholder = Turn::placeholder();
        let id = placeholder.id;
        store.append(placeholder);
        store.update_text(id, "Leave the");
        (store, id)
    }

    #[test]
    fn test_projection_is_idempotent() {
        let (store, id) = sample();
        let snapshot = store.snapshot();

        let first = project_in(&snapshot, Some(id), &Utc);
        let second = project_in(&snapshot, Some(id), &Utc);
        assert_eq!(first, second);
    }

    #[test]
    fn test_partial_turn_rendered_like_final() {
        let (store, id) = sample();
        let views = project_in(&store.snapshot(), Some(id), &Utc);

        assert_eq!(views.len(), 3);
        assert_eq!(views[2].text, "Leave the");
        assert_eq!(views[2].role, Role::Model);
        assert!(views[2].is_streaming);
        assert!(!views[0].is_streaming);
        assert!(!views[1].is_streaming);
    }

    #[test]
    fn test_no_streaming_flag_when_idle() {
        let (store, _) = sample();
        let views = project(&store.snapshot(), None);
        assert!(views.iter().all(|v| !v.is_streaming));
    }

    #[test]
    fn test_format_time_uses_zone() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 22, 5, 0).unwrap();
        assert_eq!(format_time(at, &Utc), "22:05");

        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        assert_eq!(format_time(at, &plus_two), "00:05");
    }
}
