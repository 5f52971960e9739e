//! Outbound event types.

use super::SuggestionPost;
use crate::current_timestamp_millis;
use serde::Serialize;
use uuid::Uuid;

/// Shared event metadata.
#[derive(Debug, Clone, Serialize)]
pub struct EventMeta {
    /// Unique identifier for this event.
    pub event_id: String,
    /// Event source component.
    pub source: &'static str,
    /// Timestamp (Unix millis).
    pub timestamp: i64,
}

impl EventMeta {
    /// Creates new event metadata using the current timestamp.
    #[must_use]
    pub fn new(source: &'static str) -> Self {
        Self::with_timestamp(source, current_timestamp_millis())
    }

    /// Creates new event metadata with a specified timestamp.
    #[must_use]
    pub fn with_timestamp(source: &'static str, timestamp: i64) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            source,
            timestamp,
        }
    }
}

/// Events leaving the process: team broadcasts and user suggestions.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignalEvent {
    /// A websocket-style broadcast to every member of a team.
    TeamEvent {
        /// Event metadata.
        meta: EventMeta,
        /// Event name, e.g. `playbook_created`.
        name: String,
        /// Target team.
        team_id: String,
        /// Event payload.
        payload: serde_json::Map<String, serde_json::Value>,
    },
    /// An ephemeral suggestion shown to one user.
    Suggestion {
        /// Event metadata.
        meta: EventMeta,
        /// Recipient.
        user_id: String,
        /// Channel the triggering message was posted in.
        channel_id: String,
        /// The triggering message.
        post_id: String,
        /// The rendered suggestion.
        post: SuggestionPost,
    },
}

impl SignalEvent {
    /// Returns the event type as a string.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::TeamEvent { .. } => "team_event",
            Self::Suggestion { .. } => "suggestion",
        }
    }

    /// Returns the event metadata.
    #[must_use]
    pub const fn meta(&self) -> &EventMeta {
        match self {
            Self::TeamEvent { meta, .. } | Self::Suggestion { meta, .. } => meta,
        }
    }
}
