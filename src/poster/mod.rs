//! Outbound notifications.
//!
//! The [`Poster`] trait is how the service talks back to the chat platform:
//! team-wide broadcasts for playbook lifecycle changes and ephemeral
//! suggestion posts for a single user. Both are fire-and-forget.

use crate::models::{EventMeta, SignalEvent, SuggestionPost};
use crate::observability::EventBus;
use crate::{Error, Result};
use serde_json::{Map, Value};

const EVENT_SOURCE: &str = "playbook_signal";

/// Delivers outbound events.
pub trait Poster: Send + Sync {
    /// Broadcasts an event to every member of a team.
    fn publish_team_event(&self, event_name: &str, payload: Map<String, Value>, team_id: &str);

    /// Shows a suggestion post to one user, next to the post that triggered it.
    ///
    /// # Errors
    ///
    /// Returns an error if the post could not be handed off for delivery.
    fn send_suggestion(
        &self,
        user_id: &str,
        channel_id: &str,
        post_id: &str,
        post: SuggestionPost,
    ) -> Result<()>;
}

/// [`Poster`] that publishes onto an [`EventBus`].
#[derive(Clone, Default)]
pub struct EventBusPoster {
    bus: EventBus,
}

impl EventBusPoster {
    /// Creates a poster over `bus`.
    #[must_use]
    pub const fn new(bus: EventBus) -> Self {
        Self { bus }
    }

    /// The underlying bus, for subscribing.
    #[must_use]
    pub const fn bus(&self) -> &EventBus {
        &self.bus
    }
}

impl Poster for EventBusPoster {
    fn publish_team_event(&self, event_name: &str, payload: Map<String, Value>, team_id: &str) {
        let delivered = self.bus.publish(SignalEvent::TeamEvent {
            meta: EventMeta::new(EVENT_SOURCE),
            name: event_name.to_string(),
            team_id: team_id.to_string(),
            payload,
        });
        tracing::debug!(event_name, team_id, delivered, "Published team event");
    }

    fn send_suggestion(
        &self,
        user_id: &str,
        channel_id: &str,
        post_id: &str,
        post: SuggestionPost,
    ) -> Result<()> {
        let delivered = self.bus.publish(SignalEvent::Suggestion {
            meta: EventMeta::new(EVENT_SOURCE),
            user_id: user_id.to_string(),
            channel_id: channel_id.to_string(),
            post_id: post_id.to_string(),
            post,
        });
        if delivered == 0 {
            return Err(Error::OperationFailed {
                operation: "send_suggestion".to_string(),
                cause: "no subscribers on the event bus".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suggestion_without_subscribers_fails() {
        let poster = EventBusPoster::default();
        let result = poster.send_suggestion("u1", "c1", "p1", SuggestionPost::default());
        assert!(matches!(result, Err(Error::OperationFailed { .. })));
    }

    #[tokio::test]
    async fn test_team_event_reaches_subscriber() {
        let poster = EventBusPoster::default();
        let mut rx = poster.bus().subscribe();

        let mut payload = Map::new();
        payload.insert("teamID".into(), Value::from("t1"));
        poster.publish_team_event("playbook_created", payload, "t1");

        match rx.recv().await.unwrap() {
            SignalEvent::TeamEvent { name, team_id, payload, .. } => {
                assert_eq!(name, "playbook_created");
                assert_eq!(team_id, "t1");
                assert_eq!(payload["teamID"], "t1");
            },
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
