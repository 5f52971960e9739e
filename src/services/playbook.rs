//! Playbook service: CRUD with side effects, and the message hook.

use super::formatting::SuggestionFormatter;
use super::keywords_cache::KeywordsCache;
use super::suggestion::SuggestionEngine;
use super::thread_ignorer::{LruThreadIgnorer, ThreadIgnorer};
use crate::config::FeatureFlags;
use crate::models::{
    GetPlaybooksResults, Playbook, PlaybookFilterOptions, PlaybookId, Post, RequesterInfo,
    Suggestion,
};
use crate::platform::{ChannelResolver, SessionResolver, StaticDirectory};
use crate::poster::Poster;
use crate::storage::PlaybookStore;
use crate::telemetry::{NoopTelemetry, PlaybookTelemetry};
use crate::{Error, Result, current_timestamp_millis};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Team event published after a playbook is created.
pub const PLAYBOOK_CREATED_EVENT: &str = "playbook_created";

/// Team event published after a playbook is deleted.
pub const PLAYBOOK_DELETED_EVENT: &str = "playbook_deleted";

/// Manages playbooks and turns posted messages into suggestions.
pub struct PlaybookService {
    store: Arc<dyn PlaybookStore>,
    poster: Arc<dyn Poster>,
    cache: Arc<KeywordsCache>,
    engine: SuggestionEngine,
    ignorer: Arc<dyn ThreadIgnorer>,
    telemetry: Arc<dyn PlaybookTelemetry>,
    channels: Arc<dyn ChannelResolver>,
    sessions: Arc<dyn SessionResolver>,
    formatter: SuggestionFormatter,
    features: FeatureFlags,
}

impl PlaybookService {
    /// Creates a service with an in-memory thread ignorer, no telemetry and
    /// an empty platform directory.
    #[must_use]
    pub fn new(
        store: Arc<dyn PlaybookStore>,
        poster: Arc<dyn Poster>,
        cache: Arc<KeywordsCache>,
    ) -> Self {
        let directory = Arc::new(StaticDirectory::new());
        Self {
            engine: SuggestionEngine::new(Arc::clone(&cache), Arc::clone(&store)),
            store,
            poster,
            cache,
            ignorer: Arc::new(LruThreadIgnorer::default()),
            telemetry: Arc::new(NoopTelemetry),
            channels: directory.clone(),
            sessions: directory,
            formatter: SuggestionFormatter::default(),
            features: FeatureFlags::default(),
        }
    }

    /// Sets the thread ignorer.
    #[must_use]
    pub fn with_thread_ignorer(mut self, ignorer: Arc<dyn ThreadIgnorer>) -> Self {
        self.ignorer = ignorer;
        self
    }

    /// Sets the telemetry sink.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: Arc<dyn PlaybookTelemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Sets the channel and session lookups.
    #[must_use]
    pub fn with_directory<D>(mut self, directory: Arc<D>) -> Self
    where
        D: ChannelResolver + SessionResolver + 'static,
    {
        self.channels = directory.clone();
        self.sessions = directory;
        self
    }

    /// Sets the suggestion formatter.
    #[must_use]
    pub fn with_formatter(mut self, formatter: SuggestionFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    /// Sets the access lookup budget of the suggestion engine.
    #[must_use]
    pub fn with_access_timeout(mut self, timeout: Duration) -> Self {
        self.engine = self.engine.with_access_timeout(timeout);
        self
    }

    /// Sets the feature flags.
    #[must_use]
    pub const fn with_features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    /// The keyword cache backing suggestions.
    #[must_use]
    pub const fn keywords_cache(&self) -> &Arc<KeywordsCache> {
        &self.cache
    }

    /// The suggestion engine.
    #[must_use]
    pub const fn engine(&self) -> &SuggestionEngine {
        &self.engine
    }

    /// Creates a playbook and returns its new id.
    ///
    /// # Errors
    ///
    /// Returns the store error; no event is published in that case.
    #[instrument(skip(self, playbook), fields(team_id = %playbook.team_id))]
    pub fn create(&self, playbook: Playbook, user_id: &str) -> Result<PlaybookId> {
        let mut playbook = playbook;
        playbook.create_at = current_timestamp_millis();
        playbook.update_at = playbook.create_at;

        let id = self.store.create(&playbook)?;
        playbook.id = id.clone();

        if self.features.telemetry {
            self.telemetry.create_playbook(&playbook, user_id);
        }
        self.poster.publish_team_event(
            PLAYBOOK_CREATED_EVENT,
            team_payload(&playbook.team_id),
            &playbook.team_id,
        );
        self.cache.invalidate();
        Ok(id)
    }

    /// Fetches a playbook by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for unknown ids, or the store error.
    pub fn get(&self, id: &PlaybookId) -> Result<Playbook> {
        self.store.get(id)
    }

    /// Lists every live playbook.
    ///
    /// # Errors
    ///
    /// Returns the store error.
    pub fn get_playbooks(&self) -> Result<Vec<Playbook>> {
        self.store.get_playbooks()
    }

    /// Lists the team's playbooks visible to the requester.
    ///
    /// # Errors
    ///
    /// Returns the store error.
    pub fn get_playbooks_for_team(
        &self,
        requester: &RequesterInfo,
        team_id: &str,
        options: PlaybookFilterOptions,
    ) -> Result<GetPlaybooksResults> {
        self.store.get_playbooks_for_team(requester, team_id, options)
    }

    /// Counts the team's live playbooks.
    ///
    /// # Errors
    ///
    /// Returns the store error.
    pub fn get_num_playbooks_for_team(&self, team_id: &str) -> Result<usize> {
        self.store.get_num_playbooks_for_team(team_id)
    }

    /// Updates a playbook.
    ///
    /// # Errors
    ///
    /// Returns the store error.
    #[instrument(skip(self, playbook), fields(playbook_id = %playbook.id))]
    pub fn update(&self, playbook: Playbook, user_id: &str) -> Result<()> {
        let mut playbook = playbook;
        playbook.update_at = current_timestamp_millis();

        self.store.update(&playbook)?;

        if self.features.telemetry {
            self.telemetry.update_playbook(&playbook, user_id);
        }
        self.cache.invalidate();
        Ok(())
    }

    /// Soft-deletes a playbook.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the playbook has no id, or the
    /// store error.
    #[instrument(skip(self, playbook), fields(playbook_id = %playbook.id))]
    pub fn delete(&self, playbook: &Playbook, user_id: &str) -> Result<()> {
        if playbook.id.is_empty() {
            return Err(Error::InvalidInput(
                "can't delete a playbook without an ID".to_string(),
            ));
        }

        self.store.delete(&playbook.id)?;

        if self.features.telemetry {
            self.telemetry.delete_playbook(playbook, user_id);
        }
        self.poster.publish_team_event(
            PLAYBOOK_DELETED_EVENT,
            team_payload(&playbook.team_id),
            &playbook.team_id,
        );
        self.cache.invalidate();
        Ok(())
    }

    /// Stops suggestions in the thread of `post_id` for the user.
    pub fn ignore_thread(&self, post_id: &str, root_id: &str, user_id: &str) {
        self.ignorer.ignore(post_id, user_id);
        self.ignorer.ignore(root_id, user_id);
        tracing::debug!(post_id, root_id, user_id, "Thread ignored for keyword suggestions");
    }

    /// Suggests playbooks for a message; see [`SuggestionEngine::suggest`].
    pub async fn suggest(&self, team_id: &str, user_id: &str, message: &str) -> Suggestion {
        self.engine.suggest(team_id, user_id, message).await
    }

    /// Message hook: offers matching playbooks to the author of `post`.
    ///
    /// Never fails; every problem is logged and only suppresses the
    /// suggestion for this message.
    #[instrument(skip(self, post), fields(post_id = %post.id, channel_id = %post.channel_id))]
    pub async fn on_message_posted(&self, session_id: &str, post: &Post) {
        if !self.features.keyword_suggestions
            || post.is_system_message()
            || self.ignorer.is_ignored(&post.root_id, &post.user_id)
        {
            return;
        }

        let channel = match self.channels.get_channel(&post.channel_id) {
            Ok(channel) => channel,
            Err(e) => {
                tracing::error!(error = %e, "Can't get channel");
                return;
            },
        };

        let suggestion = self
            .engine
            .suggest(&channel.team_id, &post.user_id, &post.message)
            .await;
        if suggestion.is_empty() {
            return;
        }

        let session = match self.sessions.get_session(session_id) {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(error = %e, session_id, "Can't get session");
                return;
            },
        };

        let rendered = self
            .formatter
            .render(&suggestion, &post.id, session.is_mobile_app);
        if let Err(e) =
            self.poster
                .send_suggestion(&post.user_id, &post.channel_id, &post.id, rendered)
        {
            tracing::warn!(error = %e, user_id = %post.user_id, "Failed to send suggestion");
        }
    }
}

fn team_payload(team_id: &str) -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert("teamID".to_string(), Value::from(team_id));
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Channel, Session, SignalEvent};
    use crate::observability::EventBus;
    use crate::poster::EventBusPoster;
    use crate::storage::InMemoryPlaybookStore;

    struct Fixture {
        service: PlaybookService,
        bus: EventBus,
        directory: Arc<StaticDirectory>,
    }

    fn fixture() -> Fixture {
        let store: Arc<dyn PlaybookStore> = Arc::new(InMemoryPlaybookStore::new());
        let bus = EventBus::new(16);
        let poster = Arc::new(EventBusPoster::new(bus.clone()));
        let cache = Arc::new(KeywordsCache::new(Arc::clone(&store)));
        let directory = Arc::new(StaticDirectory::new());
        directory.add_channel(Channel {
            id: "c1".into(),
            team_id: "t1".into(),
        });
        directory.add_session(Session {
            id: "s1".into(),
            user_id: "u1".into(),
            is_mobile_app: false,
        });
        let service = PlaybookService::new(store, poster, cache).with_directory(directory.clone());
        Fixture {
            service,
            bus,
            directory,
        }
    }

    #[tokio::test]
    async fn test_create_publishes_and_stamps() {
        let f = fixture();
        let mut rx = f.bus.subscribe();

        let id = f
            .service
            .create(Playbook::new("t1", "Outage"), "u1")
            .unwrap();
        let stored = f.service.get(&id).unwrap();
        assert!(stored.create_at > 0);
        assert_eq!(stored.create_at, stored.update_at);

        match rx.recv().await.unwrap() {
            SignalEvent::TeamEvent { name, payload, .. } => {
                assert_eq!(name, PLAYBOOK_CREATED_EVENT);
                assert_eq!(payload["teamID"], "t1");
            },
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_delete_without_id_is_rejected() {
        let f = fixture();
        let err = f
            .service
            .delete(&Playbook::new("t1", "Outage"), "u1")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid input: can't delete a playbook without an ID"
        );
    }

    #[tokio::test]
    async fn test_message_produces_suggestion() {
        let f = fixture();
        f.service
            .create(
                Playbook::new("t1", "Outage")
                    .with_keywords(["outage"])
                    .with_members(["u1"]),
                "u1",
            )
            .unwrap();
        f.service.keywords_cache().refresh();
        let mut rx = f.bus.subscribe_event_type("suggestion");

        let post = Post::new("p1", "c1", "u1", "big outage in prod");
        f.service.on_message_posted("s1", &post).await;

        match rx.recv().await.unwrap() {
            SignalEvent::Suggestion { user_id, post_id, post, .. } => {
                assert_eq!(user_id, "u1");
                assert_eq!(post_id, "p1");
                assert!(post.message.starts_with("`outage` is a trigger"));
            },
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ignored_thread_gets_no_suggestion() {
        let f = fixture();
        f.service
            .create(
                Playbook::new("t1", "Outage")
                    .with_keywords(["outage"])
                    .with_members(["u1"]),
                "u1",
            )
            .unwrap();
        f.service.keywords_cache().refresh();
        f.service.ignore_thread("p1", "root", "u1");
        let mut rx = f.bus.subscribe_event_type("suggestion");

        let post = Post::new("p2", "c1", "u1", "outage again").in_thread("root");
        f.service.on_message_posted("s1", &post).await;

        assert_eq!(f.bus.receiver_count(), 1);
        let waited = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn test_unknown_channel_is_swallowed() {
        let f = fixture();
        let post = Post::new("p1", "unknown", "u1", "outage");
        f.service.on_message_posted("s1", &post).await;
        assert!(f.directory.get_channel("unknown").is_err());
    }
}
