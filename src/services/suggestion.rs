//! Suggestion engine: matching plus access filtering.
//!
//! The per-message hot path. Matching runs entirely against the cached
//! snapshot; the store is only consulted once at least one playbook of the
//! team matched, and then only with a bounded wait.

use super::keywords_cache::KeywordsCache;
use super::matcher::triggers_for_message;
use super::sets::id_set;
use crate::models::{CachedPlaybook, PlaybookId, Suggestion};
use crate::storage::PlaybookStore;
use crate::{Error, Result};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::instrument;

/// Default budget for the per-message access lookup.
pub const DEFAULT_ACCESS_TIMEOUT: Duration = Duration::from_millis(2000);

/// Produces access-filtered playbook suggestions for messages.
#[derive(Clone)]
pub struct SuggestionEngine {
    cache: Arc<KeywordsCache>,
    store: Arc<dyn PlaybookStore>,
    access_timeout: Duration,
}

impl SuggestionEngine {
    /// Creates an engine reading keywords from `cache` and access from `store`.
    #[must_use]
    pub fn new(cache: Arc<KeywordsCache>, store: Arc<dyn PlaybookStore>) -> Self {
        Self {
            cache,
            store,
            access_timeout: DEFAULT_ACCESS_TIMEOUT,
        }
    }

    /// Sets the access lookup budget used by [`suggest`](Self::suggest).
    #[must_use]
    pub const fn with_access_timeout(mut self, timeout: Duration) -> Self {
        self.access_timeout = timeout;
        self
    }

    /// Returns the access lookup budget.
    #[must_use]
    pub const fn access_timeout(&self) -> Duration {
        self.access_timeout
    }

    /// Suggests playbooks for a message posted by `user_id` in `team_id`.
    ///
    /// Never fails: store errors and timeouts are logged and yield an empty
    /// suggestion.
    pub async fn suggest(&self, team_id: &str, user_id: &str, message: &str) -> Suggestion {
        let deadline = Instant::now() + self.access_timeout;
        self.suggest_until(team_id, user_id, message, deadline).await
    }

    /// Like [`suggest`](Self::suggest), with the access lookup bounded by an
    /// explicit deadline.
    ///
    /// Dropping the future abandons the lookup; its result is discarded.
    #[instrument(skip(self, message), fields(operation = "suggest"))]
    pub async fn suggest_until(
        &self,
        team_id: &str,
        user_id: &str,
        message: &str,
        deadline: Instant,
    ) -> Suggestion {
        let start = std::time::Instant::now();
        metrics::counter!("suggestion_requests_total").increment(1);

        let snapshot = self.cache.get();
        let triggered: Vec<(&CachedPlaybook, BTreeSet<String>)> = snapshot
            .for_team(team_id)
            .filter_map(|playbook| {
                let triggers = triggers_for_message(playbook, message);
                (!triggers.is_empty()).then_some((playbook, triggers))
            })
            .collect();

        if triggered.is_empty() {
            metrics::counter!("suggestion_cheap_reject_total").increment(1);
            return Suggestion::empty();
        }

        let accessible = match self.accessible_ids(team_id, user_id, deadline).await {
            Ok(ids) => ids,
            Err(e) => {
                metrics::counter!("suggestion_access_lookup_failed_total").increment(1);
                tracing::error!(
                    error = %e,
                    user_id,
                    team_id,
                    "Failed to look up accessible playbooks, suppressing suggestion"
                );
                return Suggestion::empty();
            },
        };

        let suggestion = filter_by_access(triggered, &accessible);

        metrics::histogram!("suggestion_duration_ms")
            .record(start.elapsed().as_secs_f64() * 1000.0);
        tracing::debug!(
            playbook_count = suggestion.playbooks.len(),
            trigger_count = suggestion.triggers.len(),
            "Suggestion computed"
        );
        suggestion
    }

    async fn accessible_ids(
        &self,
        team_id: &str,
        user_id: &str,
        deadline: Instant,
    ) -> Result<HashSet<PlaybookId>> {
        let budget = deadline.saturating_duration_since(Instant::now());
        let store = Arc::clone(&self.store);
        let (team, user) = (team_id.to_string(), user_id.to_string());
        let lookup =
            tokio::task::spawn_blocking(move || store.get_playbook_ids_for_user(&user, &team));

        match tokio::time::timeout_at(deadline, lookup).await {
            Ok(Ok(ids)) => ids.map(id_set),
            Ok(Err(e)) => Err(Error::OperationFailed {
                operation: "get_playbook_ids_for_user".to_string(),
                cause: e.to_string(),
            }),
            Err(_) => Err(Error::Timeout {
                operation: "get_playbook_ids_for_user".to_string(),
                after_ms: u64::try_from(budget.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }
}

/// Keeps the playbooks the user may see and unions their triggers.
fn filter_by_access(
    triggered: Vec<(&CachedPlaybook, BTreeSet<String>)>,
    accessible: &HashSet<PlaybookId>,
) -> Suggestion {
    let mut suggestion = Suggestion::empty();
    for (playbook, triggers) in triggered {
        if accessible.contains(&playbook.id) {
            suggestion.playbooks.push(playbook.clone());
            suggestion.triggers.extend(triggers);
        }
    }
    suggestion
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GetPlaybooksResults, Playbook, PlaybookFilterOptions, RequesterInfo};
    use crate::storage::InMemoryPlaybookStore;

    /// Store whose access lookup outlives any reasonable deadline.
    #[derive(Default)]
    struct StallingStore {
        inner: InMemoryPlaybookStore,
    }

    impl PlaybookStore for StallingStore {
        fn create(&self, playbook: &Playbook) -> Result<PlaybookId> {
            self.inner.create(playbook)
        }
        fn get(&self, id: &PlaybookId) -> Result<Playbook> {
            self.inner.get(id)
        }
        fn get_playbooks(&self) -> Result<Vec<Playbook>> {
            self.inner.get_playbooks()
        }
        fn get_playbooks_for_team(
            &self,
            requester: &RequesterInfo,
            team_id: &str,
            options: PlaybookFilterOptions,
        ) -> Result<GetPlaybooksResults> {
            self.inner.get_playbooks_for_team(requester, team_id, options)
        }
        fn get_num_playbooks_for_team(&self, team_id: &str) -> Result<usize> {
            self.inner.get_num_playbooks_for_team(team_id)
        }
        fn get_playbook_ids_for_user(
            &self,
            user_id: &str,
            team_id: &str,
        ) -> Result<Vec<PlaybookId>> {
            std::thread::sleep(Duration::from_millis(200));
            self.inner.get_playbook_ids_for_user(user_id, team_id)
        }
        fn update(&self, playbook: &Playbook) -> Result<()> {
            self.inner.update(playbook)
        }
        fn delete(&self, id: &PlaybookId) -> Result<()> {
            self.inner.delete(id)
        }
    }

    fn engine_with(playbooks: Vec<Playbook>) -> (SuggestionEngine, Vec<PlaybookId>) {
        let store = Arc::new(InMemoryPlaybookStore::new());
        let ids = playbooks
            .iter()
            .map(|p| store.create(p).unwrap())
            .collect();
        let cache = Arc::new(KeywordsCache::new(store.clone()));
        assert!(cache.refresh());
        (SuggestionEngine::new(cache, store), ids)
    }

    #[tokio::test]
    async fn test_suggests_accessible_match() {
        let (engine, ids) = engine_with(vec![
            Playbook::new("t1", "Outage")
                .with_keywords(["incident", "outage"])
                .with_members(["u1"]),
        ]);

        let suggestion = engine.suggest("t1", "u1", "we have an outage now").await;
        assert_eq!(suggestion.playbooks.len(), 1);
        assert_eq!(suggestion.playbooks[0].id, ids[0]);
        assert_eq!(suggestion.triggers.iter().collect::<Vec<_>>(), vec!["outage"]);
    }

    #[tokio::test]
    async fn test_other_team_never_matches() {
        let (engine, _) = engine_with(vec![
            Playbook::new("t2", "Outage")
                .with_keywords(["outage"])
                .with_members(["u1"]),
        ]);
        assert!(engine.suggest("t1", "u1", "outage").await.is_empty());
    }

    #[tokio::test]
    async fn test_inaccessible_playbook_drops_its_triggers() {
        let (engine, ids) = engine_with(vec![
            Playbook::new("t1", "Public")
                .with_keywords(["outage"])
                .with_members(["u1"]),
            Playbook::new("t1", "Private")
                .with_keywords(["outage", "breach"])
                .with_members(["someone-else"]),
        ]);

        let suggestion = engine.suggest("t1", "u1", "outage and breach").await;
        assert_eq!(suggestion.playbooks.len(), 1);
        assert_eq!(suggestion.playbooks[0].id, ids[0]);
        assert!(!suggestion.triggers.contains("breach"));
    }

    #[test]
    fn test_filter_by_access_unions_triggers() {
        let a = CachedPlaybook {
            id: PlaybookId::new("a"),
            team_id: "t".into(),
            title: "A".into(),
            signal_any_keywords: vec!["x".into(), "y".into()],
        };
        let b = CachedPlaybook {
            id: PlaybookId::new("b"),
            ..a.clone()
        };
        let triggered = vec![
            (&a, BTreeSet::from(["x".to_string()])),
            (&b, BTreeSet::from(["x".to_string(), "y".to_string()])),
        ];
        let accessible = id_set([PlaybookId::new("a"), PlaybookId::new("b")]);

        let suggestion = filter_by_access(triggered, &accessible);
        assert_eq!(suggestion.playbooks.len(), 2);
        assert_eq!(suggestion.triggers.len(), 2);
    }

    #[tokio::test]
    async fn test_timeout_reports_deadline_budget() {
        let store = Arc::new(StallingStore::default());
        let cache = Arc::new(KeywordsCache::new(store.clone()));
        let engine = SuggestionEngine::new(cache, store);
        assert_eq!(engine.access_timeout(), DEFAULT_ACCESS_TIMEOUT);

        let deadline = Instant::now() + Duration::from_millis(30);
        let err = engine.accessible_ids("t1", "u1", deadline).await.unwrap_err();

        match err {
            Error::Timeout { operation, after_ms } => {
                assert_eq!(operation, "get_playbook_ids_for_user");
                assert!(after_ms <= 30, "reported {after_ms}ms");
            },
            other => panic!("expected a timeout, got {other}"),
        }
    }
}
