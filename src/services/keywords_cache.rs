//! In-memory keyword cache.
//!
//! Holds an immutable [`Snapshot`] of every playbook that has at least one
//! trigger keyword. Refreshes build a complete new snapshot off to the side
//! and publish it with a single pointer swap, so readers see either the old
//! or the new snapshot and never a mixture.
//!
//! # Locking
//!
//! | Lock | Held by | Held across store calls |
//! |------|---------|-------------------------|
//! | `current` (read) | [`KeywordsCache::get`], for an `Arc` clone | no |
//! | `current` (write) | [`KeywordsCache::refresh`], for the swap | no |
//! | `refresh_lock` | [`KeywordsCache::refresh`] | yes (refreshers only) |
//!
//! Poisoned locks fail open: the cache keeps serving whatever was last
//! published.

use crate::models::CachedPlaybook;
use crate::storage::PlaybookStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::{Notify, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Default interval between background refreshes.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Shortest interval the background refresher accepts.
const MIN_REFRESH_INTERVAL: Duration = Duration::from_millis(10);

/// Immutable point-in-time view of the cached playbooks.
#[derive(Debug, Default)]
pub struct Snapshot {
    generation: u64,
    refreshed_at: Option<Instant>,
    playbooks: Vec<CachedPlaybook>,
}

impl Snapshot {
    /// Builds a snapshot from already projected playbooks.
    #[must_use]
    pub fn new(generation: u64, playbooks: Vec<CachedPlaybook>) -> Self {
        Self {
            generation,
            refreshed_at: Some(Instant::now()),
            playbooks,
        }
    }

    /// Monotonic refresh counter; 0 for the initial empty snapshot.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// When the snapshot was built, `None` before the first refresh.
    #[must_use]
    pub const fn refreshed_at(&self) -> Option<Instant> {
        self.refreshed_at
    }

    /// All cached playbooks, in store order.
    #[must_use]
    pub fn playbooks(&self) -> &[CachedPlaybook] {
        &self.playbooks
    }

    /// Cached playbooks of one team.
    pub fn for_team<'a>(&'a self, team_id: &'a str) -> impl Iterator<Item = &'a CachedPlaybook> {
        self.playbooks.iter().filter(move |p| p.team_id == team_id)
    }

    /// Number of cached playbooks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.playbooks.len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.playbooks.is_empty()
    }
}

/// Keyword cache over a playbook store.
pub struct KeywordsCache {
    store: Arc<dyn PlaybookStore>,
    current: RwLock<Arc<Snapshot>>,
    refresh_lock: Mutex<()>,
    generation: AtomicU64,
    invalidated: Notify,
}

impl KeywordsCache {
    /// Creates an empty cache; call [`refresh`](Self::refresh) or start a
    /// refresher to populate it.
    #[must_use]
    pub fn new(store: Arc<dyn PlaybookStore>) -> Self {
        Self {
            store,
            current: RwLock::new(Arc::new(Snapshot::default())),
            refresh_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
            invalidated: Notify::new(),
        }
    }

    /// Returns the current snapshot.
    pub fn get(&self) -> Arc<Snapshot> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Rebuilds the snapshot from the store.
    ///
    /// Returns `false` if the store could not be read; the previous snapshot
    /// then stays current.
    #[tracing::instrument(skip(self), fields(operation = "keywords_cache_refresh"))]
    pub fn refresh(&self) -> bool {
        let _refreshing = self
            .refresh_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let start = Instant::now();

        let playbooks = match self.store.get_playbooks() {
            Ok(playbooks) => playbooks,
            Err(e) => {
                metrics::counter!("keywords_cache_refresh_failed_total").increment(1);
                tracing::error!(error = %e, "Failed to refresh keyword cache, keeping previous snapshot");
                return false;
            },
        };

        let cached: Vec<CachedPlaybook> = playbooks.iter().filter_map(CachedPlaybook::project).collect();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = Arc::new(Snapshot::new(generation, cached));
        let count = snapshot.len();

        *self.current.write().unwrap_or_else(PoisonError::into_inner) = snapshot;

        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
        metrics::counter!("keywords_cache_refresh_total").increment(1);
        metrics::gauge!("keywords_cache_playbooks").set(count as f64);
        metrics::histogram!("keywords_cache_refresh_duration_ms").record(duration_ms);
        tracing::debug!(
            generation,
            playbook_count = count,
            scanned = playbooks.len(),
            duration_ms,
            "Keyword cache refreshed"
        );
        true
    }

    /// Asks the background refresher to rebuild the snapshot soon.
    ///
    /// A signal sent while no refresher is waiting is remembered, so an edit
    /// made during a refresh still triggers another one.
    pub fn invalidate(&self) {
        self.invalidated.notify_one();
    }

    /// Starts a background task that refreshes now, then on every tick of
    /// `interval` and on every [`invalidate`](Self::invalidate).
    ///
    /// The task stops when the returned handle is shut down or dropped.
    /// Must be called from within a tokio runtime.
    pub fn spawn_refresher(self: &Arc<Self>, interval: Duration) -> RefresherHandle {
        let cache = Arc::clone(self);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(MIN_REFRESH_INTERVAL));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {},
                    () = cache.invalidated.notified() => {
                        tracing::debug!("Keyword cache invalidated");
                    },
                }

                let worker = Arc::clone(&cache);
                if let Err(e) = tokio::task::spawn_blocking(move || worker.refresh()).await {
                    tracing::warn!(error = %e, "Keyword cache refresh task aborted");
                }
            }
            tracing::debug!("Keyword cache refresher stopped");
        });

        RefresherHandle {
            shutdown: Some(shutdown_tx),
            task,
        }
    }
}

/// Handle to a running background refresher.
pub struct RefresherHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl RefresherHandle {
    /// Stops the refresher and waits for an in-flight refresh to finish.
    pub async fn shutdown(self) {
        let Self { shutdown, task } = self;
        if let Some(tx) = shutdown {
            let _ = tx.send(());
        }
        if let Err(e) = task.await {
            tracing::warn!(error = %e, "Keyword cache refresher ended abnormally");
        }
    }
}
