//! Per-user thread suppression for keyword suggestions.
//!
//! When a user answers a suggestion with "No, ignore", further messages in
//! that thread stop producing suggestions for them.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Default number of remembered (thread, user) pairs.
pub const DEFAULT_IGNORE_CAPACITY: usize = 10_000;

/// Default lifetime of an ignore entry.
pub const DEFAULT_IGNORE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Remembers which threads a user asked not to be prompted in.
pub trait ThreadIgnorer: Send + Sync {
    /// Marks a post (or thread root) as ignored for the user.
    fn ignore(&self, post_id: &str, user_id: &str);

    /// Returns true if suggestions in the thread are suppressed for the user.
    ///
    /// A top-level post (empty `root_id`) is never ignored.
    fn is_ignored(&self, root_id: &str, user_id: &str) -> bool;
}

/// In-memory [`ThreadIgnorer`] bounded by capacity and expiring entries after
/// a TTL.
///
/// Lock poisoning fails open: a poisoned lock means "not ignored", so the
/// user at worst sees one more suggestion.
pub struct LruThreadIgnorer {
    entries: RwLock<LruCache<(String, String), Instant>>,
    ttl: Duration,
}

impl LruThreadIgnorer {
    /// Creates an ignorer. A zero capacity is raised to one.
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: RwLock::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Number of remembered entries, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().map_or(0, |entries| entries.len())
    }

    /// Returns true if nothing is remembered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LruThreadIgnorer {
    fn default() -> Self {
        Self::new(DEFAULT_IGNORE_CAPACITY, DEFAULT_IGNORE_TTL)
    }
}

impl ThreadIgnorer for LruThreadIgnorer {
    fn ignore(&self, post_id: &str, user_id: &str) {
        if post_id.is_empty() {
            return;
        }
        let Ok(mut entries) = self.entries.write() else {
            tracing::warn!("Thread ignore cache lock poisoned, skipping ignore");
            return;
        };
        entries.put((post_id.to_string(), user_id.to_string()), Instant::now());
    }

    fn is_ignored(&self, root_id: &str, user_id: &str) -> bool {
        if root_id.is_empty() {
            return false;
        }
        let key = (root_id.to_string(), user_id.to_string());

        let ignored_at = match self.entries.read() {
            Ok(entries) => entries.peek(&key).copied(),
            Err(_) => return false,
        };

        match ignored_at {
            Some(at) if at.elapsed() <= self.ttl => true,
            Some(_) => {
                if let Ok(mut entries) = self.entries.write() {
                    entries.pop(&key);
                }
                false
            },
            None => false,
        }
    }
}
