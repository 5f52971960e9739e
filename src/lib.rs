//! # Playbook Signal
//!
//! Keyword-triggered playbook suggestions for chat message pipelines.
//!
//! Every posted message is scanned for the trigger keywords configured on the
//! team's playbooks. Matches are filtered against the playbooks the author is
//! allowed to see, and the survivors are offered to the author as an
//! ephemeral suggestion.
//!
//! ## Features
//!
//! - In-memory keyword cache refreshed in the background (copy-then-swap)
//! - Case-sensitive substring trigger matching
//! - Access filtering against a live permission source with a bounded timeout
//! - Pluggable playbook stores (`SQLite`, in-memory) behind a circuit breaker
//! - Suggestion formatting and fire-and-forget delivery via an event bus
//!
//! ## Example
//!
//! ```rust,ignore
//! use playbook_signal::services::{KeywordsCache, SuggestionEngine};
//!
//! let cache = Arc::new(KeywordsCache::new(store.clone()));
//! cache.refresh();
//!
//! let engine = SuggestionEngine::new(cache, store);
//! let suggestion = engine.suggest("team-1", "user-1", "we have an outage").await;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod cli;
pub mod config;
pub mod models;
pub mod observability;
pub mod platform;
pub mod poster;
pub mod services;
pub mod storage;
pub mod telemetry;

pub use config::{FeatureFlags, SignalConfig};
pub use models::{CachedPlaybook, Playbook, PlaybookId, Post, Suggestion};
pub use poster::Poster;
pub use services::{KeywordsCache, PlaybookService, SuggestionEngine};
pub use storage::PlaybookStore;

/// Error type for playbook-signal operations.
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Missing identifiers, malformed config values |
/// | `NotFound` | Playbook, channel, or session lookups miss |
/// | `OperationFailed` | Database queries fail, I/O errors, poisoned locks |
/// | `Timeout` | A bounded store call did not finish in time |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    ///
    /// Raised when:
    /// - Deleting a playbook that has no identifier
    /// - A config value cannot be parsed
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A looked-up entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// An operation failed.
    ///
    /// Raised when:
    /// - `SQLite` queries fail
    /// - Filesystem I/O errors occur
    /// - A circuit breaker rejects the call
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// A bounded operation exceeded its deadline.
    #[error("operation '{operation}' timed out after {after_ms}ms")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The time budget that was exceeded.
        after_ms: u64,
    },
}

/// Result type alias for playbook-signal operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in milliseconds.
///
/// Playbook timestamps (`create_at`, `update_at`, `delete_at`) use this unit.
///
/// ```rust
/// use playbook_signal::current_timestamp_millis;
///
/// assert!(current_timestamp_millis() > 0);
/// ```
#[must_use]
pub fn current_timestamp_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
