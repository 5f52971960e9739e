//! Business logic services.
//!
//! The suggestion path, leaf first:
//!
//! 1. [`KeywordsCache`] holds a snapshot of every playbook with keywords
//! 2. [`triggers_for_message`] matches one cached playbook against a message
//! 3. [`SuggestionEngine`] matches a team's playbooks and filters by access
//! 4. [`PlaybookService`] wires the engine to posts, formatting and delivery

pub mod formatting;
pub mod keywords_cache;
mod matcher;
mod playbook;
mod sets;
pub mod suggestion;
pub mod thread_ignorer;

pub use formatting::SuggestionFormatter;
pub use keywords_cache::{DEFAULT_REFRESH_INTERVAL, KeywordsCache, RefresherHandle, Snapshot};
pub use matcher::triggers_for_message;
pub use playbook::{PLAYBOOK_CREATED_EVENT, PLAYBOOK_DELETED_EVENT, PlaybookService};
pub use sets::{id_set, remove_duplicates};
pub use suggestion::{DEFAULT_ACCESS_TIMEOUT, SuggestionEngine};
pub use thread_ignorer::{LruThreadIgnorer, ThreadIgnorer};
