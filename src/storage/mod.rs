//! Playbook storage.
//!
//! The store is the durable source of truth for playbooks and for who may see
//! them. The suggestion path only ever reads from it: a full scan feeds the
//! keyword cache and a per-user visibility query feeds access filtering.

pub mod playbook;
pub mod resilience;

pub use playbook::{InMemoryPlaybookStore, PlaybookStore, SqlitePlaybookStore};
pub use resilience::{CircuitBreaker, ResilientPlaybookStore, StoreResilienceConfig};
