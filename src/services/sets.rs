//! Set helpers shared by matching and access filtering.

use crate::models::PlaybookId;
use std::collections::{BTreeSet, HashSet};

/// Collapses repeated strings into a sorted set.
///
/// Idempotent: feeding the output back in yields the same set.
pub fn remove_duplicates<I, S>(items: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

/// Builds a lookup set from a list of playbook IDs.
pub fn id_set<I>(ids: I) -> HashSet<PlaybookId>
where
    I: IntoIterator<Item = PlaybookId>,
{
    ids.into_iter().collect()
}
