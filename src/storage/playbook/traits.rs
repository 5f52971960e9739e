//! Playbook store trait definition.

use crate::Result;
use crate::models::{
    GetPlaybooksResults, Playbook, PlaybookFilterOptions, PlaybookId, RequesterInfo,
};
use std::sync::Arc;

/// Durable source of truth for playbooks and per-user visibility.
///
/// Implementations are synchronous and may block; async callers should run
/// them on a blocking worker.
pub trait PlaybookStore: Send + Sync {
    /// Creates a playbook and returns its new ID.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] if the playbook already carries
    /// an ID, or an error if the store cannot be written.
    fn create(&self, playbook: &Playbook) -> Result<PlaybookId>;

    /// Gets a playbook by ID, including soft-deleted ones.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] if no such playbook exists.
    fn get(&self, id: &PlaybookId) -> Result<Playbook>;

    /// Returns every live playbook across all teams.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get_playbooks(&self) -> Result<Vec<Playbook>>;

    /// Returns one sorted page of the team's playbooks visible to the requester.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get_playbooks_for_team(
        &self,
        requester: &RequesterInfo,
        team_id: &str,
        options: PlaybookFilterOptions,
    ) -> Result<GetPlaybooksResults>;

    /// Counts the team's live playbooks.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get_num_playbooks_for_team(&self, team_id: &str) -> Result<usize>;

    /// Returns the IDs of the team's live playbooks the user may act on.
    ///
    /// # Errors
    ///
    /// Returns an error on connectivity or query failure.
    fn get_playbook_ids_for_user(&self, user_id: &str, team_id: &str) -> Result<Vec<PlaybookId>>;

    /// Replaces a playbook's stored fields and member list.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] for an empty ID and
    /// [`crate::Error::NotFound`] for an unknown one.
    fn update(&self, playbook: &Playbook) -> Result<()>;

    /// Soft-deletes a playbook.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] for an unknown ID.
    fn delete(&self, id: &PlaybookId) -> Result<()>;
}

impl<S: PlaybookStore + ?Sized> PlaybookStore for Arc<S> {
    fn create(&self, playbook: &Playbook) -> Result<PlaybookId> {
        (**self).create(playbook)
    }

    fn get(&self, id: &PlaybookId) -> Result<Playbook> {
        (**self).get(id)
    }

    fn get_playbooks(&self) -> Result<Vec<Playbook>> {
        (**self).get_playbooks()
    }

    fn get_playbooks_for_team(
        &self,
        requester: &RequesterInfo,
        team_id: &str,
        options: PlaybookFilterOptions,
    ) -> Result<GetPlaybooksResults> {
        (**self).get_playbooks_for_team(requester, team_id, options)
    }

    fn get_num_playbooks_for_team(&self, team_id: &str) -> Result<usize> {
        (**self).get_num_playbooks_for_team(team_id)
    }

    fn get_playbook_ids_for_user(&self, user_id: &str, team_id: &str) -> Result<Vec<PlaybookId>> {
        (**self).get_playbook_ids_for_user(user_id, team_id)
    }

    fn update(&self, playbook: &Playbook) -> Result<()> {
        (**self).update(playbook)
    }

    fn delete(&self, id: &PlaybookId) -> Result<()> {
        (**self).delete(id)
    }
}
