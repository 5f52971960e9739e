//! In-memory playbook store.

use super::{PlaybookStore, sort_and_page, visible_to};
use crate::models::{
    GetPlaybooksResults, Playbook, PlaybookFilterOptions, PlaybookId, RequesterInfo,
};
use crate::{Error, Result, current_timestamp_millis};
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Playbook store kept entirely in process memory.
#[derive(Default)]
pub struct InMemoryPlaybookStore {
    playbooks: RwLock<BTreeMap<PlaybookId, Playbook>>,
}

impl InMemoryPlaybookStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<PlaybookId, Playbook>>> {
        self.playbooks.read().map_err(|e| Error::OperationFailed {
            operation: "lock_memory_store".to_string(),
            cause: e.to_string(),
        })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<PlaybookId, Playbook>>> {
        self.playbooks.write().map_err(|e| Error::OperationFailed {
            operation: "lock_memory_store".to_string(),
            cause: e.to_string(),
        })
    }

    fn live_in_team(&self, team_id: &str) -> Result<Vec<Playbook>> {
        Ok(self
            .read()?
            .values()
            .filter(|p| !p.is_deleted() && p.team_id == team_id)
            .cloned()
            .collect())
    }
}

impl PlaybookStore for InMemoryPlaybookStore {
    fn create(&self, playbook: &Playbook) -> Result<PlaybookId> {
        if !playbook.id.is_empty() {
            return Err(Error::InvalidInput("ID should be empty".to_string()));
        }
        let id = PlaybookId::generate();
        let mut stored = playbook.clone();
        stored.id = id.clone();
        self.write()?.insert(id.clone(), stored);
        Ok(id)
    }

    fn get(&self, id: &PlaybookId) -> Result<Playbook> {
        self.read()?
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("playbook {id}")))
    }

    fn get_playbooks(&self) -> Result<Vec<Playbook>> {
        let mut playbooks: Vec<Playbook> = self
            .read()?
            .values()
            .filter(|p| !p.is_deleted())
            .cloned()
            .collect();
        playbooks.sort_by(|a, b| a.create_at.cmp(&b.create_at).then_with(|| a.id.cmp(&b.id)));
        Ok(playbooks)
    }

    fn get_playbooks_for_team(
        &self,
        requester: &RequesterInfo,
        team_id: &str,
        options: PlaybookFilterOptions,
    ) -> Result<GetPlaybooksResults> {
        let visible = self
            .live_in_team(team_id)?
            .into_iter()
            .filter(|p| visible_to(p, requester))
            .collect();
        Ok(sort_and_page(visible, options))
    }

    fn get_num_playbooks_for_team(&self, team_id: &str) -> Result<usize> {
        Ok(self.live_in_team(team_id)?.len())
    }

    fn get_playbook_ids_for_user(&self, user_id: &str, team_id: &str) -> Result<Vec<PlaybookId>> {
        Ok(self
            .live_in_team(team_id)?
            .into_iter()
            .filter(|p| p.member_ids.iter().any(|m| m == user_id))
            .map(|p| p.id)
            .collect())
    }

    fn update(&self, playbook: &Playbook) -> Result<()> {
        if playbook.id.is_empty() {
            return Err(Error::InvalidInput("ID should not be empty".to_string()));
        }
        let mut playbooks = self.write()?;
        let slot = playbooks
            .get_mut(&playbook.id)
            .ok_or_else(|| Error::NotFound(format!("playbook {}", playbook.id)))?;
        *slot = playbook.clone();
        Ok(())
    }

    fn delete(&self, id: &PlaybookId) -> Result<()> {
        let mut playbooks = self.write()?;
        let slot = playbooks
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("playbook {id}")))?;
        slot.delete_at = current_timestamp_millis();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_assigns_id() {
        let store = InMemoryPlaybookStore::new();
        let id = store.create(&Playbook::new("team", "Outage")).unwrap();
        assert!(!id.is_empty());
        assert_eq!(store.get(&id).unwrap().title, "Outage");
    }

    #[test]
    fn test_create_rejects_existing_id() {
        let store = InMemoryPlaybookStore::new();
        let result = store.create(&Playbook::new("team", "Outage").with_id("taken"));
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_deleted_playbooks_disappear_from_listings() {
        let store = InMemoryPlaybookStore::new();
        let id = store
            .create(&Playbook::new("team", "Outage").with_members(["alice"]))
            .unwrap();
        store.delete(&id).unwrap();

        assert!(store.get_playbooks().unwrap().is_empty());
        assert_eq!(store.get_num_playbooks_for_team("team").unwrap(), 0);
        assert!(
            store
                .get_playbook_ids_for_user("alice", "team")
                .unwrap()
                .is_empty()
        );
        assert!(store.get(&id).unwrap().is_deleted());
    }

    #[test]
    fn test_ids_for_user_respect_team_and_membership() {
        let store = InMemoryPlaybookStore::new();
        let mine = store
            .create(&Playbook::new("t1", "Mine").with_members(["alice"]))
            .unwrap();
        store
            .create(&Playbook::new("t1", "Theirs").with_members(["bob"]))
            .unwrap();
        store
            .create(&Playbook::new("t2", "Elsewhere").with_members(["alice"]))
            .unwrap();

        assert_eq!(
            store.get_playbook_ids_for_user("alice", "t1").unwrap(),
            vec![mine]
        );
    }

    #[test]
    fn test_update_unknown_is_not_found() {
        let store = InMemoryPlaybookStore::new();
        let result = store.update(&Playbook::new("t", "x").with_id("missing"));
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
