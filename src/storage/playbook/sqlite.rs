//! SQLite-based playbook store.
//!
//! Playbooks live in one table, with checklists and trigger keywords stored
//! as JSON columns. Access is modelled as a membership table so the per-user
//! visibility query is a single join.

use super::{PlaybookStore, sort_and_page, visible_to};
use crate::models::{
    GetPlaybooksResults, Playbook, PlaybookFilterOptions, PlaybookId, RequesterInfo,
};
use crate::{Error, Result, current_timestamp_millis};
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const SELECT_COLUMNS: &str = "id, team_id, title, description, checklists, signal_any_keywords, \
                              create_at, update_at, delete_at";

/// `SQLite`-backed playbook store.
pub struct SqlitePlaybookStore {
    /// Connection to the `SQLite` database.
    conn: Mutex<Connection>,
    /// Path to the `SQLite` database.
    db_path: PathBuf,
}

/// Raw playbook row before JSON columns are decoded.
struct PlaybookRow {
    id: String,
    team_id: String,
    title: String,
    description: String,
    checklists: String,
    keywords: String,
    create_at: i64,
    update_at: i64,
    delete_at: i64,
}

impl PlaybookRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            team_id: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            checklists: row.get(4)?,
            keywords: row.get(5)?,
            create_at: row.get(6)?,
            update_at: row.get(7)?,
            delete_at: row.get(8)?,
        })
    }

    fn into_playbook(self, member_ids: Vec<String>) -> Result<Playbook> {
        let checklists = serde_json::from_str(&self.checklists).map_err(|e| {
            Error::OperationFailed {
                operation: "decode_checklists".to_string(),
                cause: format!("{}: {e}", self.id),
            }
        })?;
        let signal_any_keywords = serde_json::from_str(&self.keywords).map_err(|e| {
            Error::OperationFailed {
                operation: "decode_keywords".to_string(),
                cause: format!("{}: {e}", self.id),
            }
        })?;

        Ok(Playbook {
            id: PlaybookId::new(self.id),
            team_id: self.team_id,
            title: self.title,
            description: self.description,
            checklists,
            member_ids,
            signal_any_keywords,
            create_at: self.create_at,
            update_at: self.update_at,
            delete_at: self.delete_at,
        })
    }
}

fn db_error(operation: &'static str) -> impl FnOnce(rusqlite::Error) -> Error {
    move |e| Error::OperationFailed {
        operation: operation.to_string(),
        cause: e.to_string(),
    }
}

fn encode_json<T: serde::Serialize>(operation: &'static str, value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| Error::OperationFailed {
        operation: operation.to_string(),
        cause: e.to_string(),
    })
}

impl SqlitePlaybookStore {
    /// Opens (or creates) a store at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| Error::OperationFailed {
                operation: "create_store_dir".to_string(),
                cause: e.to_string(),
            })?;
        }

        let conn = Connection::open(&db_path).map_err(db_error("open_playbook_db"))?;
        configure_connection(&conn);

        let store = Self {
            conn: Mutex::new(conn),
            db_path,
        };
        store.initialize()?;
        Ok(store)
    }

    /// Creates an in-memory store (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_error("open_playbook_db_memory"))?;
        let store = Self {
            conn: Mutex::new(conn),
            db_path: PathBuf::from(":memory:"),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Returns the default database path in the platform data directory.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        directories::BaseDirs::new().map(|d| {
            d.data_local_dir()
                .join("playbook-signal")
                .join("playbooks.db")
        })
    }

    /// Returns the database path.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn initialize(&self) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS playbooks (
                id TEXT PRIMARY KEY,
                team_id TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                checklists TEXT NOT NULL DEFAULT '[]',
                signal_any_keywords TEXT NOT NULL DEFAULT '[]',
                create_at INTEGER NOT NULL,
                update_at INTEGER NOT NULL,
                delete_at INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_playbooks_team ON playbooks(team_id, delete_at);
            CREATE TABLE IF NOT EXISTS playbook_members (
                playbook_id TEXT NOT NULL REFERENCES playbooks(id),
                member_id TEXT NOT NULL,
                PRIMARY KEY (playbook_id, member_id)
            );
            CREATE INDEX IF NOT EXISTS idx_playbook_members_member
                ON playbook_members(member_id);",
        )
        .map_err(db_error("create_playbook_tables"))
    }

    /// Locks the connection, recovering from poisoning.
    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>> {
        Ok(self.conn.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("SQLite mutex was poisoned, recovering");
            metrics::counter!("sqlite_mutex_poison_recovery_total").increment(1);
            poisoned.into_inner()
        }))
    }

    fn query_playbooks(
        conn: &Connection,
        where_clause: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Playbook>> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM playbooks WHERE {where_clause} ORDER BY create_at, id"
        );
        let mut stmt = conn.prepare(&sql).map_err(db_error("prepare_playbook_query"))?;
        let rows = stmt
            .query_map(params, PlaybookRow::read)
            .map_err(db_error("query_playbooks"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_error("read_playbook_row"))?;

        let mut members = Self::all_members(conn)?;
        rows.into_iter()
            .map(|row| {
                let member_ids = members.remove(&row.id).unwrap_or_default();
                row.into_playbook(member_ids)
            })
            .collect()
    }

    fn all_members(conn: &Connection) -> Result<HashMap<String, Vec<String>>> {
        let mut stmt = conn
            .prepare("SELECT playbook_id, member_id FROM playbook_members ORDER BY rowid")
            .map_err(db_error("prepare_member_query"))?;
        let pairs = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .map_err(db_error("query_members"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_error("read_member_row"))?;

        let mut members: HashMap<String, Vec<String>> = HashMap::new();
        for (playbook_id, member_id) in pairs {
            members.entry(playbook_id).or_default().push(member_id);
        }
        Ok(members)
    }

    fn members_of(conn: &Connection, id: &str) -> Result<Vec<String>> {
        let mut stmt = conn
            .prepare("SELECT member_id FROM playbook_members WHERE playbook_id = ?1 ORDER BY rowid")
            .map_err(db_error("prepare_member_query"))?;
        stmt.query_map(params![id], |row| row.get(0))
            .map_err(db_error("query_members"))?
            .collect::<rusqlite::Result<Vec<String>>>()
            .map_err(db_error("read_member_row"))
    }

    fn replace_members(tx: &Transaction<'_>, id: &str, member_ids: &[String]) -> Result<()> {
        tx.execute(
            "DELETE FROM playbook_members WHERE playbook_id = ?1",
            params![id],
        )
        .map_err(db_error("clear_members"))?;
        for member_id in member_ids {
            tx.execute(
                "INSERT OR IGNORE INTO playbook_members (playbook_id, member_id) VALUES (?1, ?2)",
                params![id, member_id],
            )
            .map_err(db_error("insert_member"))?;
        }
        Ok(())
    }
}

/// Applies WAL mode and a busy timeout; failures are non-fatal.
fn configure_connection(conn: &Connection) {
    let _ = conn.pragma_update(None, "journal_mode", "WAL");
    let _ = conn.pragma_update(None, "synchronous", "NORMAL");
    let _ = conn.pragma_update(None, "busy_timeout", "5000");
}

impl PlaybookStore for SqlitePlaybookStore {
    fn create(&self, playbook: &Playbook) -> Result<PlaybookId> {
        if !playbook.id.is_empty() {
            return Err(Error::InvalidInput("ID should be empty".to_string()));
        }
        let id = PlaybookId::generate();
        let checklists = encode_json("encode_checklists", &playbook.checklists)?;
        let keywords = encode_json("encode_keywords", &playbook.signal_any_keywords)?;

        let mut conn = self.lock_conn()?;
        let tx = conn.transaction().map_err(db_error("begin_create"))?;
        tx.execute(
            "INSERT INTO playbooks
             (id, team_id, title, description, checklists, signal_any_keywords,
              create_at, update_at, delete_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0)",
            params![
                id.as_str(),
                playbook.team_id,
                playbook.title,
                playbook.description,
                checklists,
                keywords,
                playbook.create_at,
                playbook.update_at,
            ],
        )
        .map_err(db_error("insert_playbook"))?;
        Self::replace_members(&tx, id.as_str(), &playbook.member_ids)?;
        tx.commit().map_err(db_error("commit_create"))?;

        Ok(id)
    }

    fn get(&self, id: &PlaybookId) -> Result<Playbook> {
        let conn = self.lock_conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM playbooks WHERE id = ?1"),
                params![id.as_str()],
                PlaybookRow::read,
            )
            .optional()
            .map_err(db_error("get_playbook"))?
            .ok_or_else(|| Error::NotFound(format!("playbook {id}")))?;
        let members = Self::members_of(&conn, id.as_str())?;
        row.into_playbook(members)
    }

    fn get_playbooks(&self) -> Result<Vec<Playbook>> {
        let conn = self.lock_conn()?;
        Self::query_playbooks(&conn, "delete_at = 0", [])
    }

    fn get_playbooks_for_team(
        &self,
        requester: &RequesterInfo,
        team_id: &str,
        options: PlaybookFilterOptions,
    ) -> Result<GetPlaybooksResults> {
        let conn = self.lock_conn()?;
        let visible = Self::query_playbooks(&conn, "team_id = ?1 AND delete_at = 0", params![team_id])?
            .into_iter()
            .filter(|p| visible_to(p, requester))
            .collect();
        Ok(sort_and_page(visible, options))
    }

    fn get_num_playbooks_for_team(&self, team_id: &str) -> Result<usize> {
        let conn = self.lock_conn()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM playbooks WHERE team_id = ?1 AND delete_at = 0",
                params![team_id],
                |row| row.get(0),
            )
            .map_err(db_error("count_playbooks"))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn get_playbook_ids_for_user(&self, user_id: &str, team_id: &str) -> Result<Vec<PlaybookId>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT p.id FROM playbooks p
                 JOIN playbook_members m ON m.playbook_id = p.id
                 WHERE m.member_id = ?1 AND p.team_id = ?2 AND p.delete_at = 0
                 ORDER BY p.create_at, p.id",
            )
            .map_err(db_error("prepare_ids_for_user"))?;
        stmt.query_map(params![user_id, team_id], |row| {
            row.get::<_, String>(0).map(PlaybookId::new)
        })
        .map_err(db_error("query_ids_for_user"))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(db_error("read_ids_for_user"))
    }

    fn update(&self, playbook: &Playbook) -> Result<()> {
        if playbook.id.is_empty() {
            return Err(Error::InvalidInput("ID should not be empty".to_string()));
        }
        let checklists = encode_json("encode_checklists", &playbook.checklists)?;
        let keywords = encode_json("encode_keywords", &playbook.signal_any_keywords)?;

        let mut conn = self.lock_conn()?;
        let tx = conn.transaction().map_err(db_error("begin_update"))?;
        let changed = tx
            .execute(
                "UPDATE playbooks
                 SET team_id = ?2, title = ?3, description = ?4, checklists = ?5,
                     signal_any_keywords = ?6, update_at = ?7, delete_at = ?8
                 WHERE id = ?1",
                params![
                    playbook.id.as_str(),
                    playbook.team_id,
                    playbook.title,
                    playbook.description,
                    checklists,
                    keywords,
                    playbook.update_at,
                    playbook.delete_at,
                ],
            )
            .map_err(db_error("update_playbook"))?;
        if changed == 0 {
            return Err(Error::NotFound(format!("playbook {}", playbook.id)));
        }
        Self::replace_members(&tx, playbook.id.as_str(), &playbook.member_ids)?;
        tx.commit().map_err(db_error("commit_update"))
    }

    fn delete(&self, id: &PlaybookId) -> Result<()> {
        let conn = self.lock_conn()?;
        let changed = conn
            .execute(
                "UPDATE playbooks SET delete_at = ?2 WHERE id = ?1",
                params![id.as_str(), current_timestamp_millis()],
            )
            .map_err(db_error("delete_playbook"))?;
        if changed == 0 {
            return Err(Error::NotFound(format!("playbook {id}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Checklist, ChecklistItem, SortField};
    use tempfile::TempDir;

    fn sample(team: &str, title: &str) -> Playbook {
        let mut playbook = Playbook::new(team, title)
            .with_keywords(["outage", "incident"])
            .with_members(["alice", "bob"]);
        playbook.checklists = vec![Checklist {
            title: "Triage".into(),
            items: vec![ChecklistItem {
                title: "Page on-call".into(),
                command: Some("/page oncall".into()),
            }],
        }];
        playbook.create_at = 10;
        playbook.update_at = 10;
        playbook
    }

    #[test]
    fn test_create_and_get_roundtrip() {
        let store = SqlitePlaybookStore::in_memory().unwrap();
        let id = store.create(&sample("team", "Outage")).unwrap();

        let loaded = store.get(&id).unwrap();
        assert_eq!(loaded.id, id);
        assert_eq!(loaded.title, "Outage");
        assert_eq!(loaded.signal_any_keywords, vec!["outage", "incident"]);
        assert_eq!(loaded.member_ids, vec!["alice", "bob"]);
        assert_eq!(loaded.num_steps(), 1);
        assert_eq!(loaded.create_at, 10);
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let store = SqlitePlaybookStore::in_memory().unwrap();
        let result = store.get(&PlaybookId::new("nope"));
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_update_replaces_members_and_keywords() {
        let store = SqlitePlaybookStore::in_memory().unwrap();
        let id = store.create(&sample("team", "Outage")).unwrap();

        let mut playbook = store.get(&id).unwrap();
        playbook.member_ids = vec!["carol".into()];
        playbook.signal_any_keywords = vec!["sev1".into()];
        store.update(&playbook).unwrap();

        let loaded = store.get(&id).unwrap();
        assert_eq!(loaded.member_ids, vec!["carol"]);
        assert_eq!(loaded.signal_any_keywords, vec!["sev1"]);
        assert!(
            store
                .get_playbook_ids_for_user("alice", "team")
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_soft_delete() {
        let store = SqlitePlaybookStore::in_memory().unwrap();
        let id = store.create(&sample("team", "Outage")).unwrap();
        store.delete(&id).unwrap();

        assert!(store.get_playbooks().unwrap().is_empty());
        assert_eq!(store.get_num_playbooks_for_team("team").unwrap(), 0);
        assert!(store.get(&id).unwrap().is_deleted());
        assert!(matches!(
            store.delete(&PlaybookId::new("missing")),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_ids_for_user_join() {
        let store = SqlitePlaybookStore::in_memory().unwrap();
        let a = store.create(&sample("t1", "A")).unwrap();
        store
            .create(&sample("t1", "B").with_members(["carol"]))
            .unwrap();
        store.create(&sample("t2", "C")).unwrap();

        assert_eq!(store.get_playbook_ids_for_user("alice", "t1").unwrap(), vec![a]);
    }

    #[test]
    fn test_team_listing_filters_by_membership() {
        let store = SqlitePlaybookStore::in_memory().unwrap();
        store.create(&sample("t1", "Zeta")).unwrap();
        store
            .create(&sample("t1", "Alpha").with_members(["carol"]))
            .unwrap();

        let alice = RequesterInfo {
            user_id: "alice".into(),
            team_id: "t1".into(),
            is_admin: false,
        };
        let results = store
            .get_playbooks_for_team(&alice, "t1", PlaybookFilterOptions::default())
            .unwrap();
        assert_eq!(results.total_count, 1);
        assert_eq!(results.items[0].title, "Zeta");

        let admin = RequesterInfo {
            is_admin: true,
            ..alice
        };
        let results = store
            .get_playbooks_for_team(
                &admin,
                "t1",
                PlaybookFilterOptions {
                    sort: SortField::Title,
                    ..PlaybookFilterOptions::default()
                },
            )
            .unwrap();
        let titles: Vec<_> = results.items.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Alpha", "Zeta"]);
    }

    #[test]
    fn test_file_backed_store_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("playbooks.db");

        let id = {
            let store = SqlitePlaybookStore::new(&path).unwrap();
            store.create(&sample("team", "Outage")).unwrap()
        };

        let reopened = SqlitePlaybookStore::new(&path).unwrap();
        assert_eq!(reopened.db_path(), path.as_path());
        assert_eq!(reopened.get(&id).unwrap().title, "Outage");
    }
}
