//! Playbook management commands.

// Allow print_stdout in CLI module (consistent with main.rs)
#![allow(clippy::print_stdout)]

use super::App;
use crate::models::{
    Playbook, PlaybookFilterOptions, PlaybookId, RequesterInfo, SortDirection, SortField,
};
use crate::{Error, Result};
use serde::Serialize;

/// Fields accepted by `create` and `update`.
#[derive(Debug, Clone, Default)]
pub struct PlaybookArgs {
    /// Title.
    pub title: Option<String>,
    /// Description.
    pub description: Option<String>,
    /// Trigger keywords; replaces the current list when non-empty.
    pub keywords: Vec<String>,
    /// Members; replaces the current list when non-empty.
    pub members: Vec<String>,
}

impl PlaybookArgs {
    fn apply(self, playbook: &mut Playbook) {
        if let Some(title) = self.title {
            playbook.title = title;
        }
        if let Some(description) = self.description {
            playbook.description = description;
        }
        if !self.keywords.is_empty() {
            playbook.signal_any_keywords = self.keywords;
        }
        if !self.members.is_empty() {
            playbook.member_ids = self.members;
        }
    }
}

/// Listing options for `list`.
#[derive(Debug, Clone, Default)]
pub struct ListArgs {
    /// Restrict to one team.
    pub team: Option<String>,
    /// List as this user (members only unless `admin`).
    pub user: Option<String>,
    /// List as a team admin.
    pub admin: bool,
    /// Sort field name.
    pub sort: Option<String>,
    /// Sort descending.
    pub desc: bool,
    /// Zero-based page.
    pub page: usize,
    /// Page size; 0 lists everything.
    pub per_page: usize,
}

/// Creates a playbook and prints its id.
///
/// # Errors
///
/// Returns an error if the title is missing or the store fails.
pub fn create(app: &App, team: &str, user: &str, args: PlaybookArgs) -> Result<()> {
    if args.title.as_deref().is_none_or(str::is_empty) {
        return Err(Error::InvalidInput("a playbook needs a title".to_string()));
    }
    let mut playbook = Playbook::new(team, "");
    args.apply(&mut playbook);

    let id = app.service.create(playbook, user)?;
    println!("{id}");
    Ok(())
}

/// Updates a playbook in place.
///
/// # Errors
///
/// Returns an error if the playbook does not exist or the store fails.
pub fn update(app: &App, id: &str, user: &str, args: PlaybookArgs) -> Result<()> {
    let mut playbook = app.service.get(&PlaybookId::new(id))?;
    args.apply(&mut playbook);
    app.service.update(playbook, user)?;
    println!("Updated {id}");
    Ok(())
}

/// Prints one playbook as JSON.
///
/// # Errors
///
/// Returns an error if the playbook does not exist or the store fails.
pub fn show(app: &App, id: &str) -> Result<()> {
    let playbook = app.service.get(&PlaybookId::new(id))?;
    print_json(&playbook)
}

/// Lists playbooks as JSON.
///
/// # Errors
///
/// Returns an error if the sort field is unknown or the store fails.
pub fn list(app: &App, args: ListArgs) -> Result<()> {
    let Some(team) = args.team else {
        return print_json(&app.service.get_playbooks()?);
    };

    let sort = match args.sort.as_deref() {
        Some(name) => SortField::parse(name)
            .ok_or_else(|| Error::InvalidInput(format!("unknown sort field '{name}'")))?,
        None => SortField::default(),
    };
    let requester = RequesterInfo {
        user_id: args.user.unwrap_or_default(),
        team_id: team.clone(),
        is_admin: args.admin,
    };
    let options = PlaybookFilterOptions {
        sort,
        direction: if args.desc {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        },
        page: args.page,
        per_page: args.per_page,
    };

    print_json(&app.service.get_playbooks_for_team(&requester, &team, options)?)
}

/// Soft-deletes a playbook.
///
/// # Errors
///
/// Returns an error if the playbook does not exist or the store fails.
pub fn delete(app: &App, id: &str, user: &str) -> Result<()> {
    let playbook = app.service.get(&PlaybookId::new(id))?;
    app.service.delete(&playbook, user)?;
    println!("Deleted {id}");
    Ok(())
}

pub(super) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(|e| Error::OperationFailed {
        operation: "serialize_output".to_string(),
        cause: e.to_string(),
    })?;
    println!("{json}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SignalConfig;
    use crate::storage::InMemoryPlaybookStore;

    #[test]
    fn test_args_replace_only_given_fields() {
        let mut playbook = Playbook::new("t1", "Old")
            .with_keywords(["old"])
            .with_members(["alice"]);
        PlaybookArgs {
            title: Some("New".into()),
            keywords: vec!["new".into()],
            ..PlaybookArgs::default()
        }
        .apply(&mut playbook);

        assert_eq!(playbook.title, "New");
        assert_eq!(playbook.signal_any_keywords, vec!["new"]);
        assert_eq!(playbook.member_ids, vec!["alice"]);
    }

    #[test]
    fn test_create_requires_title() {
        let app = App::with_store(SignalConfig::default(), InMemoryPlaybookStore::new());
        let result = create(&app, "t1", "u1", PlaybookArgs::default());
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_list_rejects_unknown_sort() {
        let app = App::with_store(SignalConfig::default(), InMemoryPlaybookStore::new());
        let result = list(
            &app,
            ListArgs {
                team: Some("t1".into()),
                sort: Some("colour".into()),
                ..ListArgs::default()
            },
        );
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
