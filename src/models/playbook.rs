//! Playbook records and their cached projection.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a playbook.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaybookId(String);

impl PlaybookId {
    /// Creates a new playbook ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh, time-ordered playbook ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7().simple().to_string())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the ID is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for PlaybookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for PlaybookId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PlaybookId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A single step of a checklist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    /// Step title.
    pub title: String,
    /// Optional slash command run by the step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

/// A named group of checklist steps (a "stage").
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checklist {
    /// Stage title.
    pub title: String,
    /// Steps in order.
    #[serde(default)]
    pub items: Vec<ChecklistItem>,
}

/// A playbook as owned by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playbook {
    /// Unique identifier (empty until created).
    #[serde(default)]
    pub id: PlaybookId,
    /// Owning team.
    pub team_id: String,
    /// Display title.
    pub title: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Checklists run by the playbook.
    #[serde(default)]
    pub checklists: Vec<Checklist>,
    /// Users who may see and run the playbook.
    #[serde(default)]
    pub member_ids: Vec<String>,
    /// Trigger keywords; any one of them occurring in a message suggests the playbook.
    #[serde(default)]
    pub signal_any_keywords: Vec<String>,
    /// Creation time (Unix millis).
    #[serde(default)]
    pub create_at: i64,
    /// Last update time (Unix millis).
    #[serde(default)]
    pub update_at: i64,
    /// Soft-deletion time (Unix millis), 0 while live.
    #[serde(default)]
    pub delete_at: i64,
}

impl Playbook {
    /// Creates a playbook for a team with the given title.
    #[must_use]
    pub fn new(team_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            team_id: team_id.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    /// Sets the trigger keywords.
    #[must_use]
    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.signal_any_keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the member list.
    #[must_use]
    pub fn with_members<I, S>(mut self, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.member_ids = members.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the identifier.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<PlaybookId>) -> Self {
        self.id = id.into();
        self
    }

    /// Number of checklists (stages).
    #[must_use]
    pub fn num_stages(&self) -> usize {
        self.checklists.len()
    }

    /// Total number of checklist items (steps).
    #[must_use]
    pub fn num_steps(&self) -> usize {
        self.checklists.iter().map(|c| c.items.len()).sum()
    }

    /// Returns true once the playbook has been soft-deleted.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.delete_at != 0
    }
}

/// Lightweight read-only projection of a playbook used for keyword matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedPlaybook {
    /// Playbook identifier.
    pub id: PlaybookId,
    /// Owning team.
    pub team_id: String,
    /// Display title.
    pub title: String,
    /// Trigger keywords.
    pub signal_any_keywords: Vec<String>,
}

impl CachedPlaybook {
    /// Projects a playbook, or returns `None` when it has no keywords and so
    /// can never trigger.
    ///
    /// Keywords are copied as stored. A blank keyword is a substring of every
    /// message and so triggers on all of them.
    #[must_use]
    pub fn project(playbook: &Playbook) -> Option<Self> {
        if playbook.signal_any_keywords.is_empty() {
            return None;
        }
        Some(Self {
            id: playbook.id.clone(),
            team_id: playbook.team_id.clone(),
            title: playbook.title.clone(),
            signal_any_keywords: playbook.signal_any_keywords.clone(),
        })
    }
}

/// Who is asking for a team listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequesterInfo {
    /// Requesting user.
    pub user_id: String,
    /// Team the request is made in.
    pub team_id: String,
    /// Admins see every playbook of the team.
    pub is_admin: bool,
}

/// Sort key for team listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    /// By title.
    #[default]
    Title,
    /// By number of checklists.
    Stages,
    /// By total number of checklist items.
    Steps,
    /// By creation time.
    Created,
}

impl SortField {
    /// Parses a sort field name, case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "title" => Some(Self::Title),
            "stages" => Some(Self::Stages),
            "steps" => Some(Self::Steps),
            "created" | "create_at" => Some(Self::Created),
            _ => None,
        }
    }
}

/// Sort direction for team listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

/// Sorting and paging for team listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybookFilterOptions {
    /// Sort key.
    pub sort: SortField,
    /// Sort direction.
    pub direction: SortDirection,
    /// Zero-based page.
    pub page: usize,
    /// Page size; 0 returns everything.
    pub per_page: usize,
}

/// One page of a team listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetPlaybooksResults {
    /// Number of playbooks visible to the requester.
    pub total_count: usize,
    /// Number of pages at the requested page size.
    pub page_count: usize,
    /// Whether pages follow this one.
    pub has_more: bool,
    /// Playbooks on this page.
    pub items: Vec<Playbook>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_skips_playbooks_without_keywords() {
        let playbook = Playbook::new("team", "Quiet").with_id("p1");
        assert!(CachedPlaybook::project(&playbook).is_none());
    }

    #[test]
    fn test_project_keeps_blank_keywords() {
        let only_blank = Playbook::new("team", "Blank").with_keywords([""]);
        let cached = CachedPlaybook::project(&only_blank).unwrap();
        assert_eq!(cached.signal_any_keywords, vec![""]);

        let mixed = Playbook::new("team", "Mixed").with_keywords(["", "sev1"]);
        let cached = CachedPlaybook::project(&mixed).unwrap();
        assert_eq!(cached.signal_any_keywords, vec!["", "sev1"]);
    }

    #[test]
    fn test_project_copies_matching_fields() {
        let playbook = Playbook::new("team", "Outage")
            .with_id("p1")
            .with_keywords(["outage", "down"]);
        let cached = CachedPlaybook::project(&playbook).unwrap();

        assert_eq!(cached.id.as_str(), "p1");
        assert_eq!(cached.team_id, "team");
        assert_eq!(cached.signal_any_keywords, vec!["outage", "down"]);
    }

    #[test]
    fn test_generated_ids_are_distinct() {
        assert_ne!(PlaybookId::generate(), PlaybookId::generate());
    }

    #[test]
    fn test_steps_and_stages() {
        let mut playbook = Playbook::new("team", "Release");
        playbook.checklists = vec![
            Checklist {
                title: "Prepare".into(),
                items: vec![ChecklistItem::default(), ChecklistItem::default()],
            },
            Checklist {
                title: "Ship".into(),
                items: vec![ChecklistItem::default()],
            },
        ];
        assert_eq!(playbook.num_stages(), 2);
        assert_eq!(playbook.num_steps(), 3);
    }

    #[test]
    fn test_sort_field_parse() {
        assert_eq!(SortField::parse("Title"), Some(SortField::Title));
        assert_eq!(SortField::parse("steps"), Some(SortField::Steps));
        assert_eq!(SortField::parse("bogus"), None);
    }
}
