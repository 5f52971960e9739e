//! Suggestion results and the interactive post built from them.

use super::CachedPlaybook;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Access-filtered result of matching one message.
///
/// Both parts are sets: playbooks keep snapshot order and are unique by id,
/// triggers are sorted and unique.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    /// Playbooks the user may run that matched the message.
    pub playbooks: Vec<CachedPlaybook>,
    /// Keywords that matched across those playbooks.
    pub triggers: BTreeSet<String>,
}

impl Suggestion {
    /// The empty suggestion.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            playbooks: Vec::new(),
            triggers: BTreeSet::new(),
        }
    }

    /// Returns true if nothing should be suggested.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.playbooks.is_empty()
    }
}

/// Interactive element kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    /// A push button.
    Button,
    /// A drop-down select.
    Select,
}

/// Endpoint invoked when an action is used.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionIntegration {
    /// Relative URL of the handler.
    pub url: String,
    /// Context echoed back to the handler.
    pub context: serde_json::Map<String, serde_json::Value>,
}

/// One entry of a select action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOption {
    /// Label.
    pub text: String,
    /// Submitted value.
    pub value: String,
}

/// A button or select attached to a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostAction {
    /// Stable action id.
    pub id: String,
    /// Label.
    pub name: String,
    /// Element kind.
    #[serde(rename = "type")]
    pub action_type: ActionType,
    /// Handler.
    pub integration: ActionIntegration,
    /// Options for select actions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<ActionOption>,
    /// Visual style.
    pub style: String,
}

/// Attachment carrying the suggestion actions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionAttachment {
    /// Markdown text under the actions.
    pub text: String,
    /// Actions, in display order.
    pub actions: Vec<PostAction>,
}

/// Ephemeral post offering suggested playbooks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionPost {
    /// Markdown message.
    pub message: String,
    /// Interactive attachment.
    pub attachment: SuggestionAttachment,
}
