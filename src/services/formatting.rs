//! Renders a [`Suggestion`] into the interactive post shown to the user.

use crate::models::{
    ActionIntegration, ActionOption, ActionType, PostAction, Suggestion, SuggestionAttachment,
    SuggestionPost,
};
use serde_json::{Map, Value, json};

/// Site URL used when none is configured.
pub const DEFAULT_SITE_URL: &str = "http://localhost:8065";

/// Plugin id used to build action and playbook URLs.
pub const DEFAULT_PLUGIN_ID: &str = "playbooks";

const ACTION_STYLE: &str = "primary";

/// Builds suggestion posts for one deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestionFormatter {
    site_url: String,
    plugin_id: String,
}

impl Default for SuggestionFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_SITE_URL, DEFAULT_PLUGIN_ID)
    }
}

impl SuggestionFormatter {
    /// Creates a formatter. A trailing slash on `site_url` is dropped.
    #[must_use]
    pub fn new(site_url: impl Into<String>, plugin_id: impl Into<String>) -> Self {
        let site_url: String = site_url.into();
        Self {
            site_url: site_url.trim_end_matches('/').to_string(),
            plugin_id: plugin_id.into(),
        }
    }

    /// Base URL of the playbook listing.
    #[must_use]
    pub fn playbooks_url(&self) -> String {
        format!("{}/{}/playbooks", self.site_url, self.plugin_id)
    }

    fn action_url(&self, action: &str) -> String {
        format!("/plugins/{}/api/v0/signal/keywords/{action}", self.plugin_id)
    }

    /// The markdown message naming the triggers and the playbook(s).
    #[must_use]
    pub fn message(&self, suggestion: &Suggestion) -> String {
        let triggers: Vec<&str> = suggestion.triggers.iter().map(String::as_str).collect();
        let trigger_text = if triggers.len() == 1 {
            format!("`{}` is a trigger", triggers[0])
        } else {
            format!("`{}` are triggers", triggers.join("`, `"))
        };

        match suggestion.playbooks.as_slice() {
            [only] => format!(
                "{trigger_text} for the [{}]({}/{}) playbook, would you like to run it?",
                only.title,
                self.playbooks_url(),
                only.id
            ),
            _ => format!(
                "{trigger_text} for the multiple playbooks, would you like to run one of them?"
            ),
        }
    }

    /// The attachment carrying the run and ignore actions.
    #[must_use]
    pub fn attachment(
        &self,
        suggestion: &Suggestion,
        post_id: &str,
        is_mobile: bool,
    ) -> SuggestionAttachment {
        let ignore_button = PostAction {
            id: "ignoreKeywordsButton".to_string(),
            name: "No, ignore".to_string(),
            action_type: ActionType::Button,
            integration: ActionIntegration {
                url: self.action_url("ignore-thread"),
                context: context([("postID", json!(post_id))]),
            },
            options: Vec::new(),
            style: ACTION_STYLE.to_string(),
        };

        if let [only] = suggestion.playbooks.as_slice() {
            let run_button = PostAction {
                id: "runPlaybookButton".to_string(),
                name: "Yes, run playbook".to_string(),
                action_type: ActionType::Button,
                integration: ActionIntegration {
                    url: self.action_url("run-playbook"),
                    context: context([
                        ("postID", json!(post_id)),
                        ("selected_option", json!(only.id.as_str())),
                        ("isMobile", json!(is_mobile)),
                    ]),
                },
                options: Vec::new(),
                style: ACTION_STYLE.to_string(),
            };
            let actions_tab = format!("{}/{}/edit/actions", self.playbooks_url(), only.id);
            return SuggestionAttachment {
                text: format!(
                    "You can configure the trigger and actions for the playbook [here]({actions_tab})"
                ),
                actions: vec![run_button, ignore_button],
            };
        }

        let chooser = PostAction {
            id: "playbookChooser".to_string(),
            name: "Select a playbook to run".to_string(),
            action_type: ActionType::Select,
            integration: ActionIntegration {
                url: self.action_url("run-playbook"),
                context: context([("isMobile", json!(is_mobile)), ("postID", json!(post_id))]),
            },
            options: suggestion
                .playbooks
                .iter()
                .map(|p| ActionOption {
                    text: p.title.clone(),
                    value: p.id.to_string(),
                })
                .collect(),
            style: ACTION_STYLE.to_string(),
        };

        SuggestionAttachment {
            text: format!(
                "You can access these playbooks to configure their triggers and actions [here]({})",
                self.playbooks_url()
            ),
            actions: vec![chooser, ignore_button],
        }
    }

    /// Renders the complete suggestion post.
    #[must_use]
    pub fn render(&self, suggestion: &Suggestion, post_id: &str, is_mobile: bool) -> SuggestionPost {
        SuggestionPost {
            message: self.message(suggestion),
            attachment: self.attachment(suggestion, post_id, is_mobile),
        }
    }
}

fn context<const N: usize>(pairs: [(&str, Value); N]) -> Map<String, Value> {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CachedPlaybook, PlaybookId};
    use std::collections::BTreeSet;

    fn playbook(id: &str, title: &str) -> CachedPlaybook {
        CachedPlaybook {
            id: PlaybookId::new(id),
            team_id: "team".into(),
            title: title.into(),
            signal_any_keywords: vec!["outage".into()],
        }
    }

    fn suggestion(playbooks: Vec<CachedPlaybook>, triggers: &[&str]) -> Suggestion {
        Suggestion {
            playbooks,
            triggers: triggers.iter().map(ToString::to_string).collect::<BTreeSet<_>>(),
        }
    }

    #[test]
    fn test_single_playbook_message() {
        let formatter = SuggestionFormatter::new("https://chat.example.com/", "playbooks");
        let s = suggestion(vec![playbook("p1", "Outage")], &["outage"]);

        assert_eq!(
            formatter.message(&s),
            "`outage` is a trigger for the [Outage](https://chat.example.com/playbooks/playbooks/p1) playbook, would you like to run it?"
        );
    }

    #[test]
    fn test_multiple_playbooks_message() {
        let formatter = SuggestionFormatter::default();
        let s = suggestion(
            vec![playbook("p1", "Outage"), playbook("p2", "Incident")],
            &["outage", "incident"],
        );

        assert_eq!(
            formatter.message(&s),
            "`incident`, `outage` are triggers for the multiple playbooks, would you like to run one of them?"
        );
    }

    #[test]
    fn test_single_playbook_attachment() {
        let formatter = SuggestionFormatter::default();
        let s = suggestion(vec![playbook("p1", "Outage")], &["outage"]);
        let attachment = formatter.attachment(&s, "post-1", true);

        let ids: Vec<_> = attachment.actions.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["runPlaybookButton", "ignoreKeywordsButton"]);

        let run = &attachment.actions[0];
        assert_eq!(run.integration.url, "/plugins/playbooks/api/v0/signal/keywords/run-playbook");
        assert_eq!(run.integration.context["selected_option"], json!("p1"));
        assert_eq!(run.integration.context["isMobile"], json!(true));
        assert_eq!(
            attachment.actions[1].integration.url,
            "/plugins/playbooks/api/v0/signal/keywords/ignore-thread"
        );
        assert!(attachment.text.ends_with("(http://localhost:8065/playbooks/playbooks/p1/edit/actions)"));
    }

    #[test]
    fn test_multiple_playbook_attachment_uses_chooser() {
        let formatter = SuggestionFormatter::default();
        let s = suggestion(
            vec![playbook("p1", "Outage"), playbook("p2", "Incident")],
            &["outage"],
        );
        let post = formatter.render(&s, "post-1", false);

        let chooser = &post.attachment.actions[0];
        assert_eq!(chooser.action_type, ActionType::Select);
        assert_eq!(chooser.options.len(), 2);
        assert_eq!(chooser.options[1].value, "p2");
        assert_eq!(chooser.integration.context["postID"], json!("post-1"));
        assert!(post.attachment.text.contains("[here](http://localhost:8065/playbooks/playbooks)"));
    }
}
