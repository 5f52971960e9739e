//! Trigger keyword matching.
//!
//! A keyword matches when it occurs anywhere in the message as a contiguous,
//! case-sensitive substring. There is no word-boundary check: `cat` matches
//! inside `category`.

use super::sets::remove_duplicates;
use crate::models::CachedPlaybook;
use std::collections::BTreeSet;

/// Returns the playbook's keywords that occur in the message.
#[must_use]
pub fn triggers_for_message(playbook: &CachedPlaybook, message: &str) -> BTreeSet<String> {
    remove_duplicates(
        playbook
            .signal_any_keywords
            .iter()
            .filter(|keyword| message.contains(keyword.as_str()))
            .cloned(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PlaybookId;
    use test_case::test_case;

    fn cached(keywords: &[&str]) -> CachedPlaybook {
        CachedPlaybook {
            id: PlaybookId::new("p1"),
            team_id: "team".into(),
            title: "Incident".into(),
            signal_any_keywords: keywords.iter().map(ToString::to_string).collect(),
        }
    }

    #[test_case("we have an outage now", &["outage"] ; "single keyword")]
    #[test_case("incident: outage in eu", &["incident", "outage"] ; "several keywords")]
    #[test_case("Outage in eu", &[] ; "case sensitive")]
    #[test_case("all quiet", &[] ; "no match")]
    #[test_case("outages everywhere", &["outage"] ; "no word boundary")]
    fn test_triggers_for_message(message: &str, expected: &[&str]) {
        let playbook = cached(&["incident", "outage"]);
        let triggers = triggers_for_message(&playbook, message);
        let triggers: Vec<_> = triggers.iter().map(String::as_str).collect();
        assert_eq!(triggers, expected);
    }

    #[test]
    fn test_repeated_keywords_reported_once() {
        let playbook = cached(&["sev1", "sev1"]);
        let triggers = triggers_for_message(&playbook, "sev1 sev1");
        assert_eq!(triggers.len(), 1);
    }

    #[test]
    fn test_blank_keyword_matches_every_message() {
        let playbook = cached(&["", "outage"]);
        let triggers = triggers_for_message(&playbook, "hello");
        assert_eq!(triggers.iter().collect::<Vec<_>>(), vec![""]);
        assert_eq!(triggers_for_message(&playbook, "").len(), 1);
    }

    #[test]
    fn test_multibyte_message() {
        let playbook = cached(&["ошибка"]);
        assert_eq!(triggers_for_message(&playbook, "критическая ошибка").len(), 1);
    }
}
