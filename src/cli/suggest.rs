//! One-shot suggestion command.

use super::App;
use super::playbook::print_json;
use crate::{Error, Result};

/// Refreshes the keyword cache, runs the engine on `message` and prints the
/// suggestion as JSON.
///
/// # Errors
///
/// Returns an error if the keyword cache cannot be loaded.
pub async fn execute(app: &App, team: &str, user: &str, message: &str) -> Result<()> {
    let cache = app.service.keywords_cache();
    if !cache.refresh() {
        return Err(Error::OperationFailed {
            operation: "keywords_cache_refresh".to_string(),
            cause: "could not load playbooks from the store".to_string(),
        });
    }

    let suggestion = app.service.suggest(team, user, message).await;
    print_json(&suggestion)
}
