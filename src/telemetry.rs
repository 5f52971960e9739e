//! Playbook lifecycle telemetry.

use crate::models::Playbook;

/// Records playbook lifecycle actions.
pub trait PlaybookTelemetry: Send + Sync {
    /// A playbook was created.
    fn create_playbook(&self, playbook: &Playbook, user_id: &str);
    /// A playbook was updated.
    fn update_playbook(&self, playbook: &Playbook, user_id: &str);
    /// A playbook was deleted.
    fn delete_playbook(&self, playbook: &Playbook, user_id: &str);
}

/// Telemetry backed by the `metrics` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsTelemetry;

impl MetricsTelemetry {
    fn record(action: &'static str, playbook: &Playbook, user_id: &str) {
        metrics::counter!("playbook_lifecycle_total", "action" => action).increment(1);
        tracing::info!(
            action,
            playbook_id = %playbook.id,
            team_id = %playbook.team_id,
            user_id,
            keyword_count = playbook.signal_any_keywords.len(),
            "Playbook lifecycle"
        );
    }
}

impl PlaybookTelemetry for MetricsTelemetry {
    fn create_playbook(&self, playbook: &Playbook, user_id: &str) {
        Self::record("create", playbook, user_id);
    }

    fn update_playbook(&self, playbook: &Playbook, user_id: &str) {
        Self::record("update", playbook, user_id);
    }

    fn delete_playbook(&self, playbook: &Playbook, user_id: &str) {
        Self::record("delete", playbook, user_id);
    }
}

/// Telemetry that records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

impl PlaybookTelemetry for NoopTelemetry {
    fn create_playbook(&self, _playbook: &Playbook, _user_id: &str) {}
    fn update_playbook(&self, _playbook: &Playbook, _user_id: &str) {}
    fn delete_playbook(&self, _playbook: &Playbook, _user_id: &str) {}
}
