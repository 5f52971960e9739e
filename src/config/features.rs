//! Feature flags for optional functionality.

/// Feature flags for controlling optional playbook-signal features.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Scan posted messages and offer playbook suggestions.
    pub keyword_suggestions: bool,
    /// Record playbook lifecycle telemetry.
    pub telemetry: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self::all()
    }
}

impl FeatureFlags {
    /// Creates feature flags with all features disabled.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            keyword_suggestions: false,
            telemetry: false,
        }
    }

    /// Creates feature flags with all features enabled.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            keyword_suggestions: true,
            telemetry: true,
        }
    }
}
