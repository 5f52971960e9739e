//! Configuration management.
//!
//! Values are resolved in three layers: built-in defaults, then the TOML
//! config file, then `PLAYBOOK_SIGNAL_*` environment variables.
//!
//! ```toml
//! db_path = "/var/lib/playbook-signal/playbooks.db"
//! site_url = "https://chat.example.com"
//! plugin_id = "playbooks"
//!
//! [keywords]
//! refresh_interval_secs = 60
//! access_timeout_ms = 2000
//!
//! [logging]
//! level = "info"
//! format = "json"
//! ```

mod features;

pub use features::FeatureFlags;

use crate::services::formatting::{DEFAULT_PLUGIN_ID, DEFAULT_SITE_URL};
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory name used under the platform config and data dirs.
pub const APP_DIR: &str = "playbook-signal";

/// Keyword engine tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeywordSettings {
    /// Seconds between background cache refreshes.
    pub refresh_interval_secs: u64,
    /// Budget for the per-message access lookup, in milliseconds.
    pub access_timeout_ms: u64,
    /// Seconds an ignored thread stays ignored.
    pub ignore_ttl_secs: u64,
    /// Maximum remembered ignored (thread, user) pairs.
    pub ignore_capacity: usize,
}

impl Default for KeywordSettings {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 60,
            access_timeout_ms: 2000,
            ignore_ttl_secs: 24 * 60 * 60,
            ignore_capacity: 10_000,
        }
    }
}

impl KeywordSettings {
    /// Refresh interval as a [`Duration`].
    #[must_use]
    pub const fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Access lookup budget as a [`Duration`].
    #[must_use]
    pub const fn access_timeout(&self) -> Duration {
        Duration::from_millis(self.access_timeout_ms)
    }

    /// Ignore TTL as a [`Duration`].
    #[must_use]
    pub const fn ignore_ttl(&self) -> Duration {
        Duration::from_secs(self.ignore_ttl_secs)
    }
}

/// Logging settings as written in the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LoggingSettings {
    /// Filter directive, e.g. `info` or `playbook_signal=debug`.
    pub level: Option<String>,
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// Append logs to this file instead of stderr.
    pub file: Option<PathBuf>,
}

/// Metrics settings as written in the config file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct MetricsSettings {
    /// Install the Prometheus recorder.
    pub enabled: Option<bool>,
    /// Port of the Prometheus HTTP listener.
    pub port: Option<u16>,
}

/// Resolved playbook-signal configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalConfig {
    /// `SQLite` database path; `None` selects the platform data dir.
    pub db_path: Option<PathBuf>,
    /// Public URL of the chat site, used in suggestion links.
    pub site_url: String,
    /// Plugin id, used in action and playbook URLs.
    pub plugin_id: String,
    /// Keyword engine tuning.
    pub keywords: KeywordSettings,
    /// Feature flags.
    pub features: FeatureFlags,
    /// Logging settings.
    pub logging: LoggingSettings,
    /// Metrics settings.
    pub metrics: MetricsSettings,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            site_url: DEFAULT_SITE_URL.to_string(),
            plugin_id: DEFAULT_PLUGIN_ID.to_string(),
            keywords: KeywordSettings::default(),
            features: FeatureFlags::default(),
            logging: LoggingSettings::default(),
            metrics: MetricsSettings::default(),
        }
    }
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Database path.
    pub db_path: Option<PathBuf>,
    /// Site URL.
    pub site_url: Option<String>,
    /// Plugin id.
    pub plugin_id: Option<String>,
    /// Keyword engine section.
    pub keywords: Option<ConfigFileKeywords>,
    /// Feature flags section.
    pub features: Option<ConfigFileFeatures>,
    /// Logging section.
    pub logging: Option<LoggingSettings>,
    /// Metrics section.
    pub metrics: Option<MetricsSettings>,
}

/// Keywords section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileKeywords {
    /// Refresh interval.
    pub refresh_interval_secs: Option<u64>,
    /// Access lookup budget.
    pub access_timeout_ms: Option<u64>,
    /// Ignore TTL.
    pub ignore_ttl_secs: Option<u64>,
    /// Ignore capacity.
    pub ignore_capacity: Option<usize>,
}

/// Features section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileFeatures {
    /// Keyword suggestions.
    pub keyword_suggestions: Option<bool>,
    /// Lifecycle telemetry.
    pub telemetry: Option<bool>,
}

impl SignalConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid config TOML.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(contents).map_err(|e| Error::OperationFailed {
            operation: "parse_config_file".to_string(),
            cause: e.to_string(),
        })?;
        Ok(Self::from_config_file(file))
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Loads `config.toml` from the platform config dir, falling back to
    /// defaults when it is missing or unreadable.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        Self::load_from_file(&path).unwrap_or_else(|e| {
            tracing::warn!(error = %e, path = %path.display(), "Ignoring unreadable config file");
            Self::default()
        })
    }

    /// Platform config file location.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", APP_DIR)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(db_path) = file.db_path {
            config.db_path = Some(db_path);
        }
        if let Some(site_url) = file.site_url {
            config.site_url = site_url;
        }
        if let Some(plugin_id) = file.plugin_id {
            config.plugin_id = plugin_id;
        }
        if let Some(keywords) = file.keywords {
            let target = &mut config.keywords;
            if let Some(v) = keywords.refresh_interval_secs {
                target.refresh_interval_secs = v;
            }
            if let Some(v) = keywords.access_timeout_ms {
                target.access_timeout_ms = v;
            }
            if let Some(v) = keywords.ignore_ttl_secs {
                target.ignore_ttl_secs = v;
            }
            if let Some(v) = keywords.ignore_capacity {
                target.ignore_capacity = v;
            }
        }
        if let Some(features) = file.features {
            if let Some(v) = features.keyword_suggestions {
                config.features.keyword_suggestions = v;
            }
            if let Some(v) = features.telemetry {
                config.features.telemetry = v;
            }
        }
        if let Some(logging) = file.logging {
            config.logging = logging;
        }
        if let Some(metrics) = file.metrics {
            config.metrics = metrics;
        }

        config
    }

    /// Applies `PLAYBOOK_SIGNAL_*` overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if a variable holds an unparseable value.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies `PLAYBOOK_SIGNAL_*` overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if a variable holds an unparseable value.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = get("PLAYBOOK_SIGNAL_DB_PATH") {
            self.db_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get("PLAYBOOK_SIGNAL_SITE_URL") {
            self.site_url = v;
        }
        if let Some(v) = get("PLAYBOOK_SIGNAL_PLUGIN_ID") {
            self.plugin_id = v;
        }
        if let Some(v) = get("PLAYBOOK_SIGNAL_REFRESH_INTERVAL_SECS") {
            self.keywords.refresh_interval_secs = parse_number(&v, "PLAYBOOK_SIGNAL_REFRESH_INTERVAL_SECS")?;
        }
        if let Some(v) = get("PLAYBOOK_SIGNAL_ACCESS_TIMEOUT_MS") {
            self.keywords.access_timeout_ms = parse_number(&v, "PLAYBOOK_SIGNAL_ACCESS_TIMEOUT_MS")?;
        }
        if let Some(v) = get("PLAYBOOK_SIGNAL_IGNORE_TTL_SECS") {
            self.keywords.ignore_ttl_secs = parse_number(&v, "PLAYBOOK_SIGNAL_IGNORE_TTL_SECS")?;
        }
        if let Some(v) = get("PLAYBOOK_SIGNAL_IGNORE_CAPACITY") {
            self.keywords.ignore_capacity = parse_number(&v, "PLAYBOOK_SIGNAL_IGNORE_CAPACITY")?;
        }
        if let Some(v) = get("PLAYBOOK_SIGNAL_KEYWORD_SUGGESTIONS") {
            self.features.keyword_suggestions = parse_bool(&v);
        }
        if let Some(v) = get("PLAYBOOK_SIGNAL_TELEMETRY") {
            self.features.telemetry = parse_bool(&v);
        }
        if let Some(v) = get("PLAYBOOK_SIGNAL_LOG_LEVEL") {
            self.logging.level = Some(v);
        }
        if let Some(v) = get("PLAYBOOK_SIGNAL_LOG_FORMAT") {
            self.logging.format = Some(v);
        }
        if let Some(v) = get("PLAYBOOK_SIGNAL_LOG_FILE") {
            self.logging.file = Some(PathBuf::from(v));
        }
        if let Some(v) = get("PLAYBOOK_SIGNAL_METRICS_ENABLED") {
            self.metrics.enabled = Some(parse_bool(&v));
        }
        if let Some(v) = get("PLAYBOOK_SIGNAL_METRICS_PORT") {
            self.metrics.port = Some(parse_number(&v, "PLAYBOOK_SIGNAL_METRICS_PORT")?);
        }

        Ok(self)
    }

    /// Sets the database path.
    #[must_use]
    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = Some(path.into());
        self
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

fn parse_number<T: std::str::FromStr>(value: &str, key: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::InvalidInput(format!("{key}: expected a number, got '{value}'")))
}
