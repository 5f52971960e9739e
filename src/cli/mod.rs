//! CLI command implementations.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `create` | Create a playbook with trigger keywords |
//! | `update` | Change a playbook's title, keywords or members |
//! | `show` | Print one playbook as JSON |
//! | `list` | List playbooks, optionally for one team |
//! | `delete` | Soft-delete a playbook |
//! | `suggest` | Run the suggestion engine on one message |
//! | `serve` | Process JSON-line posts from stdin |
//!
//! # Example Usage
//!
//! ```bash
//! playbook-signal create --team t1 --title "Outage" -k outage -k incident -m alice
//! playbook-signal suggest --team t1 --user alice "we have an outage"
//! echo '{"type":"post","session_id":"s1","team_id":"t1","post":{...}}' | playbook-signal serve
//! ```

pub mod playbook;
pub mod serve;
pub mod suggest;

use crate::config::SignalConfig;
use crate::observability::EventBus;
use crate::platform::StaticDirectory;
use crate::poster::EventBusPoster;
use crate::services::{KeywordsCache, LruThreadIgnorer, PlaybookService, SuggestionFormatter};
use crate::storage::{
    PlaybookStore, ResilientPlaybookStore, SqlitePlaybookStore, StoreResilienceConfig,
};
use crate::telemetry::{MetricsTelemetry, NoopTelemetry, PlaybookTelemetry};
use crate::{Error, Result};
use std::path::PathBuf;
use std::sync::Arc;

/// Fully wired service graph shared by the commands.
pub struct App {
    /// The playbook service.
    pub service: Arc<PlaybookService>,
    /// Bus the service publishes outbound events on.
    pub bus: EventBus,
    /// Channel and session directory fed by `serve`.
    pub directory: Arc<StaticDirectory>,
    /// Resolved configuration.
    pub config: SignalConfig,
}

impl App {
    /// Opens the `SQLite` store named by the config and wires the service.
    ///
    /// # Errors
    ///
    /// Returns an error if no database path can be determined or the
    /// database cannot be opened.
    pub fn open(config: SignalConfig) -> Result<Self> {
        let db_path = match &config.db_path {
            Some(path) => path.clone(),
            None => SqlitePlaybookStore::default_path().ok_or_else(|| {
                Error::InvalidInput("no data directory; pass --db".to_string())
            })?,
        };
        let sqlite = SqlitePlaybookStore::new(db_path)?;
        Ok(Self::with_store(config, sqlite))
    }

    /// Wires the service over an already opened store.
    #[must_use]
    pub fn with_store<S: PlaybookStore + 'static>(config: SignalConfig, store: S) -> Self {
        let store: Arc<dyn PlaybookStore> = Arc::new(ResilientPlaybookStore::new(
            store,
            StoreResilienceConfig::from_env(),
            "sqlite",
        ));
        let bus = EventBus::default();
        let directory = Arc::new(StaticDirectory::new());
        let cache = Arc::new(KeywordsCache::new(Arc::clone(&store)));
        let telemetry: Arc<dyn PlaybookTelemetry> = if config.features.telemetry {
            Arc::new(MetricsTelemetry)
        } else {
            Arc::new(NoopTelemetry)
        };

        let service = PlaybookService::new(store, Arc::new(EventBusPoster::new(bus.clone())), cache)
            .with_thread_ignorer(Arc::new(LruThreadIgnorer::new(
                config.keywords.ignore_capacity,
                config.keywords.ignore_ttl(),
            )))
            .with_telemetry(telemetry)
            .with_directory(Arc::clone(&directory))
            .with_formatter(SuggestionFormatter::new(&config.site_url, &config.plugin_id))
            .with_access_timeout(config.keywords.access_timeout())
            .with_features(config.features);

        Self {
            service: Arc::new(service),
            bus,
            directory,
            config,
        }
    }
}

/// Resolves the configuration for a CLI run: file, then env, then `--db`.
///
/// # Errors
///
/// Returns an error if the named config file cannot be loaded or an
/// environment override is malformed.
pub fn resolve_config(config_path: Option<&PathBuf>, db: Option<PathBuf>) -> Result<SignalConfig> {
    let base = match config_path {
        Some(path) => SignalConfig::load_from_file(path)?,
        None => SignalConfig::load_default(),
    };
    let config = base.with_env_overrides()?;
    Ok(match db {
        Some(db) => config.with_db_path(db),
        None => config,
    })
}
