//! Binary entry point for playbook-signal.
//!
//! This binary provides the CLI interface for managing playbooks and running
//! the keyword suggestion loop.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use anyhow::Context;
use clap::{Parser, Subcommand};
use playbook_signal::cli::playbook::{ListArgs, PlaybookArgs};
use playbook_signal::cli::{self, App};
use playbook_signal::observability::{self, ObservabilityConfig};
use std::path::PathBuf;
use std::process::ExitCode;

/// Playbook Signal - keyword-triggered playbook suggestions.
#[derive(Parser)]
#[command(name = "playbook-signal")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "PLAYBOOK_SIGNAL_CONFIG")]
    config: Option<PathBuf>,

    /// Path to the playbook database.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Fields shared by `create` and `update`.
#[derive(clap::Args)]
struct PlaybookFields {
    /// Playbook title.
    #[arg(long)]
    title: Option<String>,

    /// Playbook description.
    #[arg(long)]
    description: Option<String>,

    /// Trigger keyword (repeatable).
    #[arg(short, long = "keyword")]
    keywords: Vec<String>,

    /// Member user id (repeatable).
    #[arg(short, long = "member")]
    members: Vec<String>,
}

impl From<PlaybookFields> for PlaybookArgs {
    fn from(fields: PlaybookFields) -> Self {
        Self {
            title: fields.title,
            description: fields.description,
            keywords: fields.keywords,
            members: fields.members,
        }
    }
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Create a playbook.
    Create {
        /// Owning team.
        #[arg(long)]
        team: String,

        /// Acting user.
        #[arg(long, default_value = "cli")]
        user: String,

        #[command(flatten)]
        fields: PlaybookFields,
    },

    /// Update a playbook.
    Update {
        /// Playbook id.
        id: String,

        /// Acting user.
        #[arg(long, default_value = "cli")]
        user: String,

        #[command(flatten)]
        fields: PlaybookFields,
    },

    /// Show a playbook.
    Show {
        /// Playbook id.
        id: String,
    },

    /// List playbooks.
    List {
        /// Restrict to one team.
        #[arg(long)]
        team: Option<String>,

        /// List as this user.
        #[arg(long)]
        user: Option<String>,

        /// List as a team admin.
        #[arg(long)]
        admin: bool,

        /// Sort by: title, stages, steps, created.
        #[arg(long)]
        sort: Option<String>,

        /// Sort descending.
        #[arg(long)]
        desc: bool,

        /// Zero-based page.
        #[arg(long, default_value = "0")]
        page: usize,

        /// Page size (0 for all).
        #[arg(long, default_value = "0")]
        per_page: usize,
    },

    /// Delete a playbook.
    Delete {
        /// Playbook id.
        id: String,

        /// Acting user.
        #[arg(long, default_value = "cli")]
        user: String,
    },

    /// Suggest playbooks for a message.
    Suggest {
        /// Team the message was posted in.
        #[arg(long)]
        team: String,

        /// Author of the message.
        #[arg(long)]
        user: String,

        /// Message text.
        message: String,
    },

    /// Process JSON-line requests from stdin.
    Serve {
        /// Expose Prometheus metrics over HTTP.
        #[arg(long)]
        metrics: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // .env is optional
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli::resolve_config(cli.config.as_ref(), cli.db).context("loading configuration")?;

    let metrics_expose = matches!(cli.command, Commands::Serve { metrics: true });
    let _observability = observability::init(ObservabilityConfig::from_signal_config(
        &config,
        cli.verbose,
        metrics_expose,
    ))
    .context("initializing logging")?;

    let app = App::open(config).context("opening playbook store")?;

    match cli.command {
        Commands::Create { team, user, fields } => {
            cli::playbook::create(&app, &team, &user, fields.into())?;
        },
        Commands::Update { id, user, fields } => {
            cli::playbook::update(&app, &id, &user, fields.into())?;
        },
        Commands::Show { id } => cli::playbook::show(&app, &id)?,
        Commands::List {
            team,
            user,
            admin,
            sort,
            desc,
            page,
            per_page,
        } => cli::playbook::list(
            &app,
            ListArgs {
                team,
                user,
                admin,
                sort,
                desc,
                page,
                per_page,
            },
        )?,
        Commands::Delete { id, user } => cli::playbook::delete(&app, &id, &user)?,
        Commands::Suggest {
            team,
            user,
            message,
        } => cli::suggest::execute(&app, &team, &user, &message).await?,
        Commands::Serve { .. } => cli::serve::execute(&app).await?,
    }

    Ok(())
}
