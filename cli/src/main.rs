mod commands;
mod config;
mod harvest;
mod source;

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::{
    cmd_rebuild, cmd_report_nutrition, cmd_report_progress, cmd_sync, cmd_users,
};
use crate::config::Config;
use crate::source::HttpDaySource;
use paw_core::service::PawService;

#[derive(Parser)]
#[command(
    name = "paw",
    version,
    about = "Sync daily food diaries into SQLite and report on deficit progress"
)]
struct Cli {
    /// Path to paw.toml (default: platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract days from the source and load new or changed ones
    Sync {
        /// Only sync this user (default: every configured user)
        #[arg(short, long)]
        user: Option<String>,
        /// First date (YYYY-MM-DD or DD.MM.YYYY); requires --to
        #[arg(long, requires = "to")]
        from: Option<String>,
        /// Last date; requires --from
        #[arg(long, requires = "from")]
        to: Option<String>,
        /// Reload every extracted day even when unchanged
        #[arg(long)]
        force: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Re-derive relational rows from stored snapshots
    Rebuild {
        /// Only rebuild this user
        #[arg(short, long)]
        user: Option<String>,
        #[arg(long, requires = "to")]
        from: Option<String>,
        #[arg(long, requires = "from")]
        to: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Reports built from loaded data
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
    /// List configured users and what is stored for them
    Users {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ReportCommands {
    /// Deficit progress against the end goal
    Progress {
        /// Only report this user
        #[arg(short, long)]
        user: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Daily nutrient totals against goals
    Nutrition {
        /// User to report on
        user: String,
        #[arg(long, requires = "to")]
        from: Option<String>,
        #[arg(long, requires = "from")]
        to: Option<String>,
        /// Write CSV to stdout
        #[arg(long, conflicts_with = "json")]
        csv: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "paw=info,paw_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    let svc = PawService::new(&config.db_path.to_string_lossy())?;

    match cli.command {
        Commands::Sync {
            user,
            from,
            to,
            force,
            json,
        } => {
            let source = Arc::new(HttpDaySource::new(&config.source, config.source_token())?);
            cmd_sync(
                &svc,
                &config,
                source,
                user.as_deref(),
                from.as_deref(),
                to.as_deref(),
                force,
                json,
            )
            .await
        }
        Commands::Rebuild {
            user,
            from,
            to,
            json,
        } => cmd_rebuild(
            &svc,
            &config,
            user.as_deref(),
            from.as_deref(),
            to.as_deref(),
            json,
        ),
        Commands::Report { command } => match command {
            ReportCommands::Progress { user, json } => {
                cmd_report_progress(&svc, &config, user.as_deref(), json)
            }
            ReportCommands::Nutrition {
                user,
                from,
                to,
                csv,
                json,
            } => cmd_report_nutrition(
                &svc,
                &config,
                &user,
                from.as_deref(),
                to.as_deref(),
                csv,
                json,
            ),
        },
        Commands::Users { json } => cmd_users(&svc, &config, json),
    }
}
