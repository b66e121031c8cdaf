//! credsync - change a password on every configured identity backend.

mod commands;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use common::SyncConfig;

use crate::commands::ChangeArgs;

#[derive(Parser)]
#[command(name = "credsync")]
#[command(about = "Keep DSM and directory passwords in sync")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe every configured backend
    Status,
    /// Change a password on the requested backends
    ///
    /// Passwords are read from CREDSYNC_NEW_PASSWORD, CREDSYNC_CONFIRM_PASSWORD
    /// and CREDSYNC_PREVIOUS_PASSWORD, never from the command line.
    Change {
        /// Account making the request
        #[arg(long)]
        requester: String,
        /// Requester has administrative rights
        #[arg(long)]
        admin: bool,
        /// Account whose password changes
        #[arg(long)]
        target: String,
        /// Comma separated systems to change (default: all)
        #[arg(long)]
        systems: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = SyncConfig::from_env()?;
    let sync = sync_service_lib::build_from_config(config)?;
    info!(systems = ?sync.systems(), "Backends configured");

    let (output, code) = match cli.command {
        Commands::Status => commands::status(&sync).await,
        Commands::Change {
            requester,
            admin,
            target,
            systems,
        } => {
            let args = ChangeArgs {
                requester,
                admin,
                target,
                systems,
            };
            commands::change(&sync, args, |key| std::env::var(key).ok()).await
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    std::process::exit(code);
}
