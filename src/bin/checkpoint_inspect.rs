//! # Checkpoint Inspector
//!
//! Command-line tool for checking checkpoint configuration and reading the
//! checkpoint a drainer would resume from.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use drainer_checkpoint::{
    CheckPoint, CheckpointStore, ConfigLoader, MetaCheckpoint, PostgresBackend, StoreSettings,
};

#[derive(Parser)]
#[command(name = "checkpoint-inspect")]
#[command(about = "Inspect drainer checkpoint configuration and stored state")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Base TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Environment override to apply (defaults to DRAINER_ENV)
    #[arg(short, long)]
    environment: Option<String>,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load and validate configuration, printing it with secrets masked
    Validate,

    /// Connect to the backend and print the stored checkpoint
    Show {
        /// Print the checkpoint as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to install tracing subscriber")?;

    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_file(path);
    }
    if let Some(environment) = &cli.environment {
        loader = loader.with_environment(environment);
    }
    let config = loader.load().context("failed to load checkpoint configuration")?;

    match cli.command {
        Commands::Validate => {
            println!("{}", serde_json::to_string_pretty(&config.sanitized())?);
        }
        Commands::Show { json } => {
            // Read only: no ensure_schema, so nothing is created on the target.
            let backend = PostgresBackend::connect(&config)
                .await
                .context("failed to connect to checkpoint backend")?;
            let store = CheckpointStore::new(
                backend,
                Arc::new(MetaCheckpoint::new()),
                StoreSettings::from(&config),
            );
            store
                .load()
                .await
                .with_context(|| format!("failed to load checkpoint of cluster {}", config.cluster_id))?;

            let checkpoint = store.snapshot().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&checkpoint)?);
            } else {
                println!("cluster {}: {}", store.cluster_id(), checkpoint);
            }

            store.backend().clone().close().await;
        }
    }

    Ok(())
}
