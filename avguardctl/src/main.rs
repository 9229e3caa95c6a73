//! `avguardctl`: runs scans through the avguard core and prints scan states.

use std::{path::PathBuf, process::ExitCode};

use anyhow::Result;
use avguard_core::GuardConfig;
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::{
    EnvFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

mod scan;

#[derive(Debug, Parser)]
#[command(
    name = "avguardctl",
    version,
    about = "Drive the avguard scan-state core against the simulated engine"
)]
struct Cli {
    /// Guard configuration file (TOML or JSON). Falls back to
    /// $AVGUARD_CONFIG_PATH, $AVGUARD_CONFIG_JSON, then avguard.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Scan a path and print debounced scan states until the scan settles
    Scan(scan::ScanArgs),
    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Logs go to stderr so stdout stays parseable with --json.
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let (config, source) = GuardConfig::load(cli.config.as_deref())?;
    debug!(%source, "guard config loaded");

    match cli.command {
        Command::Scan(args) => scan::run(args, config).await,
        Command::Config => {
            println!("# source: {source}");
            print!("{}", config.to_toml_string()?);
            Ok(ExitCode::SUCCESS)
        }
    }
}
