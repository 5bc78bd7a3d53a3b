//! gatehouse - card gate controller and attendance tool.
//!
//! `run` drives the gate; the other subcommands are operator tools that
//! share the same configuration file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gatehouse_controller::GateConfig;
use tracing_subscriber::EnvFilter;

mod commands;
mod render;

/// gatehouse - card gate controller
#[derive(Parser, Debug)]
#[command(name = "gatehouse")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the gate configuration file
    #[arg(
        short,
        long,
        global = true,
        env = "GATEHOUSE_CONFIG",
        default_value = "/etc/gatehouse/gatehouse.toml"
    )]
    config: PathBuf,

    /// Log at debug level when RUST_LOG is unset
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the decision loop and the sync worker until interrupted
    Run(commands::run::RunArgs),

    /// Inspect or drain the local event queue
    #[command(subcommand)]
    Queue(commands::queue::QueueCommand),

    /// Replace the card file with the identifiers held remotely
    FetchCards,

    /// Attendance reports and manual overrides
    #[command(subcommand)]
    Attendance(commands::attendance::AttendanceCommand),
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = GateConfig::from_file(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;

    match cli.command {
        Commands::Run(args) => commands::run::run(&config, &args).await,
        Commands::Queue(command) => commands::queue::run(&config, &command).await,
        Commands::FetchCards => commands::cards::fetch_cards(&config).await,
        Commands::Attendance(command) => commands::attendance::run(&config, &command).await,
    }
}
