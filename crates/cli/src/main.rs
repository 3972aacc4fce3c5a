//! tinyreact CLI — the main entry point.
//!
//! Commands:
//! - `agent`   — Interactive chat or single-task mode
//! - `config`  — Print the effective configuration
//! - `status`  — Show the persisted compaction state

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "tinyreact",
    about = "tinyreact — a minimal ReAct agent runtime",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent on a task, or chat interactively
    Agent {
        /// Run a single task instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Extra knowledge files (or directories of them) appended to the system prompt
        #[arg(short, long = "knowledge", value_name = "PATH")]
        knowledge: Vec<PathBuf>,
    },

    /// Print the effective configuration (API key redacted)
    Config,

    /// Show the persisted compaction state of the configured agent
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Agent { message, knowledge } => commands::agent::run(message, knowledge).await?,
        Commands::Config => commands::config_cmd::show().await?,
        Commands::Status => commands::status::run().await?,
    }

    Ok(())
}
