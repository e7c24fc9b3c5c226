//! tilecache CLI - Command-line interface
//!
//! Downloads map regions into offline stores and inspects them.

mod commands;
mod error;
mod runner;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::config::ConfigCommands;
use commands::download::DownloadArgs;

#[derive(Parser)]
#[command(name = "tilecache")]
#[command(version = tilecache::VERSION)]
#[command(about = "Download map tiles into offline region stores", long_about = None)]
struct Cli {
    /// Config file to use instead of ~/.tilecache/config.ini
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Mirror log output to the terminal
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download every tile of a region for a zoom range
    Download(DownloadArgs),

    /// Show per-zoom tile counts of a region store
    Stats {
        /// Region name
        #[arg(long)]
        name: String,
    },

    /// Merge duplicate rows in a region store
    Dedupe {
        /// Region name
        #[arg(long)]
        name: String,
    },

    /// Inspect or create the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Config { command } => commands::config::run(command, cli.config.as_deref()),
        command => run_with_runner(command, cli.config, cli.verbose).await,
    };

    if let Err(e) = result {
        e.exit();
    }
}

async fn run_with_runner(
    command: Commands,
    config_path: Option<PathBuf>,
    verbose: bool,
) -> Result<(), error::CliError> {
    let runner = runner::CliRunner::new(config_path.as_deref(), verbose)?;
    match command {
        Commands::Download(args) => commands::download::run(args, &runner).await,
        Commands::Stats { name } => commands::stats::run(&name, &runner).await,
        Commands::Dedupe { name } => commands::dedupe::run(&name, &runner).await,
        Commands::Config { .. } => Ok(()),
    }
}
