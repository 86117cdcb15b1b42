//! dv360-sync command-line interface

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;

mod cli;

use cli::commands;

/// Sync spreadsheet rows with Display & Video 360
#[derive(Parser)]
#[command(name = "dv360-sync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Config file, defaults to <config dir>/dv360-sync/config.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Push workbook rows to the API and write the results back
    Sync(commands::sync::SyncArgs),

    /// Replace workbook rows with the current server state
    Pull(commands::pull::PullArgs),

    /// List the supported resource kinds
    Kinds(commands::kinds::KindsArgs),
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let env = env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, default_filter);
    env_logger::Builder::from_env(env)
        .format_timestamp_secs()
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Sync(args) => commands::sync::execute(args, cli.config.as_deref()).await,
        Commands::Pull(args) => commands::pull::execute(args, cli.config.as_deref()).await,
        Commands::Kinds(args) => commands::kinds::execute(args),
    }
}
