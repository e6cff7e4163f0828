//! Vetro CLI - bulk feature editor.
//!
//! Provides commands for:
//! - `diff`: Show the changes between a baseline and an edited CSV export
//! - `update`: Submit those changes to the Vetro API
//! - `settings`: Manage the saved API key and preferences

mod commands;
mod error;
mod input;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{DiffArgs, SettingsArgs, UpdateArgs};
use output::Output;

/// Vetro - bulk feature editor.
#[derive(Parser)]
#[command(name = "vetro", version, about)]
struct Cli {
    /// Enable info-level logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show changes between a baseline and an edited CSV.
    Diff(DiffArgs),
    /// Submit changed fields to the Vetro API.
    Update(UpdateArgs),
    /// Manage the saved API key and preferences.
    Settings(SettingsArgs),
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if cli.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Diff(args) => args.execute(),
        Commands::Update(args) => args.execute(),
        Commands::Settings(args) => args.execute(),
    };

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}
