//! Verdict CLI - run API-contract scenarios against a live server.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;

#[derive(Parser)]
#[command(name = "verdict")]
#[command(about = "API-contract scenario runner", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to ./verdict.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Override the target server root
    #[arg(long, global = true)]
    base_url: Option<String>,
    /// Override the per-request timeout
    #[arg(long, global = true)]
    timeout_seconds: Option<u64>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one scenario (built-in name or path to a .toml file)
    Run {
        /// Scenario name or file
        scenario: String,
    },
    /// Run every scenario in the catalog
    All,
    /// List available scenarios
    List,
    /// Print the steps of a scenario
    Show {
        /// Scenario name or file
        scenario: String,
    },
}

fn main() -> Result<ExitCode> {
    // Initialize tracing subscriber
    // Respects RUST_LOG environment variable (e.g., RUST_LOG=debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let options = commands::Options {
        config: cli.config,
        base_url: cli.base_url,
        timeout_seconds: cli.timeout_seconds,
    };

    let passed = match cli.command {
        Commands::Run { scenario } => commands::run::one(&options, &scenario)?,
        Commands::All => commands::run::all(&options)?,
        Commands::List => commands::list::run(&options).map(|()| true)?,
        Commands::Show { scenario } => commands::show::run(&options, &scenario).map(|()| true)?,
    };

    Ok(if passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
