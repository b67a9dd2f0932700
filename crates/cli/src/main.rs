//! Quantix Verify - Main Entry Point
//!
//! Command-line front end for running browser verification scenarios
//! against the Quantix nutrition app.

use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{baseline, list, run};

/// Browser verification harness for the Quantix nutrition app
#[derive(Parser)]
#[command(name = "quantix-verify")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run verification scenarios
    Run(run::RunArgs),

    /// List discovered scenarios
    List(list::ListArgs),

    /// Manage visual regression baselines
    #[command(subcommand)]
    Baseline(baseline::BaselineCommands),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Run(args) => run::execute(args).await,
        Commands::List(args) => list::execute(args).map(|_| true),
        Commands::Baseline(cmd) => baseline::execute(cmd).map(|_| true),
    };

    // 0 = all passed, 1 = scenario failures, 2 = harness fault.
    if let Err(e) = &result {
        eprintln!("Error: {e:#}");
    }
    let code = exit_code(&result);
    if code != 0 {
        std::process::exit(code);
    }
}

fn exit_code(result: &anyhow::Result<bool>) -> i32 {
    match result {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(_) => 2,
    }
}
