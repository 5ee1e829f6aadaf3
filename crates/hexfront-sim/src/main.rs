//! Hexfront CLI - headless battle simulation
//!
//! Commands:
//! - run: Play a scenario tick by tick until every battle is over
//! - predict: Show the expected outcome of each contact in a scenario

mod predict_cmd;
mod run_cmd;
mod scenario;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "hexfront")]
#[command(about = "Hexfront battle engine scenario runner")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario to completion
    Run(run_cmd::RunArgs),
    /// Predict battle outcomes without fighting
    Predict(predict_cmd::PredictArgs),
}

fn main() -> anyhow::Result<()> {
    // Initialize logging, RUST_LOG overrides the default level
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run_cmd::run(args),
        Commands::Predict(args) => predict_cmd::run(args),
    }
}
