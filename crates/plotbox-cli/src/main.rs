//! plotbox CLI entry point.

use clap::Parser;
use plotbox_cli::{run, Cli, Commands};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> ExitCode {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Workers own stdin/stdout and run without an async runtime.
    if matches!(cli.command, Commands::Worker) {
        return plotbox_sandbox::worker_main();
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(cli.verbose).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = plotbox_core::env::load_dotenv() {
        tracing::warn!("Failed to read .env: {}", e);
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Run the command
    match runtime.block_on(run(cli)) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn default_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "plotbox=info",
        1 => "plotbox=debug,tower_http=debug",
        _ => "plotbox=trace,tower_http=trace",
    }
}
