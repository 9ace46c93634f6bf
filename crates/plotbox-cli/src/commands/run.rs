//! One-shot run command.

use anyhow::Context;
use clap::Args;
use plotbox_core::{Config, ExecutionRequest, ResourceBudget};
use plotbox_sandbox::SandboxOrchestrator;
use plotbox_sandbox::WorkerCommand;
use std::path::PathBuf;
use std::process::ExitCode;

/// Run command arguments.
#[derive(Args)]
pub struct RunArgs {
    /// Script file to run
    pub file: PathBuf,

    /// Wall-clock and CPU limit in seconds
    #[arg(short, long)]
    pub timeout: Option<f64>,
}

/// Run a script file through the sandbox and print the result as JSON.
pub async fn run(args: RunArgs, config: Config) -> anyhow::Result<ExitCode> {
    let code = std::fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    let mut budget = ResourceBudget::from(&config.execution);
    if let Some(timeout) = args.timeout {
        anyhow::ensure!(timeout > 0.0, "Timeout must be positive");
        budget = budget.with_timeout(timeout);
    }

    let orchestrator =
        SandboxOrchestrator::new(WorkerCommand::from_config(&config.execution)?, budget);
    let result = orchestrator
        .execute(&ExecutionRequest::new(code, "local"))
        .await;

    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
