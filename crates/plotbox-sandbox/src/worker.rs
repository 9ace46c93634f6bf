//! Worker side of a sandboxed run.
//!
//! A worker is a short-lived process. It reads one [`WorkerRequest`] as JSON
//! from stdin, lowers its own resource ceilings, runs the script and writes
//! exactly one [`WorkerReport`] line to stdout. Stdout carries nothing else;
//! diagnostics go to stderr.

use crate::artifact::extract_artifact;
use crate::environment::{Environment, EnvironmentOptions};
use crate::limits::apply_resource_limits;
use plotbox_core::{ExecutionResult, PlotArtifact, ResourceBudget};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::process::ExitCode;
use std::time::Instant;
use tracing::{debug, error};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// What the supervisor sends to a worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRequest {
    /// Script to run.
    pub code: String,

    /// Ceilings to apply before running it.
    #[serde(default)]
    pub budget: ResourceBudget,
}

/// What a worker sends back: a completed run, or a fault in the script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkerReport {
    Completed {
        stdout: String,
        stderr: String,
        artifact: Option<PlotArtifact>,
        execution_time_seconds: f64,
    },
    Faulted {
        stdout: String,
        stderr: String,
        fault: String,
        execution_time_seconds: f64,
    },
}

impl WorkerReport {
    fn fault(fault: impl Into<String>) -> Self {
        Self::Faulted {
            stdout: String::new(),
            stderr: String::new(),
            fault: fault.into(),
            execution_time_seconds: 0.0,
        }
    }

    /// Convert into the caller-facing result. A fault is appended to stderr.
    pub fn into_result(self) -> ExecutionResult {
        match self {
            Self::Completed {
                stdout,
                stderr,
                artifact,
                execution_time_seconds,
            } => ExecutionResult {
                success: true,
                stdout,
                stderr,
                artifact,
                execution_time_seconds,
            },
            Self::Faulted {
                stdout,
                mut stderr,
                fault,
                execution_time_seconds,
            } => {
                if !stderr.is_empty() && !stderr.ends_with('\n') {
                    stderr.push('\n');
                }
                stderr.push_str(&fault);
                ExecutionResult {
                    success: false,
                    stdout,
                    stderr,
                    artifact: None,
                    execution_time_seconds,
                }
            }
        }
    }
}

/// Run a script in a fresh environment and describe the outcome.
///
/// Does not touch resource limits; [`worker_main`] applies them first.
pub fn run_worker(request: &WorkerRequest) -> WorkerReport {
    let mut env = match Environment::new(&EnvironmentOptions::default()) {
        Ok(env) => env,
        Err(e) => return WorkerReport::fault(e.to_string()),
    };

    let started = Instant::now();
    let outcome = env.execute(&request.code);
    let artifact = match outcome {
        Ok(()) => extract_artifact(&mut env),
        Err(_) => None,
    };
    let execution_time_seconds = started.elapsed().as_secs_f64();
    let (stdout, stderr) = env.take_output();

    match outcome {
        Ok(()) => WorkerReport::Completed {
            stdout,
            stderr,
            artifact,
            execution_time_seconds,
        },
        Err(fault) => WorkerReport::Faulted {
            stdout,
            stderr,
            fault,
            execution_time_seconds,
        },
    }
}

/// Entry point of a worker process.
pub fn worker_main() -> ExitCode {
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new("warn"))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();

    let mut input = String::new();
    let report = match std::io::stdin().read_to_string(&mut input) {
        Ok(_) => match serde_json::from_str::<WorkerRequest>(&input) {
            Ok(request) => {
                apply_resource_limits(&request.budget);
                debug!(bytes = request.code.len(), "Running script");
                run_worker(&request)
            }
            Err(e) => WorkerReport::fault(format!("Invalid worker request: {}", e)),
        },
        Err(e) => WorkerReport::fault(format!("Failed to read worker request: {}", e)),
    };

    match write_report(&mut std::io::stdout().lock(), &report) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Failed to write worker report: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn write_report(out: &mut impl Write, report: &WorkerReport) -> std::io::Result<()> {
    serde_json::to_writer(&mut *out, report)?;
    out.write_all(b"\n")?;
    out.flush()
}
