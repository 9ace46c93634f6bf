//! Supervisor side of a sandboxed run.

use crate::error::SandboxError;
use crate::worker::{WorkerReport, WorkerRequest};
use crate::Result;
use async_trait::async_trait;
use plotbox_core::config::ExecutionConfig;
use plotbox_core::{ExecutionRequest, ExecutionResult, ResourceBudget};
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Returned when a run overruns its wall-clock ceiling.
pub const TIMEOUT_MESSAGE: &str =
    "Execution timed out. Check that the code does not run for too long.";

/// Returned when the worker died without reporting, e.g. killed by a ceiling.
pub const RESOURCE_LIMIT_MESSAGE: &str =
    "Execution was stopped after exceeding a resource limit (CPU time, memory or open files).";

/// Returned when the worker exited cleanly without reporting.
pub const TRANSPORT_FAILURE_MESSAGE: &str =
    "A problem occurred while retrieving the execution result.";

/// Returned when no worker could be started.
pub const SPAWN_FAILURE_MESSAGE: &str = "Failed to start the execution worker.";

/// Captured worker stderr kept for diagnostics.
const MAX_DIAGNOSTIC_BYTES: usize = 64 * 1024;

/// Largest report accepted from a worker. Fits a full chart plus both capped
/// output streams even when every character is escaped.
const MAX_REPORT_BYTES: usize = 32 * 1024 * 1024;

/// Anything that can turn a request into a result.
///
/// Implementations must produce exactly one result per call and never fail.
#[async_trait]
pub trait CodeRunner: Send + Sync {
    /// Run the request to completion.
    async fn run(&self, request: &ExecutionRequest) -> ExecutionResult;
}

/// How a run ended, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Completed,
    UserCodeFault,
    TimeoutExceeded,
    ResourceLimitExceeded,
    TransportFailure,
}

/// Program and arguments that start a worker.
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    program: PathBuf,
    args: Vec<OsString>,
}

impl WorkerCommand {
    /// Run `program` with no arguments.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append an argument.
    pub fn with_arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// The running executable's hidden `worker` subcommand.
    pub fn current_exe() -> Result<Self> {
        Ok(Self::new(std::env::current_exe()?).with_arg("worker"))
    }

    /// Worker program configured explicitly, else the running executable.
    pub fn from_config(config: &ExecutionConfig) -> Result<Self> {
        match &config.worker_program {
            Some(program) => Ok(Self::new(program)),
            None => Self::current_exe(),
        }
    }

    /// The program path.
    pub fn program(&self) -> &PathBuf {
        &self.program
    }
}

/// Runs each request in its own worker process under a wall-clock deadline.
#[derive(Debug, Clone)]
pub struct SandboxOrchestrator {
    command: WorkerCommand,
    budget: ResourceBudget,
}

impl SandboxOrchestrator {
    /// Create an orchestrator.
    pub fn new(command: WorkerCommand, budget: ResourceBudget) -> Self {
        Self { command, budget }
    }

    /// Create an orchestrator from configuration.
    pub fn from_config(config: &ExecutionConfig) -> Result<Self> {
        Ok(Self::new(
            WorkerCommand::from_config(config)?,
            ResourceBudget::from(config),
        ))
    }

    /// The budget applied to every worker.
    pub fn budget(&self) -> &ResourceBudget {
        &self.budget
    }

    pub fn command(&self) -> &WorkerCommand {
        &self.command
    }

    /// Run one request. Always yields exactly one result.
    pub async fn execute(&self, request: &ExecutionRequest) -> ExecutionResult {
        let started = Instant::now();
        let (outcome, result) = match self.spawn() {
            Ok(mut child) => {
                let payload = WorkerRequest {
                    code: request.code.clone(),
                    budget: self.budget,
                };
                supervise(&mut child, &payload, self.wall_clock()).await
            }
            Err(e) => {
                warn!("{}", e);
                (
                    ExecutionOutcome::TransportFailure,
                    ExecutionResult::failure(SPAWN_FAILURE_MESSAGE, 0.0),
                )
            }
        };

        info!(
            user = %request.user_id,
            outcome = ?outcome,
            success = result.success,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Execution finished"
        );
        result
    }

    fn wall_clock(&self) -> Duration {
        Duration::try_from_secs_f64(self.budget.wall_clock_seconds).unwrap_or(Duration::ZERO)
    }

    fn spawn(&self) -> Result<Child> {
        let mut cmd = Command::new(&self.command.program);
        cmd.args(&self.command.args)
            .env_clear()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| {
            SandboxError::spawn(format!(
                "{}: {}",
                self.command.program.display(),
                e
            ))
        })?;
        debug!(pid = ?child.id(), "Spawned worker");
        Ok(child)
    }
}

#[async_trait]
impl CodeRunner for SandboxOrchestrator {
    async fn run(&self, request: &ExecutionRequest) -> ExecutionResult {
        self.execute(request).await
    }
}

/// What the supervisor observed within the deadline.
struct Collected {
    report: Option<String>,
    diagnostics: String,
    status: std::io::Result<ExitStatus>,
}

/// Feed the request, wait for the report or the deadline, and reap the child.
async fn supervise(
    child: &mut Child,
    request: &WorkerRequest,
    wall_clock: Duration,
) -> (ExecutionOutcome, ExecutionResult) {
    let started = Instant::now();
    let payload = match serde_json::to_vec(request) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Failed to encode worker request: {}", e);
            let _ = child.kill().await;
            return (
                ExecutionOutcome::TransportFailure,
                ExecutionResult::failure(TRANSPORT_FAILURE_MESSAGE, 0.0),
            );
        }
    };

    let stdin = child.stdin.take();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let collect = async {
        let (_, report, diagnostics) = tokio::join!(
            send_request(stdin, &payload),
            read_report(stdout),
            read_stream(stderr, MAX_DIAGNOSTIC_BYTES),
        );
        let status = child.wait().await;
        Collected {
            report,
            diagnostics: diagnostics.map(|(text, _)| text).unwrap_or_default(),
            status,
        }
    };
    let collected = timeout(wall_clock, collect).await;

    let collected = match collected {
        Ok(collected) => collected,
        Err(_) => {
            warn!(
                "Worker exceeded {:.1}s wall clock, killing it",
                wall_clock.as_secs_f64()
            );
            if let Err(e) = child.kill().await {
                warn!("Failed to kill worker: {}", e);
            }
            return (
                ExecutionOutcome::TimeoutExceeded,
                ExecutionResult::failure(TIMEOUT_MESSAGE, wall_clock.as_secs_f64()),
            );
        }
    };

    if !collected.diagnostics.is_empty() {
        debug!(stderr = %collected.diagnostics.trim_end(), "Worker diagnostics");
    }

    if let Some(line) = collected.report.as_deref() {
        match serde_json::from_str::<WorkerReport>(line) {
            Ok(report) => {
                let outcome = match report {
                    WorkerReport::Completed { .. } => ExecutionOutcome::Completed,
                    WorkerReport::Faulted { .. } => ExecutionOutcome::UserCodeFault,
                };
                return (outcome, report.into_result());
            }
            Err(e) => warn!("Malformed worker report: {}", e),
        }
    }

    match collected.status {
        Ok(status) if status.success() => (
            ExecutionOutcome::TransportFailure,
            ExecutionResult::failure(TRANSPORT_FAILURE_MESSAGE, 0.0),
        ),
        Ok(status) => {
            warn!(status = %describe(&status), "Worker exited without a report");
            // Killed runs are charged the wall-clock time they held the worker.
            let elapsed = started.elapsed().min(wall_clock).as_secs_f64();
            (
                ExecutionOutcome::ResourceLimitExceeded,
                ExecutionResult::failure(RESOURCE_LIMIT_MESSAGE, elapsed),
            )
        }
        Err(e) => {
            warn!("Failed to wait for worker: {}", e);
            (
                ExecutionOutcome::TransportFailure,
                ExecutionResult::failure(TRANSPORT_FAILURE_MESSAGE, 0.0),
            )
        }
    }
}

fn describe(status: &ExitStatus) -> String {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return format!("killed by signal {}", signal);
        }
    }
    match status.code() {
        Some(code) => format!("exit code {}", code),
        None => "unknown".to_string(),
    }
}

/// Write the request and close stdin. A worker that already died is not an error here.
async fn send_request(handle: Option<tokio::process::ChildStdin>, payload: &[u8]) {
    let Some(mut stdin) = handle else {
        return;
    };
    if let Err(e) = stdin.write_all(payload).await {
        debug!("Failed to send worker request: {}", e);
        return;
    }
    if let Err(e) = stdin.shutdown().await {
        debug!("Failed to close worker stdin: {}", e);
    }
}

/// First non-empty stdout line, reading on to EOF so the worker never blocks.
async fn read_report(handle: Option<impl AsyncRead + Unpin>) -> Option<String> {
    let (output, discarded) = read_stream(handle, MAX_REPORT_BYTES).await?;
    if discarded > 0 {
        warn!(
            discarded,
            "Worker report exceeded {} bytes, dropping it", MAX_REPORT_BYTES
        );
        return None;
    }
    output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

/// Read at most `max_size` bytes, then drain the rest so the writer never
/// blocks on a full pipe. Returns the text kept and the byte count dropped.
async fn read_stream(
    handle: Option<impl AsyncRead + Unpin>,
    max_size: usize,
) -> Option<(String, u64)> {
    let handle = handle?;
    let mut limited = handle.take(max_size as u64);
    let mut output = Vec::new();
    if let Err(e) = limited.read_to_end(&mut output).await {
        warn!("Error reading stream: {}", e);
    }

    let discarded = match tokio::io::copy(&mut limited.into_inner(), &mut tokio::io::sink()).await {
        Ok(n) => n,
        Err(e) => {
            debug!("Error draining stream: {}", e);
            0
        }
    };

    Some((String::from_utf8_lossy(&output).into_owned(), discarded))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> WorkerRequest {
        WorkerRequest {
            code: "print(1)".to_string(),
            budget: ResourceBudget::default(),
        }
    }

    fn shell(script: &str) -> Child {
        Command::new("/bin/sh")
            .arg("-c")
            .arg(script)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .unwrap()
    }

    #[tokio::test]
    async fn test_timeout_kills_and_reaps() {
        let mut child = shell("sleep 30");
        let started = Instant::now();
        let (outcome, result) =
            supervise(&mut child, &request(), Duration::from_millis(300)).await;

        assert_eq!(outcome, ExecutionOutcome::TimeoutExceeded);
        assert!(!result.success);
        assert_eq!(result.stderr, TIMEOUT_MESSAGE);
        assert!(result.stdout.is_empty());
        assert_eq!(result.execution_time_seconds, 0.3);
        assert!(started.elapsed() < Duration::from_secs(5));
        // Reaped: tokio drops the pid once the exit status is collected.
        assert!(child.id().is_none());
    }

    #[tokio::test]
    async fn test_clean_exit_without_report() {
        let mut child = shell("cat > /dev/null; exit 0");
        let (outcome, result) = supervise(&mut child, &request(), Duration::from_secs(5)).await;
        assert_eq!(outcome, ExecutionOutcome::TransportFailure);
        assert_eq!(result.stderr, TRANSPORT_FAILURE_MESSAGE);
        assert_eq!(result.execution_time_seconds, 0.0);
    }

    #[tokio::test]
    async fn test_abnormal_exit_without_report() {
        let mut child = shell("kill -9 $$");
        let (outcome, result) = supervise(&mut child, &request(), Duration::from_secs(5)).await;
        assert_eq!(outcome, ExecutionOutcome::ResourceLimitExceeded);
        assert_eq!(result.stderr, RESOURCE_LIMIT_MESSAGE);
        assert!(result.execution_time_seconds > 0.0);
        assert!(result.execution_time_seconds < 5.0);

        let mut child = shell("exit 3");
        let (outcome, _) = supervise(&mut child, &request(), Duration::from_secs(5)).await;
        assert_eq!(outcome, ExecutionOutcome::ResourceLimitExceeded);
    }

    #[tokio::test]
    async fn test_report_is_parsed() {
        let report = r#"{"status":"faulted","stdout":"a\n","stderr":"","fault":"Uncaught Error: x","execution_time_seconds":0.01}"#;
        let mut child = shell(&format!("cat > /dev/null; printf '%s\\n' '{}'; exit 1", report));
        let (outcome, result) = supervise(&mut child, &request(), Duration::from_secs(5)).await;
        assert_eq!(outcome, ExecutionOutcome::UserCodeFault);
        assert!(!result.success);
        assert_eq!(result.stdout, "a\n");
        assert_eq!(result.stderr, "Uncaught Error: x");
    }

    #[tokio::test]
    async fn test_spawn_failure_is_a_result() {
        let orchestrator = SandboxOrchestrator::new(
            WorkerCommand::new("/nonexistent/plotbox-worker"),
            ResourceBudget::default(),
        );
        let result = orchestrator
            .execute(&ExecutionRequest::new("print(1)", "alice"))
            .await;
        assert!(!result.success);
        assert_eq!(result.stderr, SPAWN_FAILURE_MESSAGE);
    }

    #[tokio::test]
    async fn test_read_stream_caps_output() {
        let data: &[u8] = b"line one\nline two\nline three\n";
        let (output, discarded) = read_stream(Some(data), 12).await.unwrap();
        assert_eq!(output, "line one\nlin");
        assert_eq!(discarded, data.len() as u64 - 12);

        let (output, discarded) = read_stream(Some(data), 1024).await.unwrap();
        assert_eq!(output.len(), data.len());
        assert_eq!(discarded, 0);
    }

    #[tokio::test]
    async fn test_oversized_report_is_dropped() {
        let oversized = vec![b'x'; MAX_REPORT_BYTES + 1];
        assert!(read_report(Some(oversized.as_slice())).await.is_none());

        let report: &[u8] = b"\n  {\"status\":\"completed\"}  \ntrailing\n";
        assert_eq!(
            read_report(Some(report)).await.as_deref(),
            Some(r#"{"status":"completed"}"#)
        );
    }

    #[test]
    fn test_worker_command_from_config() {
        let config = ExecutionConfig {
            worker_program: Some(PathBuf::from("/usr/local/bin/plotbox-worker")),
            ..Default::default()
        };
        let command = WorkerCommand::from_config(&config).unwrap();
        assert_eq!(command.program(), &PathBuf::from("/usr/local/bin/plotbox-worker"));
        assert!(command.args.is_empty());

        let command = WorkerCommand::from_config(&ExecutionConfig::default()).unwrap();
        assert_eq!(command.args, vec![OsString::from("worker")]);
    }
}
