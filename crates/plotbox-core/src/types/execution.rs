//! Execution request and result types.

use crate::config::ExecutionConfig;
use crate::types::UserId;
use serde::{Deserialize, Serialize};

/// A snippet of user code submitted for execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Source code to run.
    pub code: String,

    /// Submitting user.
    pub user_id: UserId,
}

impl ExecutionRequest {
    /// Create a new request.
    pub fn new(code: impl Into<String>, user_id: impl Into<UserId>) -> Self {
        Self {
            code: code.into(),
            user_id: user_id.into(),
        }
    }
}

/// Ceilings applied to every worker process.
///
/// Built once at startup and shared by all runs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceBudget {
    /// CPU time ceiling in seconds.
    #[serde(default = "default_seconds")]
    pub cpu_seconds: f64,

    /// Address-space ceiling in bytes.
    #[serde(default = "default_memory_bytes")]
    pub memory_bytes: u64,

    /// Open file descriptor ceiling.
    #[serde(default = "default_max_open_files")]
    pub max_open_files: u64,

    /// Wall-clock ceiling in seconds, enforced by the supervisor.
    #[serde(default = "default_seconds")]
    pub wall_clock_seconds: f64,
}

fn default_seconds() -> f64 {
    3.0
}

fn default_memory_bytes() -> u64 {
    1024 * 1024 * 1024
}

fn default_max_open_files() -> u64 {
    64
}

impl Default for ResourceBudget {
    fn default() -> Self {
        Self {
            cpu_seconds: default_seconds(),
            memory_bytes: default_memory_bytes(),
            max_open_files: default_max_open_files(),
            wall_clock_seconds: default_seconds(),
        }
    }
}

impl ResourceBudget {
    /// Set both the wall-clock and CPU ceilings.
    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.wall_clock_seconds = seconds;
        self.cpu_seconds = seconds;
        self
    }

    /// Set the memory ceiling in bytes.
    pub fn with_memory(mut self, bytes: u64) -> Self {
        self.memory_bytes = bytes;
        self
    }

    /// Set the open file ceiling.
    pub fn with_max_open_files(mut self, n: u64) -> Self {
        self.max_open_files = n;
        self
    }

    /// CPU ceiling as whole seconds, rounded up and never below one.
    pub fn cpu_seconds_ceil(&self) -> u64 {
        if self.cpu_seconds.is_nan() || self.cpu_seconds <= 1.0 {
            1
        } else {
            self.cpu_seconds.ceil() as u64
        }
    }
}

impl From<&ExecutionConfig> for ResourceBudget {
    fn from(config: &ExecutionConfig) -> Self {
        Self::default()
            .with_timeout(config.timeout_seconds)
            .with_memory(config.memory_limit_bytes())
            .with_max_open_files(config.max_open_files)
    }
}

/// A rendered chart, as an opaque JSON document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlotArtifact(serde_json::Value);

impl PlotArtifact {
    /// Wrap a chart document.
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// Take the chart document.
    pub fn into_json(self) -> serde_json::Value {
        self.0
    }
}

/// Outcome of one execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Whether the code ran to completion without raising.
    pub success: bool,

    /// Captured standard output.
    pub stdout: String,

    /// Captured standard error, or the failure description.
    pub stderr: String,

    /// Chart drawn by the code, if any.
    #[serde(rename = "plot")]
    pub artifact: Option<PlotArtifact>,

    /// Elapsed execution time in seconds.
    #[serde(rename = "execution_time")]
    pub execution_time_seconds: f64,
}

impl ExecutionResult {
    /// A failed run with no output besides `stderr`.
    pub fn failure(stderr: impl Into<String>, execution_time_seconds: f64) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: stderr.into(),
            artifact: None,
            execution_time_seconds,
        }
    }
}
