//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main plotbox configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Sandbox execution settings.
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// Per-user rate limiting.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Execution history storage.
    #[serde(default)]
    pub history: HistoryConfig,
}

/// Sandbox execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Wall-clock timeout per run, in seconds. Also the CPU-time ceiling.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: f64,

    /// Address-space ceiling per worker, in MiB.
    #[serde(default = "default_memory_limit_mb")]
    pub memory_limit_mb: u64,

    /// Open file descriptor ceiling per worker.
    #[serde(default = "default_max_open_files")]
    pub max_open_files: u64,

    /// Worker program to spawn. Defaults to the running executable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_program: Option<PathBuf>,
}

fn default_timeout() -> f64 {
    3.0
}

fn default_memory_limit_mb() -> u64 {
    1024
}

fn default_max_open_files() -> u64 {
    64
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            memory_limit_mb: default_memory_limit_mb(),
            max_open_files: default_max_open_files(),
            worker_program: None,
        }
    }
}

impl ExecutionConfig {
    /// Memory ceiling in bytes.
    pub fn memory_limit_bytes(&self) -> u64 {
        self.memory_limit_mb.saturating_mul(1024 * 1024)
    }
}

/// Per-user rate limiting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Minimum seconds between two runs of the same user.
    #[serde(default = "default_min_interval")]
    pub min_interval_seconds: f64,

    /// CPU seconds allowed per window. Zero or less disables the check.
    #[serde(default = "default_cpu_budget")]
    pub cpu_budget_seconds: f64,

    /// Length of the CPU budget window, in seconds.
    #[serde(default = "default_cpu_budget_window")]
    pub cpu_budget_window_seconds: f64,
}

fn default_min_interval() -> f64 {
    5.0
}

fn default_cpu_budget() -> f64 {
    15.0
}

fn default_cpu_budget_window() -> f64 {
    60.0
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            min_interval_seconds: default_min_interval(),
            cpu_budget_seconds: default_cpu_budget(),
            cpu_budget_window_seconds: default_cpu_budget_window(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Port number.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Enable CORS.
    #[serde(default = "default_true")]
    pub cors: bool,
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            cors: true,
        }
    }
}

/// Execution history storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// SQLite database URL.
    #[serde(default = "default_database_url")]
    pub database_url: String,
}

fn default_database_url() -> String {
    "sqlite://data/app.db?mode=rwc".to_string()
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
        }
    }
}
