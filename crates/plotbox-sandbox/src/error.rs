//! Sandbox error types.

use std::io;
use thiserror::Error;

/// Errors that can occur during sandbox operations.
///
/// None of these reach the caller of the orchestrator directly: inside the
/// worker they become a faulted report, and in the supervisor they become a
/// failure result.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The worker process could not be started.
    #[error("Failed to spawn worker: {0}")]
    Spawn(String),

    /// The script environment could not be built.
    #[error("Environment setup failed: {0}")]
    Environment(String),

    /// The worker protocol was violated.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SandboxError {
    /// Create a new spawn error.
    pub fn spawn(msg: impl Into<String>) -> Self {
        Self::Spawn(msg.into())
    }

    /// Create a new environment setup error.
    pub fn environment(msg: impl Into<String>) -> Self {
        Self::Environment(msg.into())
    }

    /// Create a new protocol error.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }
}
