//! Process-isolated execution of untrusted plotting scripts.
//!
//! Every run happens in a fresh worker process:
//! - `limits`: OS resource ceilings the worker applies to itself
//! - `environment`: the restricted interpreter and its plotting capabilities
//! - `artifact`: selection of the chart returned to the caller
//! - `worker`: the worker's request/report protocol and entry point
//! - `executor`: the supervisor that spawns, waits for and kills workers

pub mod artifact;
pub mod chart;
pub mod environment;
pub mod error;
pub mod executor;
pub mod limits;
mod numeric;
pub mod worker;

pub use artifact::extract_artifact;
pub use chart::{Chart, Marker, Renderer};
pub use environment::{Environment, EnvironmentOptions, ExecutionContext};
pub use error::SandboxError;
pub use executor::{CodeRunner, ExecutionOutcome, SandboxOrchestrator, WorkerCommand};
pub use limits::apply_resource_limits;
pub use worker::{run_worker, worker_main, WorkerReport, WorkerRequest};

/// Result type for sandbox operations.
pub type Result<T> = std::result::Result<T, SandboxError>;
