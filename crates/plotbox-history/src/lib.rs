//! Execution history and per-user rate limiting for plotbox.
//!
//! This crate provides:
//! - An append-only, per-user log of past runs (in memory or SQLite)
//! - The rate governor that admits or rejects a run based on that log

pub mod error;
pub mod governor;
pub mod store;

pub use error::HistoryError;
pub use governor::{GovernorError, RateGovernor, RateLimitKind, RateLimited, RateState};
pub use store::{ExecutionHistory, MemoryHistory, RunRecord, SqliteHistory};

/// Result type for history operations.
pub type Result<T> = std::result::Result<T, HistoryError>;
