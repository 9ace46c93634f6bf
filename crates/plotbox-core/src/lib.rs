//! # plotbox-core
//!
//! Core types, configuration, and utilities for plotbox.
//!
//! This crate provides shared functionality used across all plotbox crates:
//!
//! - **Configuration**: Layered loading (defaults, JSON5 file, environment) and validation
//! - **Types**: Execution requests and results, chart artifacts, user identifiers
//! - **Utilities**: Environment variable handling

pub mod config;
pub mod env;
pub mod error;
pub mod types;

// Re-exports for convenience
pub use config::Config;
pub use error::{ConfigError, Error, Result};
pub use types::*;
