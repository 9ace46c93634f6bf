//! HTTP gateway for plotbox.
//!
//! This crate provides:
//! - `POST /api/execute`: rate-limited sandboxed runs
//! - `GET /api/programs/history`: a user's recent runs
//! - `GET /api/status`: liveness

pub mod error;
pub mod handlers;
pub mod inflight;
pub mod server;

pub use error::GatewayError;
pub use inflight::{InFlight, InFlightGuard};
pub use server::{Gateway, GatewayConfig, GatewayState};

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;
