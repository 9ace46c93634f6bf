//! HTTP gateway server.

use crate::error::GatewayError;
use crate::handlers;
use crate::inflight::InFlight;
use crate::Result;
use axum::{
    http::Method,
    routing::{get, post},
    Router,
};
use plotbox_core::config::ServerConfig;
use plotbox_history::{ExecutionHistory, RateGovernor};
use plotbox_sandbox::CodeRunner;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Default gateway port.
pub const DEFAULT_PORT: u16 = 8000;

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Bind address.
    pub bind: String,

    /// Port number.
    pub port: u16,

    /// Enable CORS.
    pub cors: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            cors: true,
        }
    }
}

impl From<&ServerConfig> for GatewayConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            bind: config.bind.clone(),
            port: config.port,
            cors: config.cors,
        }
    }
}

impl GatewayConfig {
    /// Socket address to listen on.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .bind
            .parse()
            .map_err(|_| GatewayError::Internal(format!("Invalid bind address: {}", self.bind)))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Shared state for request handlers.
pub struct GatewayState {
    /// Runs admitted requests.
    pub runner: Arc<dyn CodeRunner>,

    /// Per-user run log.
    pub history: Arc<dyn ExecutionHistory>,

    /// Admission control.
    pub governor: RateGovernor,

    /// Users with a run not yet recorded.
    pub in_flight: InFlight,
}

/// The HTTP gateway.
pub struct Gateway {
    state: Arc<GatewayState>,
    config: GatewayConfig,
}

impl Gateway {
    /// Create a new gateway.
    pub fn new(
        config: GatewayConfig,
        runner: Arc<dyn CodeRunner>,
        history: Arc<dyn ExecutionHistory>,
        governor: RateGovernor,
    ) -> Self {
        Self {
            state: Arc::new(GatewayState {
                runner,
                history,
                governor,
                in_flight: InFlight::new(),
            }),
            config,
        }
    }

    /// Shared handler state.
    pub fn state(&self) -> &Arc<GatewayState> {
        &self.state
    }

    /// Gateway configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Run the gateway server.
    pub async fn run(&self) -> Result<()> {
        let addr = self.config.socket_addr()?;
        if !addr.ip().is_loopback() {
            warn!(
                "Gateway binding to {}; requests are trusted to carry an authenticated x-user-id",
                addr
            );
        }

        let app = self.router();

        info!("Starting gateway server on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(GatewayError::Io)?;

        axum::serve(listener, app)
            .await
            .map_err(|e| GatewayError::Internal(e.to_string()))?;

        Ok(())
    }

    /// Create the Axum router.
    pub fn router(&self) -> Router {
        let mut router = Router::new()
            .route("/api/execute", post(handlers::execute))
            .route("/api/programs/history", get(handlers::history))
            .route("/api/status", get(handlers::status))
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http());

        if self.config.cors {
            router = router.layer(Self::create_cors_layer());
        }

        router
    }

    fn create_cors_layer() -> CorsLayer {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
            .max_age(std::time::Duration::from_secs(3600))
    }
}
