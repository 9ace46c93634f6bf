//! Sandboxed run endpoint.

use super::caller;
use crate::error::GatewayError;
use crate::server::GatewayState;
use axum::{extract::State, http::HeaderMap, Json};
use chrono::Utc;
use plotbox_core::{ExecutionRequest, ExecutionResult};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};

/// Body of `POST /api/execute`.
#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub code: String,
}

/// Returned when the caller already has a run in progress.
pub const RUN_IN_PROGRESS_MESSAGE: &str =
    "A previous run is still in progress. Please wait for it to finish.";

/// Admit, run and record one submission.
pub async fn execute(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Json(body): Json<ExecuteRequest>,
) -> Result<Json<ExecutionResult>, GatewayError> {
    let user = caller(&headers)?;
    if body.code.trim().is_empty() {
        return Err(GatewayError::BadRequest("Code is empty".to_string()));
    }

    // One run per user from admission until it is recorded.
    let _slot = state
        .in_flight
        .try_acquire(&user)
        .ok_or_else(|| GatewayError::RunInProgress(RUN_IN_PROGRESS_MESSAGE.to_string()))?;

    state
        .governor
        .check(state.history.as_ref(), &user, Utc::now())
        .await?;

    info!(user = %user, bytes = body.code.len(), "Run admitted");
    let request = ExecutionRequest::new(body.code, user.clone());
    let result = state.runner.run(&request).await;

    // The result is returned even if it cannot be recorded.
    if let Err(e) = state
        .history
        .record_run(&user, &request.code, &result, Utc::now())
        .await
    {
        error!(user = %user, "Failed to record run: {}", e);
    }

    Ok(Json(result))
}
