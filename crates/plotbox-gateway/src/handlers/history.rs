//! Run history endpoint.

use super::caller;
use crate::error::GatewayError;
use crate::server::GatewayState;
use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use plotbox_history::RunRecord;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Runs returned when no limit is given.
pub const DEFAULT_HISTORY_LIMIT: i64 = 20;

/// Upper bound on runs returned.
pub const MAX_HISTORY_LIMIT: i64 = 100;

/// Query string of `GET /api/programs/history`.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

impl HistoryQuery {
    /// Requested limit clamped to `1..=MAX_HISTORY_LIMIT`.
    pub fn effective_limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(1, MAX_HISTORY_LIMIT) as usize
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub history: Vec<RunRecord>,
}

/// The caller's most recent runs, newest first.
pub async fn history(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, GatewayError> {
    let user = caller(&headers)?;
    let history = state
        .history
        .list_runs(&user, query.effective_limit())
        .await?;
    Ok(Json(HistoryResponse { history }))
}
