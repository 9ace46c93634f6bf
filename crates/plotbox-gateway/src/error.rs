//! Gateway error types.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use plotbox_history::{GovernorError, HistoryError, RateLimited};
use thiserror::Error;
use tracing::error;

/// Errors that can occur in the gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed or empty request.
    #[error("{0}")]
    BadRequest(String),

    /// No caller identity on the request.
    #[error("{0}")]
    Unauthorized(String),

    /// Refused by the rate governor.
    #[error(transparent)]
    RateLimited(#[from] RateLimited),

    /// The caller already has a run in progress.
    #[error("{0}")]
    RunInProgress(String),

    /// History store failure.
    #[error("History error: {0}")]
    History(#[from] HistoryError),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<GovernorError> for GatewayError {
    fn from(e: GovernorError) -> Self {
        match e {
            GovernorError::Limited(limited) => Self::RateLimited(limited),
            GovernorError::History(e) => Self::History(e),
        }
    }
}

impl GatewayError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::RateLimited(_) | Self::RunInProgress(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::Io(_) | Self::History(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        // Internal details stay in the log.
        let detail = if status.is_server_error() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let mut response = (status, Json(serde_json::json!({ "detail": detail }))).into_response();
        let retry_after = match &self {
            Self::RateLimited(limited) => Some(limited.retry_after_secs),
            Self::RunInProgress(_) => Some(1),
            _ => None,
        };
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plotbox_history::RateLimitKind;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            GatewayError::BadRequest("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::Unauthorized("x".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            GatewayError::Internal("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_rate_limited_sets_retry_after() {
        let response = GatewayError::RateLimited(RateLimited {
            kind: RateLimitKind::MinInterval,
            message: "wait".to_string(),
            retry_after_secs: 3,
        })
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "3");
    }

    #[test]
    fn test_run_in_progress_is_retryable() {
        let response = GatewayError::RunInProgress("busy".into()).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "1");
    }

    #[test]
    fn test_governor_error_conversion() {
        let limited = RateLimited {
            kind: RateLimitKind::CpuBudget,
            message: "busy".to_string(),
            retry_after_secs: 10,
        };
        let e: GatewayError = GovernorError::Limited(limited.clone()).into();
        assert!(matches!(e, GatewayError::RateLimited(l) if l == limited));
    }
}
