//! Liveness endpoint.

use axum::Json;
use serde::Serialize;

/// Status response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

/// `GET /api/status`.
pub async fn status() -> Json<StatusResponse> {
    Json(StatusResponse { status: "ok" })
}

#[cfg(test)]
mod tests {
    use super::super::testing::{fixture, json_body, unlimited};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_status_ok() {
        let response = fixture(unlimited())
            .gateway
            .router()
            .oneshot(Request::get("/api/status").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let (status, body) = json_body(response).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({ "status": "ok" }));
    }
}
