//! HTTP route handlers.

pub mod execute;
pub mod health;
pub mod history;

use crate::error::GatewayError;
use axum::http::HeaderMap;
use plotbox_core::UserId;

pub use execute::{execute, ExecuteRequest};
pub use health::status;
pub use history::{history, HistoryQuery};

/// Header carrying the authenticated caller, set by the upstream auth layer.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Identify the caller.
pub(crate) fn caller(headers: &HeaderMap) -> Result<UserId, GatewayError> {
    let user = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(UserId::new)
        .filter(|u| !u.is_empty());

    user.ok_or_else(|| GatewayError::Unauthorized("Authentication required".to_string()))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caller_from_header() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, " alice ".parse().unwrap());
        assert_eq!(caller(&headers).unwrap().as_str(), "alice");
    }

    #[test]
    fn test_caller_missing_or_blank() {
        assert!(matches!(
            caller(&HeaderMap::new()),
            Err(GatewayError::Unauthorized(_))
        ));

        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, "   ".parse().unwrap());
        assert!(caller(&headers).is_err());
    }
}
