//! HTTP error type
//!
//! Every handler returns [`ApiResult`]. Errors render as
//! `{"error": {"code": "...", "message": "..."}}` with a matching status.
//! Upstream and internal failures are logged in full and answered with a
//! generic message.

use crate::clients::ClientError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or invalid parameter (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Missing or invalid access token (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Conflict (409), e.g. username taken
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Storage quota exceeded (413)
    #[error("Storage quota exceeded: need {needed} bytes, {available} available")]
    PayloadTooLarge { needed: i64, available: i64 },

    /// External service failed (502)
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<naturae_common::Error> for ApiError {
    fn from(err: naturae_common::Error) -> Self {
        use naturae_common::Error;

        match err {
            Error::NotFound(msg) => ApiError::NotFound(msg),
            Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            Error::Forbidden(msg) => ApiError::Forbidden(msg),
            Error::Conflict(msg) => ApiError::Conflict(msg),
            Error::QuotaExceeded { needed, available } => ApiError::PayloadTooLarge { needed, available },
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ClientError> for ApiError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::NotFound(what) => ApiError::NotFound(what),
            other => ApiError::Upstream(other.to_string()),
        }
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::Internal(format!("IO error: {}", err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::PayloadTooLarge { needed, available } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "QUOTA_EXCEEDED",
                format!(
                    "Not enough storage: the upload needs {} bytes but only {} bytes are left",
                    needed, available
                ),
            ),
            ApiError::Upstream(detail) => {
                tracing::error!(error = %detail, "External service request failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "UPSTREAM_ERROR",
                    "External service is unavailable".to_string(),
                )
            }
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_errors_map_to_statuses() {
        let cases = [
            (naturae_common::Error::NotFound("x".into()), StatusCode::NOT_FOUND),
            (naturae_common::Error::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (naturae_common::Error::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (naturae_common::Error::Conflict("x".into()), StatusCode::CONFLICT),
            (
                naturae_common::Error::QuotaExceeded { needed: 2, available: 1 },
                StatusCode::PAYLOAD_TOO_LARGE,
            ),
            (naturae_common::Error::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn test_client_errors_map_to_bad_gateway() {
        let response = ApiError::from(ClientError::Network("timeout".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let response = ApiError::from(ClientError::NotFound("page".into())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
