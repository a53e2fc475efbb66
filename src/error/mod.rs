use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

/// Check if running in production mode (based on RUN_MODE env var)
fn is_production() -> bool {
    std::env::var("RUN_MODE")
        .map(|m| m == "production" || m == "prod")
        .unwrap_or(false)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, client_message, log_message) = match &self {
            AppError::Auth(msg) => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                msg.clone(),
                msg.clone(),
            ),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                msg.clone(),
                msg.clone(),
            ),
            AppError::Store(e) => {
                let log_msg = e.to_string();
                let client_msg = if is_production() {
                    "Service temporarily unavailable".to_string()
                } else {
                    log_msg.clone()
                };
                (StatusCode::SERVICE_UNAVAILABLE, "STORE_ERROR", client_msg, log_msg)
            }
        };

        // Always log the detailed error server-side
        tracing::error!(
            code = %code,
            status = %status.as_u16(),
            message = %log_message,
            "API error"
        );

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: client_message,
            },
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Caller-visible rejection of the manual notification request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallableError {
    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    PermissionDenied(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    Internal(String),
}

impl CallableError {
    /// Wire code of the rejection
    pub fn status(&self) -> &'static str {
        match self {
            CallableError::Unauthenticated(_) => "unauthenticated",
            CallableError::PermissionDenied(_) => "permission-denied",
            CallableError::InvalidArgument(_) => "invalid-argument",
            CallableError::Internal(_) => "internal",
        }
    }

    pub fn http_status(&self) -> StatusCode {
        match self {
            CallableError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            CallableError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            CallableError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            CallableError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct CallableErrorResponse {
    error: CallableErrorBody,
}

#[derive(Serialize)]
struct CallableErrorBody {
    status: &'static str,
    message: String,
}

impl IntoResponse for CallableError {
    fn into_response(self) -> Response {
        let status = self.http_status();

        tracing::warn!(
            code = %self.status(),
            status = %status.as_u16(),
            message = %self,
            "Callable request rejected"
        );

        let body = CallableErrorResponse {
            error: CallableErrorBody {
                status: self.status(),
                message: self.to_string(),
            },
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callable_error_codes() {
        let cases = [
            (
                CallableError::Unauthenticated("x".into()),
                "unauthenticated",
                StatusCode::UNAUTHORIZED,
            ),
            (
                CallableError::PermissionDenied("x".into()),
                "permission-denied",
                StatusCode::FORBIDDEN,
            ),
            (
                CallableError::InvalidArgument("x".into()),
                "invalid-argument",
                StatusCode::BAD_REQUEST,
            ),
            (
                CallableError::Internal("x".into()),
                "internal",
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, code, status) in cases {
            assert_eq!(error.status(), code);
            assert_eq!(error.http_status(), status);
        }
    }

    #[tokio::test]
    async fn test_callable_error_body() {
        let response =
            CallableError::PermissionDenied("Admin role required".into()).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["error"]["status"], "permission-denied");
        assert_eq!(json["error"]["message"], "Admin role required");
    }

    #[test]
    fn test_app_error_status() {
        let response = AppError::Auth("missing key".into()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = AppError::NotFound("job".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = AppError::Store(StoreError::Unavailable("down".into())).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
