use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Session expired: {0}")]
    AuthExpired(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    /// A scheduling policy (holiday closure, double booking) refused the request.
    #[error("Blocked by policy ({reason}): {message}")]
    BlockedByPolicy { reason: String, message: String },

    #[error("Remote operation failed: {0}")]
    RemoteOperation(String),
}

impl AppError {
    /// Only backing-store failures are worth a manual retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::RemoteOperation(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Auth(_) => "auth",
            AppError::AuthExpired(_) => "auth_expired",
            AppError::NotFound(_) => "not_found",
            AppError::BadRequest(_) => "bad_request",
            AppError::Internal(_) => "internal",
            AppError::ValidationError(_) => "validation",
            AppError::BlockedByPolicy { .. } => "blocked_by_policy",
            AppError::RemoteOperation(_) => "remote_operation",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Auth(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::AuthExpired(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::BlockedByPolicy { message, .. } => (StatusCode::UNPROCESSABLE_ENTITY, message.clone()),
            AppError::RemoteOperation(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
        };

        match status {
            StatusCode::BAD_GATEWAY | StatusCode::INTERNAL_SERVER_ERROR => {
                tracing::error!("Error: {}: {}", status, message)
            }
            _ => tracing::debug!("Rejected: {}: {}", status, message),
        }

        let mut body = json!({
            "error": message,
            "kind": self.kind(),
        });
        if let AppError::BlockedByPolicy { reason, .. } = &self {
            body["reason"] = json!(reason);
        }

        (status, Json(body)).into_response()
    }
}
