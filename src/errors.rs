use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::models::approval::ApprovalId;

#[derive(Debug, Error)]
pub enum CourierError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("approval {0} not found")]
    NotFound(ApprovalId),

    #[error("approval {0} already resolved")]
    AlreadyResolved(ApprovalId),

    #[error("rate limited, retry after {retry_after:?}")]
    WouldBlock { retry_after: Duration },

    #[error("send failed after {attempts} attempts: {reason}")]
    SendFailure { attempts: u32, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl CourierError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

impl IntoResponse for CourierError {
    fn into_response(self) -> Response {
        let (status, error_type, code, msg) = match &self {
            CourierError::Validation(reason) => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "validation_failed",
                reason.clone(),
            ),
            CourierError::NotFound(id) => (
                StatusCode::NOT_FOUND,
                "not_found_error",
                "approval_not_found",
                format!("approval '{}' not found", id),
            ),
            CourierError::AlreadyResolved(id) => (
                StatusCode::CONFLICT,
                "conflict_error",
                "approval_already_resolved",
                format!("approval '{}' is no longer pending", id),
            ),
            CourierError::WouldBlock { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limit_error",
                "rate_limit_exceeded",
                "rate limit exceeded".to_string(),
            ),
            CourierError::SendFailure { attempts, reason } => (
                StatusCode::BAD_GATEWAY,
                "upstream_error",
                "send_failed",
                format!("delivery failed after {} attempts: {}", attempts, reason),
            ),
            CourierError::Config(e) => {
                tracing::error!("Configuration error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal_server_error",
                    "internal server error".to_string(),
                )
            }
            CourierError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal_server_error",
                    "internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "message": msg,
                "type": error_type,
                "code": code,
            }
        }));

        let mut response = (status, body).into_response();

        if let CourierError::WouldBlock { retry_after } = &self {
            let secs = retry_after.as_secs_f64().ceil().max(1.0) as u64;
            if let Ok(value) = axum::http::HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert("retry-after", value);
            }
        }

        response
    }
}
