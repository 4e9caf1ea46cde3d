use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use gatehouse_core::{AuthError, ConflictKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// API-facing error for the JSON endpoints. Browser-facing flows translate
/// failures into login redirects instead; nothing below this layer leaks a
/// raw transport error.
#[derive(Debug, Error)]
pub enum AuthApiError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found")]
    NotFound,

    #[error("{0}")]
    Conflict(ConflictKind),

    #[error("rate limited")]
    RateLimited { retry_after_seconds: u64 },

    #[error("unexpected error: {0}")]
    UnexpectedError(String),
}

impl IntoResponse for AuthApiError {
    fn into_response(self) -> Response {
        let (status_code, error_message) = match &self {
            AuthApiError::InvalidInput(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AuthApiError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            AuthApiError::Forbidden(_) => (StatusCode::FORBIDDEN, self.to_string()),
            AuthApiError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            AuthApiError::Conflict(_) => (StatusCode::CONFLICT, self.to_string()),
            AuthApiError::RateLimited {
                retry_after_seconds,
            } => {
                let body = Json(ErrorResponse {
                    error: "rate limited".to_string(),
                });
                return (
                    StatusCode::TOO_MANY_REQUESTS,
                    [(header::RETRY_AFTER, retry_after_seconds.to_string())],
                    body,
                )
                    .into_response();
            }
            // Internal detail stays in the logs.
            AuthApiError::UnexpectedError(detail) => {
                tracing::error!(error = %detail, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_message,
        });
        (status_code, body).into_response()
    }
}

impl From<AuthError> for AuthApiError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::Validation(message) => AuthApiError::InvalidInput(message),
            AuthError::NotFound => AuthApiError::NotFound,
            AuthError::Conflict(kind) => AuthApiError::Conflict(kind),
            AuthError::ExternalProvider(detail) => AuthApiError::UnexpectedError(detail),
            AuthError::RateLimited {
                retry_after_seconds,
            } => AuthApiError::RateLimited {
                retry_after_seconds,
            },
            AuthError::Unexpected(detail) => AuthApiError::UnexpectedError(detail),
        }
    }
}
