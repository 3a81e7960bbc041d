use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;

/// ApiError
///
/// The domain error taxonomy. Every fallible service operation resolves into one
/// of these variants, and the `IntoResponse` impl is the single place where they
/// are translated into structured HTTP responses. Raw storage errors never reach
/// the caller: they are funneled into `Database`/`Internal` and surfaced as a
/// generic server fault after being logged.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or invalid input: password mismatch, disallowed file type or
    /// size, duplicate email, blank required fields.
    #[error("{0}")]
    Validation(String),

    /// Bad credentials or an unusable account. Unknown email and wrong password
    /// share this variant so they stay indistinguishable to the caller.
    #[error("{0}")]
    Auth(String),

    /// Authenticated but not authorized for the attempted operation.
    #[error("{0}")]
    Permission(String),

    /// The identifier does not resolve, or resolves to a resource the caller may
    /// not read. Both cases are surfaced identically so the existence of private
    /// resources is not leaked.
    #[error("{0}")]
    NotFound(String),

    /// A concurrent-mutation race the caller may retry.
    #[error("{0}")]
    Conflict(String),

    /// Unexpected database failure. Logged, reported as a generic server fault.
    #[error("database error")]
    Database(#[from] sqlx::Error),

    /// Unexpected blob-store or other internal failure. Logged, reported as a
    /// generic server fault.
    #[error("internal error: {0}")]
    Internal(String),
}

/// ErrorBody
///
/// The wire shape of every error response: a machine-readable kind plus a
/// human-readable message in the caller's terms.
#[derive(Debug, Serialize, TS, ToSchema)]
#[ts(export)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl ApiError {
    /// The machine-readable kind carried in the response body.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::Auth(_) => "authentication_failed",
            ApiError::Permission(_) => "permission_denied",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::Database(_) | ApiError::Internal(_) => "server_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
            ApiError::Permission(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            // Internal faults are logged with full detail and surfaced generically.
            ApiError::Database(e) => {
                tracing::error!("database error: {:?}", e);
                "internal server error".to_string()
            }
            ApiError::Internal(e) => {
                tracing::error!("internal error: {}", e);
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorBody {
            error: self.kind().to_string(),
            message,
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Convenience alias used throughout the service and handler layers.
pub type ApiResult<T> = Result<T, ApiError>;
