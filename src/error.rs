//! Boundary error type.
//!
//! Handlers return `Result<_, ApiError>` and propagate store and authorization
//! failures with `?`. Each variant maps to exactly one HTTP status.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{authz::AuthzError, models::ErrorBody, repository::RepoError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// A required field is missing or malformed. Rendered as plain text.
    #[error("{0}")]
    Validation(String),

    /// The request is well formed but cannot be applied (e.g. overselling).
    /// Rendered as plain text.
    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// Unexpected failure. The diagnostic is logged, never sent to the client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn missing_information() -> Self {
        ApiError::Validation("Missing information".to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::Validation(msg) | ApiError::InvalidArgument(msg) => {
                return (status, msg).into_response();
            }
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "request failed");
                "Something went wrong".to_string()
            }
            ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg) => msg,
        };

        let body = ErrorBody {
            status_code: status.as_u16(),
            success: false,
            message,
        };
        (status, Json(body)).into_response()
    }
}

impl From<RepoError> for ApiError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::Conflict(msg) => ApiError::Conflict(msg),
            RepoError::Database(db_err) => ApiError::Internal(db_err.to_string()),
        }
    }
}

impl From<AuthzError> for ApiError {
    fn from(e: AuthzError) -> Self {
        match e {
            AuthzError::UserNotFound => ApiError::NotFound("User not found".to_string()),
            AuthzError::RoleNotFound => ApiError::NotFound("Role not found".to_string()),
            AuthzError::Store(store_err) => store_err.into(),
        }
    }
}
