//! Error types for the account service
//!
//! Every operation reports failures through [`ApiError`], which maps one-to-one
//! onto the HTTP status codes of the public interface.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::jwt::TokenError;
use crate::repositories::StoreError;

/// Custom error type for the account service
#[derive(Error, Debug)]
pub enum ApiError {
    /// Missing, invalid or expired credentials (401)
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Authenticated but not allowed (403)
    #[error("Forbidden: {message}")]
    Forbidden {
        message: String,
        required_roles: Option<Vec<String>>,
        user_role: Option<String>,
    },

    /// Malformed input or an illegal operation (400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Referenced record does not exist (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Infrastructure failure (500)
    #[error("Internal server error")]
    InternalServerError,
}

impl ApiError {
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        ApiError::Unauthenticated(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden {
            message: message.into(),
            required_roles: None,
            user_role: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match self {
            ApiError::Unauthenticated(message)
            | ApiError::BadRequest(message)
            | ApiError::NotFound(message) => json!({ "error": message }),
            ApiError::Forbidden {
                message,
                required_roles: Some(required_roles),
                user_role,
            } => json!({
                "error": message,
                "required_roles": required_roles,
                "user_role": user_role,
            }),
            ApiError::Forbidden { message, .. } => json!({ "error": message }),
            ApiError::InternalServerError => json!({ "error": "Internal server error" }),
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(message) => ApiError::BadRequest(message),
            StoreError::RoleInUse(name) => {
                ApiError::BadRequest(format!("Role {} is still assigned to users", name))
            }
            StoreError::Database(e) => {
                error!("Credential store failure: {}", e);
                ApiError::InternalServerError
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        // Non-numeric ids cannot match any record
        ApiError::NotFound(rejection.body_text())
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Fatal(_) => ApiError::InternalServerError,
            other => ApiError::Unauthenticated(other.to_string()),
        }
    }
}

/// Type alias for service results
pub type ApiResult<T> = Result<T, ApiError>;
