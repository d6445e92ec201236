use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use std::fmt;

use super::ApiResponse;
use crate::library::ContentError;
use crate::services::AuthError;

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),

    StorageError(String),

    ValidationError(String),

    InternalError(String),

    Unauthorized(String),

    Forbidden(String),

    TooManyRequests {
        message: String,
        retry_after_secs: u64,
    },
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::StorageError(msg) => write!(f, "Storage error: {}", msg),
            ApiError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::TooManyRequests { message, .. } => {
                write!(f, "Too many requests: {}", message)
            }
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::StorageError(msg) => {
                tracing::error!("Storage error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A storage error occurred".to_string(),
                )
            }
            ApiError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            ApiError::TooManyRequests {
                message,
                retry_after_secs,
            } => {
                let body = ApiResponse::<()>::error(message.clone());
                return (
                    StatusCode::TOO_MANY_REQUESTS,
                    [(header::RETRY_AFTER, retry_after_secs.to_string())],
                    Json(body),
                )
                    .into_response();
            }
        };

        let body = ApiResponse::<()>::error(error_message);
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::NotFound => ApiError::NotFound("User not found".to_string()),
            AuthError::InvalidCredentials {
                attempts_left: Some(left),
            } => ApiError::Unauthorized(format!(
                "Invalid username or password ({left} attempts remaining)"
            )),
            AuthError::InvalidCredentials {
                attempts_left: None,
            } => ApiError::Unauthorized("Invalid username or password".to_string()),
            AuthError::InvalidToken | AuthError::Expired | AuthError::Unauthenticated => {
                ApiError::Unauthorized("Authentication required".to_string())
            }
            AuthError::Blocked {
                retry_after_minutes,
            } => ApiError::too_many_requests(retry_after_minutes),
            AuthError::Unauthorized => {
                ApiError::Forbidden("Insufficient permissions".to_string())
            }
            AuthError::Validation(msg) => ApiError::ValidationError(msg),
            AuthError::Storage(e) => ApiError::StorageError(e.to_string()),
            AuthError::Internal(msg) => ApiError::InternalError(msg),
        }
    }
}

impl From<ContentError> for ApiError {
    fn from(err: ContentError) -> Self {
        match err {
            ContentError::InvalidFilename(name) => {
                ApiError::ValidationError(format!("Invalid filename: {name}"))
            }
            ContentError::NotFound(name) => ApiError::not_found("Content", name),
            e @ ContentError::Io { .. } => ApiError::StorageError(e.to_string()),
        }
    }
}

impl ApiError {
    pub fn not_found(resource: &str, id: impl fmt::Display) -> Self {
        ApiError::NotFound(format!("{} {} not found", resource, id))
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::ValidationError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        ApiError::InternalError(msg.into())
    }

    pub fn too_many_requests(retry_after_minutes: i64) -> Self {
        let minutes = retry_after_minutes.max(1);
        ApiError::TooManyRequests {
            message: format!("Too many login attempts. Try again in {minutes} minutes"),
            retry_after_secs: u64::try_from(minutes).unwrap_or(1) * 60,
        }
    }
}
