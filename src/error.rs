//! Central HTTP error type and the mapping from domain errors onto it.
use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

use crate::{auth::gate::GateRejection, posts::model::PostError, users::model::UserError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(&'static str),
    /// The request could not be decoded; keeps the extractor's status.
    #[error("{1}")]
    Malformed(StatusCode, String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Malformed(status, _) => *status,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to send to clients. Internal details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Internal(_) => "An internal server error occurred".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Internal(detail) = &self {
            error!(error = %detail, "request failed");
        }
        let body = serde_json::json!({ "error": self.public_message() });
        (self.status_code(), Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(r: JsonRejection) -> Self {
        AppError::Malformed(r.status(), r.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(r: PathRejection) -> Self {
        AppError::Malformed(r.status(), r.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(r: QueryRejection) -> Self {
        AppError::Malformed(r.status(), r.body_text())
    }
}

impl From<UserError> for AppError {
    fn from(e: UserError) -> Self {
        match e {
            UserError::PasswordTooShort | UserError::InvalidUsername | UserError::InvalidEmail => {
                AppError::Validation(e.to_string())
            }
            UserError::IncorrectPassword => AppError::Validation(e.to_string()),
            UserError::DuplicateUsername => AppError::Conflict("Username already exists"),
            UserError::DuplicateEmail => AppError::Conflict("Email already exists"),
            UserError::PasswordChangeConflict => {
                AppError::Conflict("Password was changed by another request")
            }
            UserError::InvalidCredentials => AppError::InvalidCredentials,
            UserError::AccountInactive => AppError::Forbidden("Account is not active"),
            UserError::NotFound => AppError::NotFound("User not found"),
            UserError::Hash(_) | UserError::Token(_) | UserError::Store(_) => {
                AppError::Internal(e.to_string())
            }
        }
    }
}

impl From<PostError> for AppError {
    fn from(e: PostError) -> Self {
        match e {
            PostError::InvalidTitle => {
                AppError::Validation("Title must be between 3 and 255 characters".into())
            }
            PostError::InvalidContent => {
                AppError::Validation("Content must be at least 10 characters".into())
            }
            PostError::NotFound => AppError::NotFound("Post not found"),
            PostError::Unauthorized => AppError::Forbidden("Not allowed to modify this post"),
            PostError::Store(_) => AppError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for GateRejection {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            GateRejection::Unavailable(e) => {
                error!(error = %e, "auth gate could not reach the store");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal server error occurred".to_string(),
                )
            }
            GateRejection::SigningKeyMissing => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An internal server error occurred".to_string(),
            ),
            other => (StatusCode::UNAUTHORIZED, other.to_string()),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
