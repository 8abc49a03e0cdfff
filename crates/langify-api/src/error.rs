use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use langify_db::DbError;
use langify_engine::SessionError;
use langify_types::api::ErrorResponse;
use thiserror::Error;
use tracing::error;

/// Expected failures of the account and lesson operations. Each renders as
/// `{"success": false, "message": ...}`; credential failures stay vague on
/// purpose so they never reveal which field was wrong.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Username already exists.")]
    Conflict,

    #[error("Invalid username or password.")]
    InvalidCredentials,

    #[error("Current password is incorrect.")]
    WrongPassword,

    #[error("{0} not found.")]
    NotFound(&'static str),

    #[error("Authentication required.")]
    Unauthorized,

    #[error("Administrator privileges required.")]
    Forbidden,

    #[error("Internal server error.")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict => StatusCode::CONFLICT,
            Self::InvalidCredentials | Self::WrongPassword | Self::Unauthorized => {
                StatusCode::UNAUTHORIZED
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound { entity, .. } => Self::NotFound(match entity {
                "user" => "User",
                "lesson" => "Lesson",
                _ => "Record",
            }),
            DbError::Conflict(_) => Self::Conflict,
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        Self::Validation(format!("Cannot do that now: {e}."))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal(detail) = &self {
            error!("Internal error: {}", detail);
        }
        let body = ErrorResponse {
            success: false,
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
