use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::models::ApiResponse;

/// RepositoryError
///
/// Failures surfaced by the persistence layer. `Clone` because a single
/// connection attempt's outcome is handed to every caller that waited on it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    /// The store could not be reached or the connection could not be set up.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A write hit the unique index on `user_id`.
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    #[error("storage error: {0}")]
    Backend(String),
}

impl RepositoryError {
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, Self::DuplicateKey(_))
    }
}

/// ApiError
///
/// Every way a request can fail. Guards and the validator produce these
/// directly; storage failures arrive through `From<RepositoryError>`. The
/// conversion to the JSON envelope happens only in `IntoResponse`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// No API key configured while running in production.
    #[error("server misconfigured: API_KEY is not set in production")]
    ServerMisconfigured,

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ServerMisconfigured | Self::StorageUnavailable(_) | Self::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// The message shown to the caller. Server-side failures get a fixed
    /// string so internal details never leave the process.
    pub fn public_message(&self) -> String {
        match self {
            Self::InvalidInput(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::NotFound(msg) => msg.clone(),
            Self::ServerMisconfigured => "Server configuration error".to_string(),
            Self::StorageUnavailable(_) => "Storage unavailable".to_string(),
            Self::Storage(_) => "Internal server error".to_string(),
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Unavailable(msg) => Self::StorageUnavailable(msg),
            RepositoryError::DuplicateKey(msg) | RepositoryError::Backend(msg) => {
                Self::Storage(msg)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
        }

        (status, Json(ApiResponse::failure(self.public_message()))).into_response()
    }
}
