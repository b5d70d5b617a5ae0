use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use shop_storage::{ErrorKind, StorageError};
use thiserror::Error;
use tracing::error;

/// Failures of the use-case layer.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Password is incorrect")]
    IncorrectPassword,

    #[error("Current password does not match")]
    PasswordMismatch,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error body returned by every endpoint.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{status} {code}: {message}")]
pub struct ApiError {
    #[serde(serialize_with = "status_code")]
    pub status: StatusCode,
    pub code: String,
    pub message: String,
}

fn status_code<S: serde::Serializer>(
    status: &StatusCode,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_u16(status.as_u16())
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn bad_request(code: &str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    /// Role gate failure. Reported as 401 like a missing identity.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "FORBIDDEN", message)
    }

    pub fn server_error() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "SERVER_ERROR", "server error")
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err.kind() {
            ErrorKind::NotFound => {
                Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", "not found resources")
            }
            ErrorKind::ConstraintViolation => Self::bad_request(
                "CONSTRAINT_VIOLATION",
                "constraint violation",
            ),
            ErrorKind::PrereqStateViolation => Self::bad_request(
                "OBJECT_NOT_IN_PREREQUISITE_STATE",
                "object not in prerequisite state",
            ),
            ErrorKind::StoreFault => {
                error!(error = %err, "storage fault");
                Self::server_error()
            }
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Storage(err) => err.into(),
            ServiceError::IncorrectPassword => Self::new(
                StatusCode::UNAUTHORIZED,
                "001",
                "Password is incorrect",
            ),
            ServiceError::PasswordMismatch => Self::new(
                StatusCode::BAD_REQUEST,
                "002",
                "Password is incorrect",
            ),
            ServiceError::Unauthorized(msg) => Self::unauthorized(msg),
            ServiceError::Validation(errors) => {
                Self::bad_request("VALIDATION_ERROR", errors.to_string())
            }
            ServiceError::Internal(msg) => {
                error!(error = %msg, "internal error");
                Self::server_error()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, axum::Json(&self)).into_response()
    }
}
