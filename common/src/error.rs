//! Shared error taxonomy for both services.
//!
//! Every route handler returns `Result<T, ApiError>`. This replaces the ad hoc
//! `(StatusCode, Json<Value>)` tuples scattered across handlers with one type
//! and one `IntoResponse` impl, while keeping the same `{"error", "code"}`
//! JSON body shape on the wire.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Abstract error kinds shared by the file and terminal services.
#[derive(Debug)]
pub enum ApiError {
    /// Unknown session, process, or file. Maps to 404.
    NotFound(String),
    /// Malformed request: bad path, unsupported signal, empty search query. Maps to 400.
    InvalidArgument(String),
    /// Valid request that cannot be satisfied in the session's current state
    /// (no working directory set, stdin already closed). Maps to 400.
    FailedPrecondition(String),
    /// OS or internal failure: spawn error, pipe I/O, filesystem error. Maps to 500.
    Internal(String),
}

impl ApiError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn failed_precondition(msg: impl Into<String>) -> Self {
        Self::FailedPrecondition(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::FailedPrecondition(_) => "FAILED_PRECONDITION",
            Self::Internal(_) => "INTERNAL",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidArgument(_) | Self::FailedPrecondition(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &str {
        match self {
            Self::NotFound(m)
            | Self::InvalidArgument(m)
            | Self::FailedPrecondition(m)
            | Self::Internal(m) => m,
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "error": self.message(),
            "code": self.code(),
        }));
        (status, body).into_response()
    }
}

/// Wrap a `std::io::Error` into the taxonomy based on its `ErrorKind`.
pub fn from_io_error(err: std::io::Error, context: &str) -> ApiError {
    match err.kind() {
        std::io::ErrorKind::NotFound => ApiError::NotFound(format!("{context}: not found")),
        std::io::ErrorKind::PermissionDenied => {
            ApiError::Internal(format!("{context}: permission denied"))
        }
        _ => ApiError::Internal(format!("{context}: {err}")),
    }
}
