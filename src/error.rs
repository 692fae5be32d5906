//! Shared error taxonomy for the server, the API client, and the sync client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors crossing component boundaries.
///
/// Execution failures are deliberately absent: code that ran and failed is
/// reported as `ExecutionResult { success: false, .. }` data, not as an error.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Bad input shape or value. Not retried, shown to the user.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The referenced record does not exist (or no longer does).
    #[error("not found: {0}")]
    NotFound(String),

    /// Missing, invalid, or expired credential. Fatal to the current view.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Network-level failure. Safe to retry on the next poll tick.
    #[error("transport failure: {0}")]
    Transport(String),

    /// Unexpected server-side failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(what: &str, id: &str) -> Self {
        Self::NotFound(format!("{what} {id}"))
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    /// Whether a session view hitting this error must shut down rather than
    /// retry: the record is gone, or the credential is no longer accepted.
    pub fn is_fatal_to_view(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Unauthorized(_))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Transport(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Maps an HTTP response status back into the taxonomy on the client side.
    pub fn from_status(status: StatusCode, message: String) -> Self {
        match status {
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => Self::Validation(message),
            StatusCode::NOT_FOUND => Self::NotFound(message),
            StatusCode::UNAUTHORIZED => Self::Unauthorized(message),
            s if s.is_server_error() => Self::Internal(message),
            s => Self::Transport(format!("unexpected status {s}: {message}")),
        }
    }
}

/// Wire shape for error responses.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
