//! Error types.
//!
//! [`GrantsError`] covers calls to the authorization server; the refresh
//! gate logs it and carries on with an empty packet list. [`UserspaceError`]
//! is the only error a request handler sees.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Failures talking to the authorization server.
#[derive(Debug, Error)]
pub enum GrantsError {
    /// Connection, TLS or timeout failure.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-2xx status.
    #[error("Unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// The response body was not the expected JSON.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The client could not be constructed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl GrantsError {
    /// Machine-readable code for logs.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            GrantsError::Transport(err) if err.is_timeout() => "timeout",
            GrantsError::Transport(_) => "transport_error",
            GrantsError::UnexpectedStatus { .. } => "unexpected_status",
            GrantsError::Parse(_) => "parse_error",
            GrantsError::InvalidConfig(_) => "invalid_config",
        }
    }
}

/// Result alias for authorization server calls.
pub type GrantsResult<T> = Result<T, GrantsError>;

/// The active userspace could not be read from the request headers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UserspaceError {
    #[error("Header x-smon-userspace-id not defined.")]
    NotDefined,

    #[error("Header x-smon-userspace-id is empty.")]
    Empty,

    /// Holds the rejected raw value.
    #[error("Unable to convert userspace ID from header x-smon-userspace-id to valid value.")]
    InvalidValue(String),
}

impl UserspaceError {
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }

    #[must_use]
    pub fn error_code(&self) -> &'static str {
        "userspace_not_found"
    }
}

/// Structured JSON error body.
///
/// ```json
/// {
///     "error": "userspace_not_found",
///     "message": "Header x-smon-userspace-id not defined."
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    #[must_use]
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}

impl From<UserspaceError> for ErrorResponse {
    fn from(err: UserspaceError) -> Self {
        Self::new(err.error_code(), err.to_string())
    }
}

impl IntoResponse for UserspaceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse::from(self);

        (
            status,
            [("content-type", "application/json")],
            serde_json::to_string(&body).unwrap_or_else(|_| {
                r#"{"error":"internal_error","message":"Failed to serialize error"}"#.to_string()
            }),
        )
            .into_response()
    }
}
