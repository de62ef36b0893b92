//! Error types for the HTTP gates.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use punchcard_perms::PermsError;
use punchcard_store::StoreError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Errors that end a request at a gate.
///
/// Every variant maps to a fixed status and a short, generic message. The
/// underlying cause of a 500 is logged, never sent to the client.
#[derive(Debug, Error)]
pub enum GateError {
    /// No authenticated identity in the session.
    #[error("authentication required")]
    Unauthenticated,

    /// Authenticated, but the account has no employee record.
    #[error("no employee record linked to this account")]
    NoEmployeeLink,

    /// The permission predicate rejected the caller.
    #[error("access denied")]
    Forbidden,

    /// An unsafe request failed both the token and the same-origin check.
    #[error("CSRF validation failed")]
    CsrfRejected,

    /// Permission resolution failed.
    #[error("permission check failed: {0}")]
    PermissionCheck(#[from] PermsError),

    /// The permission predicate panicked.
    #[error("permission predicate panicked")]
    PredicatePanicked,

    /// Session storage failed.
    #[error("session storage error: {0}")]
    Session(#[from] StoreError),

    /// A handler asked for the session but no session layer ran.
    #[error("session layer not installed")]
    MissingSessionLayer,

    /// A response header could not be built.
    #[error("invalid header value: {0}")]
    Header(#[from] axum::http::header::InvalidHeaderValue),
}

impl GateError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            GateError::Unauthenticated => StatusCode::UNAUTHORIZED,
            GateError::NoEmployeeLink | GateError::Forbidden | GateError::CsrfRejected => {
                StatusCode::FORBIDDEN
            }
            GateError::PermissionCheck(_)
            | GateError::PredicatePanicked
            | GateError::Session(_)
            | GateError::MissingSessionLayer
            | GateError::Header(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message sent to the client.
    pub fn public_message(&self) -> &'static str {
        match self {
            GateError::Unauthenticated => "Authentication required",
            GateError::NoEmployeeLink => "No employee record linked to this account",
            GateError::Forbidden => "Access denied",
            GateError::CsrfRejected => "CSRF validation failed",
            GateError::PermissionCheck(_) | GateError::PredicatePanicked => {
                "Failed to verify permissions"
            }
            GateError::Session(_) | GateError::MissingSessionLayer | GateError::Header(_) => {
                "Session unavailable"
            }
        }
    }
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed closed");
        }
        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}

/// Result type for gate operations.
pub type Result<T> = std::result::Result<T, GateError>;
