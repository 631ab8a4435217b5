//! Bridge error taxonomy and its HTTP mapping.
//!
//! Every externally observable failure carries a stable snake_case code and a
//! human-readable message. Translation-stage errors surface synchronously as
//! structured ANP error bodies; they never open a session.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, Clone, thiserror::Error)]
pub enum BridgeError {
    /// The DID is not present in the identity registry.
    #[error("unknown identity: '{0}' is not registered")]
    UnknownIdentity(String),

    /// No intent→method mapping entry exists for this intent.
    #[error("no method mapping for intent '{0}'")]
    UnmappedIntent(String),

    /// The request body or parameters failed boundary validation.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// The session key already denotes an open session.
    #[error("session key '{0}' is already in flight")]
    DuplicateSessionKey(String),

    /// No open session exists for this key (never opened, or already retired).
    #[error("no open session for key '{0}'")]
    UnknownSession(String),

    /// The downstream MCP call did not answer within the configured window.
    #[error("session '{0}' timed out waiting for the downstream MCP response")]
    SessionTimeout(String),

    /// The transport adapter failed; the underlying detail is preserved.
    #[error("transport failure: {0}")]
    TransportFailure(String),
}

impl BridgeError {
    /// Stable wire code for the ANP error payload.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownIdentity(_) => "unknown_identity",
            Self::UnmappedIntent(_) => "unmapped_intent",
            Self::InvalidParameters(_) => "invalid_parameters",
            Self::DuplicateSessionKey(_) => "duplicate_session_key",
            Self::UnknownSession(_) => "unknown_session",
            Self::SessionTimeout(_) => "session_timeout",
            Self::TransportFailure(_) => "transport_failure",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::UnknownIdentity(_)
            | Self::UnmappedIntent(_)
            | Self::InvalidParameters(_)
            | Self::DuplicateSessionKey(_) => StatusCode::BAD_REQUEST,
            Self::UnknownSession(_) => StatusCode::NOT_FOUND,
            Self::SessionTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::TransportFailure(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": { "code": self.code(), "message": self.to_string() }
        });
        (self.status(), Json(body)).into_response()
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;
