//! Error types for listenlink.
//!
//! Every failure that leaves the token manager or the playback client is
//! classified into one of these variants. Callers decide on retries; the
//! library never retries transient failures on its own.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Main error type for listenlink.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The refresh credential was rejected; the user has to connect again.
    #[error("Session expired: {0}")]
    SessionExpired(String),

    /// Transient provider or network failure. Safe to retry.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The provider has no active playback target for the user.
    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Malformed identifiers or payloads, rejected before any network call.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The provider account tier does not allow the operation.
    #[error("Insufficient entitlement: {0}")]
    InsufficientEntitlement(String),

    /// No provider session is stored for the user.
    #[error("No provider session for user {0}")]
    NotConnected(String),

    /// Session store failures
    #[error("Storage error: {0}")]
    Storage(String),

    /// Missing or malformed configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenience Result type using the listenlink Error
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Only transient upstream failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::UpstreamUnavailable(_))
    }

    /// Stable machine-readable kind, used in HTTP error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::SessionExpired(_) => "session_expired",
            Error::UpstreamUnavailable(_) => "upstream_unavailable",
            Error::DeviceUnavailable(_) => "device_unavailable",
            Error::InvalidRequest(_) => "invalid_request",
            Error::InsufficientEntitlement(_) => "insufficient_entitlement",
            Error::NotConnected(_) => "not_connected",
            Error::Storage(_) => "storage",
            Error::Config(_) => "config",
        }
    }

    /// Inverse of [`kind`](Self::kind), for clients reading backend error bodies.
    /// Unknown kinds are treated as upstream failures.
    pub fn from_kind(kind: &str, message: String) -> Self {
        match kind {
            "session_expired" => Error::SessionExpired(message),
            "device_unavailable" => Error::DeviceUnavailable(message),
            "invalid_request" => Error::InvalidRequest(message),
            "insufficient_entitlement" => Error::InsufficientEntitlement(message),
            "not_connected" => Error::NotConnected(message),
            "storage" => Error::Storage(message),
            "config" => Error::Config(message),
            _ => Error::UpstreamUnavailable(message),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::SessionExpired(_) | Error::NotConnected(_) => StatusCode::UNAUTHORIZED,
            Error::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::DeviceUnavailable(_) => StatusCode::NOT_FOUND,
            Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Error::InsufficientEntitlement(_) => StatusCode::FORBIDDEN,
            Error::Storage(_) | Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(kind = self.kind(), error = %self, "request failed");
        } else {
            tracing::debug!(kind = self.kind(), error = %self, "request rejected");
        }

        let body = Json(json!({
            "error": self.kind(),
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}
