//! # Spotify Integration Module
//!
//! HTTP boundary to the streaming provider. Everything that talks to the
//! accounts service or the Web API lives here, and every provider response is
//! classified exactly once, in this module, into a [`ProviderError`].
//!
//! ```text
//! TokenManager / PlaybackClient
//!          ↓
//! Spotify Integration Layer
//!     ├── auth    (authorize URL, code exchange, refresh)
//!     └── player  (transfer, play, devices)
//!          ↓
//! HTTP Layer (reqwest, bounded timeout)
//! ```
//!
//! ## Error classification
//!
//! | Provider response                 | `ProviderError`      |
//! |-----------------------------------|----------------------|
//! | 401                               | `CredentialRejected` |
//! | 403                               | `Entitlement`        |
//! | 404 (e.g. `NO_ACTIVE_DEVICE`)     | `NoActiveDevice`     |
//! | 429, 5xx, timeout, connect error  | `Unavailable`        |
//! | any other 4xx                     | `Rejected`           |

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};

use crate::{
    error::{Error, Result},
    types::ProviderErrorResponse,
};

pub mod auth;
pub mod player;

/// Classified outcome of a failed provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The bearer credential was rejected (expired or revoked).
    CredentialRejected(String),
    /// No active device, or the targeted device is gone.
    NoActiveDevice(String),
    /// The account tier does not permit the operation.
    Entitlement(String),
    /// The provider refused the request as malformed.
    Rejected(String),
    /// Timeout, connection failure, rate limiting or a provider-side error.
    Unavailable(String),
}

impl From<ProviderError> for Error {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::CredentialRejected(msg) => Error::SessionExpired(msg),
            ProviderError::NoActiveDevice(msg) => Error::DeviceUnavailable(msg),
            ProviderError::Entitlement(msg) => Error::InsufficientEntitlement(msg),
            ProviderError::Rejected(msg) => Error::InvalidRequest(msg),
            ProviderError::Unavailable(msg) => Error::UpstreamUnavailable(msg),
        }
    }
}

/// Builds the shared HTTP client with the provider timeout applied to every request.
pub fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .build()
        .map_err(|e| Error::Config(format!("cannot build HTTP client: {}", e)))
}

/// Maps transport-level failures. None of them say anything about the credential.
pub fn classify_send_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Unavailable(format!("provider timed out: {}", err))
    } else {
        ProviderError::Unavailable(format!("provider unreachable: {}", err))
    }
}

/// Reads the body of a non-success response and classifies it.
pub async fn classify_response(response: Response) -> ProviderError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    classify(status, &body)
}

/// Classifies a provider status code and its (possibly empty) error body.
pub fn classify(status: StatusCode, body: &str) -> ProviderError {
    let (message, reason) = match serde_json::from_str::<ProviderErrorResponse>(body) {
        Ok(parsed) => (parsed.error.message, parsed.error.reason),
        Err(_) => (body.trim().to_string(), None),
    };
    let message = if message.is_empty() {
        status.to_string()
    } else {
        message
    };

    match status {
        StatusCode::UNAUTHORIZED => ProviderError::CredentialRejected(message),
        StatusCode::FORBIDDEN => ProviderError::Entitlement(message),
        StatusCode::NOT_FOUND => ProviderError::NoActiveDevice(message),
        StatusCode::TOO_MANY_REQUESTS => {
            ProviderError::Unavailable(format!("rate limited: {}", message))
        }
        s if s.is_server_error() => ProviderError::Unavailable(message),
        _ => match reason.as_deref() {
            Some("NO_ACTIVE_DEVICE") => ProviderError::NoActiveDevice(message),
            Some("PREMIUM_REQUIRED") => ProviderError::Entitlement(message),
            _ => ProviderError::Rejected(message),
        },
    }
}
