//! Accounts service of the provider: the authorization URL users are sent to,
//! the PKCE code exchange that finishes a login, and the refresh exchange the
//! token manager relies on.
//!
//! ## Flow
//!
//! ```text
//! begin_login ──► authorize_url ──► provider consent page
//!                                        │
//! callback ◄── ?code=…&state=… ◄─────────┘
//!    │
//!    └─► exchange_code_pkce ──► TokenManager::connect
//!
//! TokenManager::get_valid_token ──► refresh (when inside the buffer)
//! ```
//!
//! Token endpoint failures are classified by [`classify_token_error`]; the
//! accounts service reports them in the RFC 6749 shape, not the Web API one.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, RequestBuilder, StatusCode, Url};

use crate::{
    config::Settings,
    error::{Error, Result},
    spotify::{self, ProviderError},
    types::{Token, TokenErrorResponse, TokenResponse},
};

/// The provider's token-refresh endpoint, as seen by the token manager.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Exchanges a refresh credential for a fresh access credential.
    ///
    /// # Errors
    ///
    /// - `Error::SessionExpired` when the provider rejects the refresh credential
    /// - `Error::UpstreamUnavailable` on timeouts, connection failures and 5xx/429
    async fn refresh(&self, refresh_token: &str) -> Result<Token>;
}

/// Client for the provider's accounts service (authorize + token endpoints).
///
/// Built once from [`Settings`] and shared behind an `Arc`. When a client
/// secret is configured the token endpoint is called with HTTP basic client
/// authentication, otherwise as a public PKCE client.
#[derive(Clone)]
pub struct SpotifyAccounts {
    client: Client,
    auth_url: String,
    token_url: String,
    client_id: String,
    client_secret: Option<String>,
    redirect_uri: String,
    scope: String,
}

impl SpotifyAccounts {
    /// Creates the client from the resolved settings.
    ///
    /// # Arguments
    ///
    /// * `settings` - Provider URLs, client credentials, redirect URI, scope and
    ///   the request timeout
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the HTTP client cannot be built.
    pub fn new(settings: &Settings) -> Result<Self> {
        Ok(Self {
            client: spotify::http_client(settings.provider_timeout)?,
            auth_url: settings.auth_url.clone(),
            token_url: settings.token_url.clone(),
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            redirect_uri: settings.redirect_uri.clone(),
            scope: settings.scope.clone(),
        })
    }

    /// Builds the authorization URL for an OAuth 2.0 PKCE flow.
    ///
    /// The user is sent here to grant access; the provider redirects back to the
    /// configured redirect URI with `code` and the same `state`.
    ///
    /// # Arguments
    ///
    /// * `code_challenge` - Base64url SHA-256 of the verifier kept for the callback
    /// * `state` - Opaque value tying the callback to the pending login
    ///
    /// # Returns
    ///
    /// The full authorization URL with every parameter encoded.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the configured authorize URL does not parse.
    pub fn authorize_url(&self, code_challenge: &str, state: &str) -> Result<String> {
        let url = Url::parse_with_params(
            &self.auth_url,
            &[
                ("client_id", self.client_id.as_str()),
                ("response_type", "code"),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("code_challenge_method", "S256"),
                ("code_challenge", code_challenge),
                ("scope", self.scope.as_str()),
                ("state", state),
            ],
        )
        .map_err(|e| Error::Config(format!("invalid authorize URL: {}", e)))?;
        Ok(url.to_string())
    }

    /// Exchanges an authorization code for a token using the PKCE verifier.
    ///
    /// The verifier proves that the client finishing the flow is the one that
    /// started it. Authorization codes are single use and expire quickly, so the
    /// exchange has to happen right after the callback.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidRequest` if the code was rejected or the response carries
    ///   no refresh credential
    /// - `Error::UpstreamUnavailable` on transient failures
    pub async fn exchange_code_pkce(&self, code: &str, verifier: &str) -> Result<Token> {
        let request = self.token_request().form(&[
            ("grant_type", "authorization_code"),
            ("client_id", self.client_id.as_str()),
            ("code", code),
            ("code_verifier", verifier),
            ("redirect_uri", self.redirect_uri.as_str()),
        ]);

        let token = match self.send_token_request(request).await {
            Ok(token) => token,
            Err(Error::SessionExpired(msg)) => {
                return Err(Error::InvalidRequest(format!(
                    "authorization code rejected: {}",
                    msg
                )));
            }
            Err(e) => return Err(e),
        };

        if token.refresh_token.is_none() {
            return Err(Error::InvalidRequest(
                "token response carried no refresh credential".to_string(),
            ));
        }
        Ok(token)
    }

    /// POST to the token endpoint, with client authentication when configured.
    fn token_request(&self) -> RequestBuilder {
        let request = self.client.post(&self.token_url);
        match &self.client_secret {
            Some(secret) => request.basic_auth(&self.client_id, Some(secret)),
            None => request,
        }
    }

    /// Sends a token request and maps the response into a [`Token`].
    ///
    /// An empty `refresh_token` in the response is treated as absent, so the
    /// stored refresh credential is kept.
    async fn send_token_request(&self, request: RequestBuilder) -> Result<Token> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::from(spotify::classify_send_error(e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_token_error(status, &body));
        }

        let json: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::UpstreamUnavailable(format!("malformed token response: {}", e)))?;

        Ok(Token {
            access_token: json.access_token,
            refresh_token: json.refresh_token.filter(|t| !t.is_empty()),
            scope: json.scope.unwrap_or_default(),
            expires_in: json.expires_in,
            obtained_at: Utc::now().timestamp() as u64,
        })
    }
}

#[async_trait]
impl TokenEndpoint for SpotifyAccounts {
    async fn refresh(&self, refresh_token: &str) -> Result<Token> {
        let request = self.token_request().form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
        ]);
        self.send_token_request(request).await
    }
}

/// Token endpoint errors follow RFC 6749 (`{"error": "invalid_grant", ...}`).
///
/// | Response                                   | `Error`               |
/// |--------------------------------------------|-----------------------|
/// | 429 or 5xx                                 | `UpstreamUnavailable` |
/// | `invalid_client`, `unauthorized_client`    | `Config`              |
/// | any other 4xx (`invalid_grant`, ...)       | `SessionExpired`      |
///
/// # Arguments
///
/// * `status` - Status of the token response
/// * `body` - Raw response body, possibly empty or not JSON
pub fn classify_token_error(status: StatusCode, body: &str) -> Error {
    let parsed = serde_json::from_str::<TokenErrorResponse>(body).ok();
    let description = parsed
        .as_ref()
        .map(|p| match &p.error_description {
            Some(d) => format!("{}: {}", p.error, d),
            None => p.error.clone(),
        })
        .unwrap_or_else(|| status.to_string());

    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        return Error::from(ProviderError::Unavailable(description));
    }

    match parsed.as_ref().map(|p| p.error.as_str()) {
        Some("invalid_client") | Some("unauthorized_client") => {
            Error::Config(format!("client rejected by token endpoint: {}", description))
        }
        _ => Error::SessionExpired(description),
    }
}
