//! HTTP client the browser side uses to reach the listenlink backend.
//!
//! The bridge never sees provider credentials other than the short-lived
//! access token it hands to the SDK. Everything else goes through the backend
//! routes, identified by the [`USER_HEADER`] of the acting user:
//!
//! | Call                          | Route                                 |
//! |-------------------------------|---------------------------------------|
//! | [`BackendClient::access_token`] | `GET /api/spotify/token`            |
//! | [`BackendClient::transfer`]   | `PUT /api/spotify/transfer`           |
//! | `ListenWriter::record_listen` | `POST /api/shares/{share_id}/listens` |
//!
//! Error bodies of the backend carry the error kind, which is mapped back into
//! the matching [`Error`] variant.

use async_trait::async_trait;
use reqwest::{Client, Response, Url};

use crate::{
    api::USER_HEADER,
    bridge::{DeviceTransfer, listen::ListenWriter},
    config::Settings,
    error::{Error, Result},
    spotify,
    types::{AccessTokenBody, ErrorBody, TransferBody},
};

/// The bridge's view of the listenlink backend, acting for one user.
///
/// Clones share the underlying connection pool.
#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
    user_id: String,
}

impl BackendClient {
    /// Creates a client for `user_id` against `settings.backend_url`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the HTTP client cannot be built.
    pub fn new(settings: &Settings, user_id: &str) -> Result<Self> {
        Ok(Self {
            client: spotify::http_client(settings.provider_timeout)?,
            base_url: settings.backend_url.clone(),
            user_id: user_id.to_string(),
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Fresh access credential for the SDK's token callback.
    ///
    /// # Errors
    ///
    /// - `Error::NotConnected` or `Error::SessionExpired` when the user has to
    ///   connect the account (again)
    /// - `Error::UpstreamUnavailable` if the backend is unreachable or answers
    ///   with something unexpected
    pub async fn access_token(&self) -> Result<AccessTokenBody> {
        let response = self
            .client
            .get(format!("{}/api/spotify/token", self.base_url))
            .header(USER_HEADER, &self.user_id)
            .send()
            .await
            .map_err(unreachable_backend)?;

        let response = expect_success(response).await?;
        response
            .json::<AccessTokenBody>()
            .await
            .map_err(|e| Error::UpstreamUnavailable(format!("malformed token response: {}", e)))
    }

    /// Asks the backend to move the user's playback to `device_id`.
    pub async fn transfer(&self, device_id: &str) -> Result<()> {
        let response = self
            .client
            .put(format!("{}/api/spotify/transfer", self.base_url))
            .header(USER_HEADER, &self.user_id)
            .json(&TransferBody {
                device_id: device_id.to_string(),
            })
            .send()
            .await
            .map_err(unreachable_backend)?;

        expect_success(response).await.map(|_| ())
    }

    /// `{base}/api/shares/{share_id}/listens`, with `share_id` escaped as a
    /// single path segment.
    fn listens_url(&self, share_id: &str) -> Result<Url> {
        if share_id.is_empty() || share_id == "." || share_id == ".." {
            return Err(Error::InvalidRequest(format!(
                "invalid share id {:?}",
                share_id
            )));
        }

        let mut url = Url::parse(&self.base_url)
            .map_err(|e| Error::Config(format!("invalid backend URL {}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("backend URL {} cannot have a path", self.base_url)))?
            .pop_if_empty()
            .extend(["api", "shares", share_id, "listens"]);
        Ok(url)
    }
}

impl DeviceTransfer for BackendClient {
    /// Fire-and-forget: a failed transfer is logged and the player stays connected.
    fn request_transfer(&self, device_id: &str) {
        let client = self.clone();
        let device_id = device_id.to_string();
        tokio::spawn(async move {
            match client.transfer(&device_id).await {
                Ok(()) => tracing::debug!(device_id = %device_id, "playback transfer requested"),
                Err(e) => tracing::warn!(device_id = %device_id, error = %e, "playback transfer failed"),
            }
        });
    }
}

#[async_trait]
impl ListenWriter for BackendClient {
    async fn record_listen(&self, share_id: &str) -> Result<()> {
        let response = self
            .client
            .post(self.listens_url(share_id)?)
            .header(USER_HEADER, &self.user_id)
            .send()
            .await
            .map_err(unreachable_backend)?;

        expect_success(response).await.map(|_| ())
    }
}

fn unreachable_backend(err: reqwest::Error) -> Error {
    Error::UpstreamUnavailable(format!("backend unreachable: {}", err))
}

async fn expect_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => Err(Error::from_kind(&body.error, body.message)),
        Err(_) => Err(Error::UpstreamUnavailable(format!(
            "backend returned {}: {}",
            status, text
        ))),
    }
}
