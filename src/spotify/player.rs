//! Remote control of the user's devices through the provider's Web API.
//!
//! Two layers live here:
//!
//! - [`PlaybackApi`] is the raw HTTP seam. It takes an access credential and
//!   returns a classified [`ProviderError`]; it knows nothing about users.
//! - [`PlaybackClient`] acts for an application user. It obtains credentials
//!   from the [`TokenManager`], validates identifiers before any network call,
//!   retries once on a rejected credential and persists the active device.
//!
//! ```text
//! PlaybackClient::transfer(user, device)
//!     ├── validate_device_id
//!     ├── with_auth_retry ── get_valid_token ── PlaybackApi::transfer
//!     │        └── 401 ── force_refresh ── PlaybackApi::transfer (last try)
//!     └── SessionStore::set_active_device
//! ```

use std::{future::Future, sync::Arc};

use async_trait::async_trait;
use reqwest::Client;

use crate::{
    config::Settings,
    error::{Error, Result},
    management::TokenManager,
    spotify::{self, ProviderError},
    types::{Device, DevicesResponse, StartPlaybackRequest, TransferPlaybackRequest},
    utils,
};

/// Remote-control endpoints of the provider's Web API.
#[async_trait]
pub trait PlaybackApi: Send + Sync {
    /// `PUT /me/player`: moves playback to `device_id` without starting it.
    async fn transfer(
        &self,
        access_token: &str,
        device_id: &str,
    ) -> std::result::Result<(), ProviderError>;

    /// `PUT /me/player/play?device_id=…`: starts `track_uri` on `device_id`.
    async fn play(
        &self,
        access_token: &str,
        device_id: &str,
        track_uri: &str,
    ) -> std::result::Result<(), ProviderError>;

    /// `GET /me/player/devices`
    async fn devices(&self, access_token: &str) -> std::result::Result<Vec<Device>, ProviderError>;
}

/// [`PlaybackApi`] over HTTP with the configured provider timeout.
///
/// Every call sends the credential as a bearer token. Non-success responses
/// are read once and classified with [`spotify::classify`].
#[derive(Clone)]
pub struct SpotifyPlayerApi {
    client: Client,
    api_url: String,
}

impl SpotifyPlayerApi {
    pub fn new(settings: &Settings) -> Result<Self> {
        Ok(Self {
            client: spotify::http_client(settings.provider_timeout)?,
            api_url: settings.api_url.clone(),
        })
    }

    async fn expect_success(
        response: std::result::Result<reqwest::Response, reqwest::Error>,
    ) -> std::result::Result<reqwest::Response, ProviderError> {
        let response = response.map_err(spotify::classify_send_error)?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(spotify::classify_response(response).await)
        }
    }
}

#[async_trait]
impl PlaybackApi for SpotifyPlayerApi {
    async fn transfer(
        &self,
        access_token: &str,
        device_id: &str,
    ) -> std::result::Result<(), ProviderError> {
        let body = TransferPlaybackRequest {
            device_ids: vec![device_id.to_string()],
            play: false,
        };
        let response = self
            .client
            .put(format!("{}/me/player", self.api_url))
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await;

        Self::expect_success(response).await.map(|_| ())
    }

    async fn play(
        &self,
        access_token: &str,
        device_id: &str,
        track_uri: &str,
    ) -> std::result::Result<(), ProviderError> {
        let body = StartPlaybackRequest {
            uris: vec![track_uri.to_string()],
        };
        let response = self
            .client
            .put(format!("{}/me/player/play", self.api_url))
            .query(&[("device_id", device_id)])
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await;

        Self::expect_success(response).await.map(|_| ())
    }

    async fn devices(&self, access_token: &str) -> std::result::Result<Vec<Device>, ProviderError> {
        let response = self
            .client
            .get(format!("{}/me/player/devices", self.api_url))
            .bearer_auth(access_token)
            .send()
            .await;

        let response = Self::expect_success(response).await?;
        let json = response.json::<DevicesResponse>().await.map_err(|e| {
            ProviderError::Unavailable(format!("malformed devices response: {}", e))
        })?;
        Ok(json.devices)
    }
}

/// Runs `call` with a valid credential and, if the provider rejects that
/// credential, refreshes once and runs it a second time. Never more.
///
/// # Arguments
///
/// * `tokens` - Source of the credential and of the forced refresh
/// * `user_id` - Application user the call is made for
/// * `call` - The provider call, given the access credential to use
///
/// # Errors
///
/// - any error of [`TokenManager::get_valid_token`] or
///   [`TokenManager::force_refresh`]
/// - the classified error of the last attempt, converted into [`Error`]
pub async fn with_auth_retry<T, F, Fut>(
    tokens: &TokenManager,
    user_id: &str,
    mut call: F,
) -> Result<T>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = std::result::Result<T, ProviderError>>,
{
    let token = tokens.get_valid_token(user_id).await?;
    match call(token.clone()).await {
        Ok(value) => Ok(value),
        Err(ProviderError::CredentialRejected(msg)) => {
            tracing::info!(user_id, reason = %msg, "credential rejected, refreshing once");
            let fresh = tokens.force_refresh(user_id, &token).await?;
            call(fresh).await.map_err(Error::from)
        }
        Err(e) => Err(e.into()),
    }
}

/// Device Playback Client: remote-control operations on behalf of a user.
///
/// Cheap to share: both collaborators are behind `Arc`s, and the server keeps
/// one instance for all requests.
pub struct PlaybackClient {
    tokens: Arc<TokenManager>,
    api: Arc<dyn PlaybackApi>,
}

impl PlaybackClient {
    pub fn new(tokens: Arc<TokenManager>, api: Arc<dyn PlaybackApi>) -> Self {
        Self { tokens, api }
    }

    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    /// Transfers the user's playback to `device_id` and remembers it as the
    /// active device.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidRequest` for a malformed device id (no network call)
    /// - `Error::DeviceUnavailable` if the provider does not know the device;
    ///   the stored active device is left untouched
    /// - any error of [`TokenManager::get_valid_token`]
    pub async fn transfer(&self, user_id: &str, device_id: &str) -> Result<()> {
        utils::validate_device_id(device_id)?;

        let api = &self.api;
        with_auth_retry(&self.tokens, user_id, |token| async move {
            api.transfer(&token, device_id).await
        })
        .await?;

        self.tokens
            .store()
            .set_active_device(user_id, Some(device_id))
            .await?;
        tracing::info!(user_id, device_id, "playback transferred");
        Ok(())
    }

    /// Starts `track_uri` on `device_id`.
    ///
    /// `track_uri` must be a `spotify:track:<id>` URI; anything else fails with
    /// `Error::InvalidRequest` before the provider is contacted.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidRequest` for a malformed device id or track URI
    /// - `Error::DeviceUnavailable` if the device is gone
    /// - `Error::InsufficientEntitlement` if the account tier cannot play on demand
    /// - any error of [`TokenManager::get_valid_token`]
    pub async fn play(&self, user_id: &str, device_id: &str, track_uri: &str) -> Result<()> {
        utils::validate_device_id(device_id)?;
        utils::validate_track_uri(track_uri)?;

        let api = &self.api;
        with_auth_retry(&self.tokens, user_id, |token| async move {
            api.play(&token, device_id, track_uri).await
        })
        .await?;

        tracing::info!(user_id, device_id, track_uri, "playback started");
        Ok(())
    }

    /// Devices the provider currently knows for the user, active one included.
    ///
    /// Same credential and retry rules as [`transfer`](Self::transfer).
    pub async fn devices(&self, user_id: &str) -> Result<Vec<Device>> {
        let api = &self.api;
        with_auth_retry(&self.tokens, user_id, |token| async move {
            api.devices(&token).await
        })
        .await
    }
}
