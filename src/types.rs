use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tabled::Tabled;

/// Credential pair as returned by the provider's token endpoint.
#[derive(Clone, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    /// Only present when the provider rotated the refresh credential.
    pub refresh_token: Option<String>,
    pub scope: String,
    pub expires_in: u64,
    pub obtained_at: u64,
}

impl Token {
    /// Remote expiry of the access credential.
    pub fn expires_at(&self) -> DateTime<Utc> {
        let at = self.obtained_at.saturating_add(self.expires_in);
        DateTime::<Utc>::from_timestamp(at as i64, 0).unwrap_or_else(Utc::now)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("scope", &self.scope)
            .field("expires_in", &self.expires_in)
            .field("obtained_at", &self.obtained_at)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    pub expires_in: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// A login started through `/login` or `listenlink auth`, waiting for its callback.
#[derive(Debug, Clone)]
pub struct PendingLogin {
    pub user_id: String,
    pub code_verifier: String,
    pub created_at: DateTime<Utc>,
}

/// Per-user provider session record.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserSession {
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    #[serde(default)]
    pub active_device_id: Option<String>,
}

impl UserSession {
    pub fn from_token(user_id: &str, token: &Token) -> Option<Self> {
        Some(Self {
            user_id: user_id.to_string(),
            access_token: token.access_token.clone(),
            refresh_token: token.refresh_token.clone()?,
            access_expires_at: token.expires_at(),
            active_device_id: None,
        })
    }
}

impl fmt::Debug for UserSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserSession")
            .field("user_id", &self.user_id)
            .field("access_expires_at", &self.access_expires_at)
            .field("active_device_id", &self.active_device_id)
            .finish_non_exhaustive()
    }
}

#[derive(Tabled)]
pub struct SessionTableRow {
    pub user: String,
    pub expires: String,
    pub device: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Device {
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_restricted: bool,
    #[serde(default)]
    pub volume_percent: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevicesResponse {
    pub devices: Vec<Device>,
}

#[derive(Tabled)]
pub struct DeviceTableRow {
    pub name: String,
    pub kind: String,
    pub id: String,
    pub active: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferPlaybackRequest {
    pub device_ids: Vec<String>,
    pub play: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartPlaybackRequest {
    pub uris: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderErrorResponse {
    pub error: ProviderErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderErrorDetail {
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Error body of every failing backend route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenBody {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferBody {
    pub device_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayBody {
    pub device_id: String,
    pub track_uri: String,
}

/// Point-in-time readout of the remote player, replaced wholesale on every push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackSnapshot {
    pub track_id: String,
    pub track_uri: String,
    pub position_ms: u64,
    pub duration_ms: u64,
    pub is_playing: bool,
    pub taken_at: DateTime<Utc>,
}

impl PlaybackSnapshot {
    /// Equal in everything but `taken_at`.
    pub fn same_playback(&self, other: &PlaybackSnapshot) -> bool {
        self.track_id == other.track_id
            && self.track_uri == other.track_uri
            && self.position_ms == other.position_ms
            && self.duration_ms == other.duration_ms
            && self.is_playing == other.is_playing
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionEvent {
    pub track_id: String,
}

/// A share the UI knows about, as far as listen tracking is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedTrack {
    pub share_id: String,
    /// Track URI or open.spotify.com link, exactly as it was shared.
    pub track_ref: String,
}
