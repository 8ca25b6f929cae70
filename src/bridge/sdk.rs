//! Seam between the bridge and the provider's playback SDK.
//!
//! The SDK pushes loosely-typed state objects; they are mapped into a
//! [`PlaybackSnapshot`] here, before anything else in the bridge sees them.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::{types::PlaybackSnapshot, utils};

/// Events the SDK delivers to the bridge, in delivery order.
#[derive(Debug, Clone, PartialEq)]
pub enum SdkEvent {
    /// The player is registered with the provider under `device_id`.
    Ready { device_id: String },
    /// The provider dropped the device.
    NotReady { device_id: String },
    /// New playback state; `None` when the device is no longer the active one.
    StateChanged(Option<Value>),
    InitializationError(String),
    AuthenticationError(String),
    /// Raised by the SDK for accounts without the required subscription tier.
    AccountError(String),
    PlaybackError(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SdkError {
    #[error("playback SDK failed to load: {0}")]
    Load(String),
    #[error("player initialization failed: {0}")]
    Initialization(String),
    #[error("malformed player state: {0}")]
    MalformedState(String),
}

/// The playback SDK as the bridge drives it.
///
/// Transport controls are fire-and-forget, as in the SDK itself; results come
/// back as [`SdkEvent`]s.
pub trait PlaybackSdk: Send {
    /// Loads the SDK script. Called once, from `Loading`.
    fn load(&mut self) -> Result<(), SdkError>;

    /// Creates the player object and connects it. Called once, from `Initializing`.
    fn create_player(&mut self, name: &str, volume: f32) -> Result<(), SdkError>;

    /// Latest state known to the SDK, without waiting for a push.
    fn current_state(&mut self) -> Option<Value>;

    fn toggle_play(&mut self);

    fn next_track(&mut self);

    fn previous_track(&mut self);

    /// `volume` is within `0.0..=1.0`.
    fn set_volume(&mut self, volume: f32);

    fn disconnect(&mut self);
}

#[derive(Debug, Deserialize)]
struct RawPlayerState {
    paused: bool,
    position: f64,
    duration: f64,
    track_window: RawTrackWindow,
}

#[derive(Debug, Deserialize)]
struct RawTrackWindow {
    current_track: Option<RawTrack>,
}

#[derive(Debug, Deserialize)]
struct RawTrack {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    linked_from: Option<RawLinkedTrack>,
}

#[derive(Debug, Deserialize)]
struct RawLinkedTrack {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    uri: Option<String>,
}

fn valid_id(id: Option<&String>) -> Option<String> {
    id.filter(|id| utils::is_track_id(id)).cloned()
}

/// Maps a raw SDK state object into a snapshot taken at `taken_at`.
///
/// For relinked tracks the originally requested track wins, since that is the
/// id shares refer to.
pub fn snapshot_from_sdk(raw: &Value, taken_at: DateTime<Utc>) -> Result<PlaybackSnapshot, SdkError> {
    let state: RawPlayerState = serde_json::from_value(raw.clone())
        .map_err(|e| SdkError::MalformedState(e.to_string()))?;

    let track = state
        .track_window
        .current_track
        .ok_or_else(|| SdkError::MalformedState("no current track".to_string()))?;

    let linked = track.linked_from.as_ref();
    let track_id = linked
        .and_then(|l| valid_id(l.id.as_ref()))
        .or_else(|| valid_id(track.id.as_ref()))
        .or_else(|| {
            track
                .uri
                .as_deref()
                .and_then(utils::track_id_from_reference)
        })
        .ok_or_else(|| SdkError::MalformedState("current track has no track id".to_string()))?;

    let track_uri = linked
        .and_then(|l| l.uri.clone())
        .filter(|uri| utils::validate_track_uri(uri).is_ok())
        .unwrap_or_else(|| utils::track_uri(&track_id));

    if !state.position.is_finite() || !state.duration.is_finite() {
        return Err(SdkError::MalformedState(
            "position or duration is not a number".to_string(),
        ));
    }

    Ok(PlaybackSnapshot {
        track_id,
        track_uri,
        position_ms: state.position.max(0.0) as u64,
        duration_ms: state.duration.max(0.0) as u64,
        is_playing: !state.paused,
        taken_at,
    })
}
