//! Shared fakes for the integration tests.
#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};

use listenlink::{
    bridge::{
        DeviceTransfer,
        listen::ListenWriter,
        sdk::{PlaybackSdk, SdkError},
    },
    error::{Error, Result},
    management::{MemorySessionStore, SessionStore, TokenManager},
    spotify::{ProviderError, auth::TokenEndpoint, player::PlaybackApi},
    types::{Device, Token, UserSession},
};

pub const USER: &str = "alice";
pub const DEVICE: &str = "device-1";
pub const TRACK_A: &str = "4uLU6hMCjMI75M1A2tKUQC";
pub const TRACK_B: &str = "7GhIk7Il098yCjg4BQjzvb";

/// Session whose access credential expires `expires_in_secs` from now.
pub fn session(access: &str, refresh: &str, expires_in_secs: i64) -> UserSession {
    UserSession {
        user_id: USER.to_string(),
        access_token: access.to_string(),
        refresh_token: refresh.to_string(),
        access_expires_at: Utc::now() + chrono::Duration::seconds(expires_in_secs),
        active_device_id: None,
    }
}

pub fn token(access: &str, refresh: Option<&str>, expires_in: u64) -> Token {
    Token {
        access_token: access.to_string(),
        refresh_token: refresh.map(str::to_string),
        scope: "streaming".to_string(),
        expires_in,
        obtained_at: Utc::now().timestamp() as u64,
    }
}

/// Token endpoint answering every refresh with the same scripted result.
pub struct FakeTokenEndpoint {
    response: Mutex<Result<Token>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl FakeTokenEndpoint {
    pub fn returning(response: Result<Token>) -> Arc<Self> {
        Arc::new(Self {
            response: Mutex::new(response),
            delay: None,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn slow(response: Result<Token>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            response: Mutex::new(response),
            delay: Some(delay),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Refresh credentials presented so far.
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl TokenEndpoint for FakeTokenEndpoint {
    async fn refresh(&self, refresh_token: &str) -> Result<Token> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(refresh_token.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let response = self.response.lock().unwrap().clone();
        response.map(|mut token| {
            token.obtained_at = Utc::now().timestamp() as u64;
            token
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiCall {
    pub op: &'static str,
    pub token: String,
    pub device_id: Option<String>,
    pub track_uri: Option<String>,
}

/// Playback API popping one scripted result per call; `Ok` once the script runs out.
#[derive(Default)]
pub struct FakePlaybackApi {
    script: Mutex<VecDeque<std::result::Result<(), ProviderError>>>,
    devices: Mutex<Vec<Device>>,
    calls: Mutex<Vec<ApiCall>>,
}

impl FakePlaybackApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn scripted(
        script: impl IntoIterator<Item = std::result::Result<(), ProviderError>>,
    ) -> Arc<Self> {
        let api = Self::default();
        *api.script.lock().unwrap() = script.into_iter().collect();
        Arc::new(api)
    }

    pub fn set_devices(&self, devices: Vec<Device>) {
        *self.devices.lock().unwrap() = devices;
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(
        &self,
        op: &'static str,
        token: &str,
        device_id: Option<&str>,
        track_uri: Option<&str>,
    ) -> std::result::Result<(), ProviderError> {
        self.calls.lock().unwrap().push(ApiCall {
            op,
            token: token.to_string(),
            device_id: device_id.map(str::to_string),
            track_uri: track_uri.map(str::to_string),
        });
        self.script.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}

#[async_trait]
impl PlaybackApi for FakePlaybackApi {
    async fn transfer(
        &self,
        access_token: &str,
        device_id: &str,
    ) -> std::result::Result<(), ProviderError> {
        self.record("transfer", access_token, Some(device_id), None)
    }

    async fn play(
        &self,
        access_token: &str,
        device_id: &str,
        track_uri: &str,
    ) -> std::result::Result<(), ProviderError> {
        self.record("play", access_token, Some(device_id), Some(track_uri))
    }

    async fn devices(&self, access_token: &str) -> std::result::Result<Vec<Device>, ProviderError> {
        self.record("devices", access_token, None, None)?;
        Ok(self.devices.lock().unwrap().clone())
    }
}

pub struct Harness {
    pub store: Arc<MemorySessionStore>,
    pub endpoint: Arc<FakeTokenEndpoint>,
    pub tokens: Arc<TokenManager>,
}

/// Token manager over an in-memory store seeded with `session`, using a 5 minute buffer.
pub fn harness(session: Option<UserSession>, endpoint: Arc<FakeTokenEndpoint>) -> Harness {
    let store = Arc::new(MemorySessionStore::with_sessions(session));
    let tokens = Arc::new(TokenManager::new(
        store.clone() as Arc<dyn SessionStore>,
        endpoint.clone(),
        chrono::Duration::minutes(5),
    ));
    Harness {
        store,
        endpoint,
        tokens,
    }
}

pub fn refresh_fails_with(error: Error) -> Arc<FakeTokenEndpoint> {
    FakeTokenEndpoint::returning(Err(error))
}

/// Raw state object as the browser SDK pushes it.
pub fn sdk_state(track_id: &str, position: u64, duration: u64, paused: bool) -> Value {
    json!({
        "paused": paused,
        "position": position,
        "duration": duration,
        "track_window": {
            "current_track": {
                "id": track_id,
                "uri": format!("spotify:track:{}", track_id),
                "name": "Some Track"
            },
            "previous_tracks": [],
            "next_tracks": []
        }
    })
}

/// SDK double recording every call; shared so tests can inspect it after the
/// bridge took ownership.
#[derive(Clone, Default)]
pub struct FakeSdk {
    pub calls: Arc<Mutex<Vec<String>>>,
    pub current: Arc<Mutex<Option<Value>>>,
    pub fail_load: bool,
    pub fail_create: bool,
}

impl FakeSdk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn set_current(&self, state: Option<Value>) {
        *self.current.lock().unwrap() = state;
    }

    fn push(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

impl PlaybackSdk for FakeSdk {
    fn load(&mut self) -> std::result::Result<(), SdkError> {
        self.push("load");
        if self.fail_load {
            return Err(SdkError::Load("script blocked".to_string()));
        }
        Ok(())
    }

    fn create_player(&mut self, name: &str, volume: f32) -> std::result::Result<(), SdkError> {
        self.push(format!("create:{}:{}", name, volume));
        if self.fail_create {
            return Err(SdkError::Initialization("no web playback".to_string()));
        }
        Ok(())
    }

    fn current_state(&mut self) -> Option<Value> {
        self.current.lock().unwrap().clone()
    }

    fn toggle_play(&mut self) {
        self.push("toggle");
    }

    fn next_track(&mut self) {
        self.push("next");
    }

    fn previous_track(&mut self) {
        self.push("previous");
    }

    fn set_volume(&mut self, volume: f32) {
        self.push(format!("volume:{}", volume));
    }

    fn disconnect(&mut self) {
        self.push("disconnect");
    }
}

#[derive(Default)]
pub struct RecordingTransfer {
    pub requests: Mutex<Vec<String>>,
}

impl RecordingTransfer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl DeviceTransfer for RecordingTransfer {
    fn request_transfer(&self, device_id: &str) {
        self.requests.lock().unwrap().push(device_id.to_string());
    }
}

#[derive(Default)]
pub struct FakeListenWriter {
    pub writes: Mutex<Vec<String>>,
    pub fail: AtomicBool,
}

impl FakeListenWriter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let writer = Self::default();
        writer.fail.store(true, Ordering::SeqCst);
        Arc::new(writer)
    }

    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl ListenWriter for FakeListenWriter {
    async fn record_listen(&self, share_id: &str) -> Result<()> {
        self.writes.lock().unwrap().push(share_id.to_string());
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::UpstreamUnavailable("listen service down".to_string()));
        }
        Ok(())
    }
}
