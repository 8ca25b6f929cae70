//! # Remote Player Bridge
//!
//! Client-side owner of the one logical player of a UI session. The bridge
//! drives the provider's playback SDK through [`sdk::PlaybackSdk`], keeps the
//! current [`PlaybackSnapshot`], and pushes every change to its observers.
//!
//! ```text
//! Uninitialized → Loading → Initializing → Connected(device) ⇄ Disconnected
//!                    └──────────┴──→ Error (terminal)
//! ```
//!
//! Entering `Connected` asks the backend to transfer playback to the new
//! device, once per entry. Snapshots then flow through the
//! [`completion::CompletionDetector`] and completions go to the callback
//! registered with [`PlayerBridge::set_on_track_complete`].
//!
//! Everything here runs on one event loop: [`PlayerBridge`] is driven with
//! `&mut self` and notifies observers before returning. [`runtime`] wraps it
//! in a task that owns it and serializes SDK events and UI commands.

use std::sync::Arc;

use chrono::Utc;

use crate::types::{CompletionEvent, PlaybackSnapshot};

pub mod backend;
pub mod completion;
pub mod listen;
pub mod runtime;
pub mod sdk;

use completion::CompletionDetector;
use sdk::{PlaybackSdk, SdkError, SdkEvent};

pub const DEFAULT_PLAYER_NAME: &str = "listenlink";
pub const DEFAULT_VOLUME: f32 = 0.5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    Uninitialized,
    Loading,
    Initializing,
    Connected { device_id: String },
    Disconnected,
    Error(String),
}

impl ConnectionStatus {
    pub fn device_id(&self) -> Option<&str> {
        match self {
            ConnectionStatus::Connected { device_id } => Some(device_id),
            _ => None,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BannerKind {
    Authentication,
    Entitlement,
    Playback,
}

/// Non-fatal SDK error shown to the user; controls stay usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    pub kind: BannerKind,
    pub message: String,
}

/// What every observer sees. All observers get the same value for each change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeView {
    pub status: ConnectionStatus,
    pub snapshot: Option<PlaybackSnapshot>,
    pub banner: Option<Banner>,
}

/// Backend call made when the player gets a device.
///
/// Implementations must not block; the bridge calls this from its event loop.
pub trait DeviceTransfer: Send + Sync {
    fn request_transfer(&self, device_id: &str);
}

pub type Observer = Box<dyn FnMut(&BridgeView) + Send>;
pub type CompletionCallback = Box<dyn FnMut(CompletionEvent) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

pub struct PlayerBridge<S: PlaybackSdk> {
    sdk: S,
    transfer: Arc<dyn DeviceTransfer>,
    player_name: String,
    volume: f32,
    status: ConnectionStatus,
    snapshot: Option<PlaybackSnapshot>,
    banner: Option<Banner>,
    detector: CompletionDetector,
    observers: Vec<(ObserverId, Observer)>,
    next_observer: u64,
    on_complete: Option<CompletionCallback>,
    torn_down: bool,
}

impl<S: PlaybackSdk> PlayerBridge<S> {
    pub fn new(sdk: S, transfer: Arc<dyn DeviceTransfer>) -> Self {
        Self {
            sdk,
            transfer,
            player_name: DEFAULT_PLAYER_NAME.to_string(),
            volume: DEFAULT_VOLUME,
            status: ConnectionStatus::Uninitialized,
            snapshot: None,
            banner: None,
            detector: CompletionDetector::new(),
            observers: Vec::new(),
            next_observer: 0,
            on_complete: None,
            torn_down: false,
        }
    }

    /// Name under which the player shows up in the provider's device list.
    pub fn with_player_name(mut self, name: impl Into<String>) -> Self {
        self.player_name = name.into();
        self
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume.clamp(0.0, 1.0);
        self
    }

    /// Loads the SDK and creates the player. Only the first call does anything.
    ///
    /// # Errors
    ///
    /// Returns the SDK error after moving the bridge into the terminal `Error` state.
    pub fn initialize(&mut self) -> Result<(), SdkError> {
        if self.torn_down || self.status != ConnectionStatus::Uninitialized {
            return Ok(());
        }

        self.set_status(ConnectionStatus::Loading);
        if let Err(e) = self.sdk.load() {
            self.fail(&e);
            return Err(e);
        }

        self.set_status(ConnectionStatus::Initializing);
        let (name, volume) = (self.player_name.clone(), self.volume);
        if let Err(e) = self.sdk.create_player(&name, volume) {
            self.fail(&e);
            return Err(e);
        }

        tracing::debug!(player = %self.player_name, "player created, waiting for device");
        Ok(())
    }

    pub fn handle_event(&mut self, event: SdkEvent) {
        if self.torn_down {
            tracing::trace!(?event, "event after teardown ignored");
            return;
        }

        match event {
            SdkEvent::Ready { device_id } => self.on_ready(device_id),
            SdkEvent::NotReady { device_id } => self.on_not_ready(&device_id),
            SdkEvent::StateChanged(raw) => self.on_state(raw),
            SdkEvent::InitializationError(message) => match self.status {
                ConnectionStatus::Connected { .. } | ConnectionStatus::Disconnected => {
                    self.show_banner(BannerKind::Playback, message)
                }
                _ => self.fail(&SdkError::Initialization(message)),
            },
            SdkEvent::AuthenticationError(message) => {
                self.show_banner(BannerKind::Authentication, message)
            }
            SdkEvent::AccountError(message) => self.show_banner(BannerKind::Entitlement, message),
            SdkEvent::PlaybackError(message) => self.show_banner(BannerKind::Playback, message),
        }
    }

    /// Periodic check for completions the SDK never pushed an event for.
    pub fn poll(&mut self) {
        if self.torn_down || !self.status.is_connected() {
            return;
        }
        let Some(raw) = self.sdk.current_state() else {
            return;
        };
        let snapshot = match sdk::snapshot_from_sdk(&raw, Utc::now()) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::trace!(error = %e, "polled player state dropped");
                return;
            }
        };

        // an unchanged readout was already seen by the detector and the observers
        if self
            .snapshot
            .as_ref()
            .is_some_and(|current| current.same_playback(&snapshot))
        {
            return;
        }
        self.apply_snapshot(snapshot);
    }

    /// Registers an observer and hands it the current view right away.
    pub fn subscribe(&mut self, mut observer: Observer) -> ObserverId {
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;

        if !self.torn_down {
            observer(&self.view());
            self.observers.push((id, observer));
        }
        id
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(observer_id, _)| *observer_id != id);
        self.observers.len() != before
    }

    /// Replaces the completion callback.
    pub fn set_on_track_complete(&mut self, callback: CompletionCallback) {
        if !self.torn_down {
            self.on_complete = Some(callback);
        }
    }

    pub fn toggle_play(&mut self) {
        if self.can_control() {
            self.sdk.toggle_play();
        }
    }

    pub fn next_track(&mut self) {
        if self.can_control() {
            self.sdk.next_track();
        }
    }

    pub fn previous_track(&mut self) {
        if self.can_control() {
            self.sdk.previous_track();
        }
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        if self.can_control() {
            self.sdk.set_volume(self.volume);
        }
    }

    pub fn dismiss_banner(&mut self) {
        if self.banner.take().is_some() {
            self.notify();
        }
    }

    /// Drops observers and callback, disconnects the player and resets to
    /// `Disconnected` with no snapshot. Nothing is called back afterwards.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.observers.clear();
        self.on_complete = None;

        if self.status != ConnectionStatus::Uninitialized {
            self.sdk.disconnect();
        }
        self.status = ConnectionStatus::Disconnected;
        self.snapshot = None;
        self.banner = None;
        self.detector.reset();
        tracing::debug!("player bridge torn down");
    }

    pub fn view(&self) -> BridgeView {
        BridgeView {
            status: self.status.clone(),
            snapshot: self.snapshot.clone(),
            banner: self.banner.clone(),
        }
    }

    pub fn status(&self) -> &ConnectionStatus {
        &self.status
    }

    pub fn snapshot(&self) -> Option<&PlaybackSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn banner(&self) -> Option<&Banner> {
        self.banner.as_ref()
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn sdk(&self) -> &S {
        &self.sdk
    }

    pub fn sdk_mut(&mut self) -> &mut S {
        &mut self.sdk
    }

    fn on_ready(&mut self, device_id: String) {
        match &self.status {
            ConnectionStatus::Initializing | ConnectionStatus::Disconnected => {}
            ConnectionStatus::Connected { device_id: current } if *current != device_id => {}
            ConnectionStatus::Connected { .. } => {
                tracing::debug!(device_id = %device_id, "duplicate ready ignored");
                return;
            }
            status => {
                tracing::warn!(?status, device_id = %device_id, "ready in unexpected state ignored");
                return;
            }
        }

        tracing::info!(device_id = %device_id, "player connected");
        // a new device starts without history
        self.snapshot = None;
        self.detector.reset();
        self.set_status(ConnectionStatus::Connected {
            device_id: device_id.clone(),
        });
        self.transfer.request_transfer(&device_id);
    }

    fn on_not_ready(&mut self, device_id: &str) {
        if self.status.device_id() != Some(device_id) {
            tracing::debug!(device_id, "not-ready for unknown device ignored");
            return;
        }

        tracing::warn!(device_id, "player disconnected by provider");
        self.snapshot = None;
        self.detector.reset();
        self.set_status(ConnectionStatus::Disconnected);
    }

    fn on_state(&mut self, raw: Option<serde_json::Value>) {
        if !self.status.is_connected() {
            tracing::trace!("state while not connected ignored");
            return;
        }

        // no playback right now; the completion record survives until the
        // track changes or the player disconnects
        let Some(raw) = raw else {
            if self.snapshot.take().is_some() {
                self.notify();
            }
            return;
        };

        match sdk::snapshot_from_sdk(&raw, Utc::now()) {
            Ok(snapshot) => self.apply_snapshot(snapshot),
            Err(e) => tracing::warn!(error = %e, "dropping player state"),
        }
    }

    fn apply_snapshot(&mut self, snapshot: PlaybackSnapshot) {
        let completion = self.detector.on_snapshot(&snapshot);
        self.snapshot = Some(snapshot);
        self.notify();

        if let (Some(event), Some(callback)) = (completion, self.on_complete.as_mut()) {
            callback(event);
        }
    }

    fn show_banner(&mut self, kind: BannerKind, message: String) {
        tracing::warn!(?kind, message = %message, "player error");
        self.banner = Some(Banner { kind, message });
        self.notify();
    }

    fn fail(&mut self, error: &SdkError) {
        tracing::error!(error = %error, "player bridge failed");
        self.snapshot = None;
        self.detector.reset();
        self.set_status(ConnectionStatus::Error(error.to_string()));
    }

    fn set_status(&mut self, status: ConnectionStatus) {
        self.status = status;
        self.notify();
    }

    fn can_control(&self) -> bool {
        !self.torn_down && self.status.is_connected()
    }

    fn notify(&mut self) {
        if self.observers.is_empty() {
            return;
        }
        let view = self.view();
        for (_, observer) in self.observers.iter_mut() {
            observer(&view);
        }
    }
}
