//! Task that owns a [`PlayerBridge`] and serializes everything touching it.
//!
//! SDK callbacks, UI commands and the periodic poll all arrive on one loop, so
//! the bridge never sees two of them at once. Handles are cheap to clone and
//! keep working (as no-ops) after the task has stopped.

use std::time::Duration;

use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};

use crate::bridge::{
    BridgeView, CompletionCallback, Observer, ObserverId, PlayerBridge, sdk::PlaybackSdk,
    sdk::SdkEvent,
};

pub enum BridgeCommand {
    Sdk(SdkEvent),
    Subscribe(Observer, oneshot::Sender<ObserverId>),
    Unsubscribe(ObserverId),
    SetOnTrackComplete(CompletionCallback),
    TogglePlay,
    NextTrack,
    PreviousTrack,
    SetVolume(f32),
    DismissBanner,
    View(oneshot::Sender<BridgeView>),
    Teardown(oneshot::Sender<()>),
}

#[derive(Clone)]
pub struct BridgeHandle {
    tx: mpsc::UnboundedSender<BridgeCommand>,
}

/// Receiving end of a bridge channel, consumed by [`spawn`].
pub struct BridgeReceiver {
    rx: mpsc::UnboundedReceiver<BridgeCommand>,
}

/// Creates the channel up front so an SDK adapter can hold a handle before
/// the bridge task exists.
pub fn bridge_channel() -> (BridgeHandle, BridgeReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (BridgeHandle { tx }, BridgeReceiver { rx })
}

/// Starts the bridge task: initializes the player, then handles commands and
/// polls the SDK every `poll_every` until torn down or every handle is dropped.
pub fn spawn<S>(
    bridge: PlayerBridge<S>,
    receiver: BridgeReceiver,
    poll_every: Duration,
) -> JoinHandle<()>
where
    S: PlaybackSdk + 'static,
{
    tokio::spawn(run(bridge, receiver.rx, poll_every))
}

pub fn spawn_bridge<S>(bridge: PlayerBridge<S>, poll_every: Duration) -> (BridgeHandle, JoinHandle<()>)
where
    S: PlaybackSdk + 'static,
{
    let (handle, receiver) = bridge_channel();
    let task = spawn(bridge, receiver, poll_every);
    (handle, task)
}

async fn run<S: PlaybackSdk>(
    mut bridge: PlayerBridge<S>,
    mut rx: mpsc::UnboundedReceiver<BridgeCommand>,
    poll_every: Duration,
) {
    if let Err(e) = bridge.initialize() {
        tracing::error!(error = %e, "player could not be initialized");
    }

    let mut ticker = time::interval(poll_every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;

            command = rx.recv() => match command {
                Some(BridgeCommand::Teardown(done)) => {
                    bridge.teardown();
                    let _ = done.send(());
                    break;
                }
                Some(command) => apply(&mut bridge, command),
                None => {
                    bridge.teardown();
                    break;
                }
            },
            _ = ticker.tick() => bridge.poll(),
        }
    }
    tracing::debug!("bridge task stopped");
}

fn apply<S: PlaybackSdk>(bridge: &mut PlayerBridge<S>, command: BridgeCommand) {
    match command {
        BridgeCommand::Sdk(event) => bridge.handle_event(event),
        BridgeCommand::Subscribe(observer, reply) => {
            let id = bridge.subscribe(observer);
            let _ = reply.send(id);
        }
        BridgeCommand::Unsubscribe(id) => {
            bridge.unsubscribe(id);
        }
        BridgeCommand::SetOnTrackComplete(callback) => bridge.set_on_track_complete(callback),
        BridgeCommand::TogglePlay => bridge.toggle_play(),
        BridgeCommand::NextTrack => bridge.next_track(),
        BridgeCommand::PreviousTrack => bridge.previous_track(),
        BridgeCommand::SetVolume(volume) => bridge.set_volume(volume),
        BridgeCommand::DismissBanner => bridge.dismiss_banner(),
        BridgeCommand::View(reply) => {
            let _ = reply.send(bridge.view());
        }
        BridgeCommand::Teardown(done) => {
            bridge.teardown();
            let _ = done.send(());
        }
    }
}

impl BridgeHandle {
    /// Forwards an SDK callback. Returns `false` once the bridge task is gone.
    pub fn sdk_event(&self, event: SdkEvent) -> bool {
        self.send(BridgeCommand::Sdk(event))
    }

    pub async fn subscribe<F>(&self, observer: F) -> Option<ObserverId>
    where
        F: FnMut(&BridgeView) + Send + 'static,
    {
        let (reply, id) = oneshot::channel();
        if !self.send(BridgeCommand::Subscribe(Box::new(observer), reply)) {
            return None;
        }
        id.await.ok()
    }

    pub fn unsubscribe(&self, id: ObserverId) {
        self.send(BridgeCommand::Unsubscribe(id));
    }

    pub fn set_on_track_complete<F>(&self, callback: F)
    where
        F: FnMut(crate::types::CompletionEvent) + Send + 'static,
    {
        self.send(BridgeCommand::SetOnTrackComplete(Box::new(callback)));
    }

    pub fn toggle_play(&self) {
        self.send(BridgeCommand::TogglePlay);
    }

    pub fn next_track(&self) {
        self.send(BridgeCommand::NextTrack);
    }

    pub fn previous_track(&self) {
        self.send(BridgeCommand::PreviousTrack);
    }

    pub fn set_volume(&self, volume: f32) {
        self.send(BridgeCommand::SetVolume(volume));
    }

    pub fn dismiss_banner(&self) {
        self.send(BridgeCommand::DismissBanner);
    }

    /// Current view, or `None` once the bridge task is gone.
    pub async fn view(&self) -> Option<BridgeView> {
        let (reply, view) = oneshot::channel();
        if !self.send(BridgeCommand::View(reply)) {
            return None;
        }
        view.await.ok()
    }

    /// Tears the bridge down and waits until it is done. No observer or
    /// completion callback runs after this returns.
    pub async fn teardown(&self) {
        let (done, wait) = oneshot::channel();
        if self.send(BridgeCommand::Teardown(done)) {
            let _ = wait.await;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn send(&self, command: BridgeCommand) -> bool {
        self.tx.send(command).is_ok()
    }
}
