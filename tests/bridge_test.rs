mod common;

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use serde_json::json;
use tokio::sync::mpsc;

use listenlink::{
    bridge::{
        BannerKind, BridgeView, ConnectionStatus, PlayerBridge,
        runtime::{bridge_channel, spawn, spawn_bridge},
        sdk::SdkEvent,
    },
    types::CompletionEvent,
};

use common::*;

type Views = Arc<Mutex<Vec<BridgeView>>>;

fn bridge(sdk: FakeSdk) -> (PlayerBridge<FakeSdk>, Arc<RecordingTransfer>) {
    let transfer = RecordingTransfer::new();
    (PlayerBridge::new(sdk, transfer.clone()), transfer)
}

fn observe(bridge: &mut PlayerBridge<FakeSdk>) -> Views {
    let views: Views = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&views);
    bridge.subscribe(Box::new(move |view: &BridgeView| {
        sink.lock().unwrap().push(view.clone())
    }));
    views
}

fn completions(bridge: &mut PlayerBridge<FakeSdk>) -> Arc<Mutex<Vec<String>>> {
    let fired = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&fired);
    bridge.set_on_track_complete(Box::new(move |event: CompletionEvent| {
        sink.lock().unwrap().push(event.track_id)
    }));
    fired
}

fn ready(device_id: &str) -> SdkEvent {
    SdkEvent::Ready {
        device_id: device_id.to_string(),
    }
}

fn connected_bridge() -> (PlayerBridge<FakeSdk>, FakeSdk, Arc<RecordingTransfer>) {
    let sdk = FakeSdk::new();
    let (mut bridge, transfer) = bridge(sdk.clone());
    bridge.initialize().unwrap();
    bridge.handle_event(ready(DEVICE));
    (bridge, sdk, transfer)
}

#[test]
fn test_initialize_loads_sdk_and_creates_player_once() {
    let sdk = FakeSdk::new();
    let (mut bridge, _) = bridge(sdk.clone());
    let views = observe(&mut bridge);

    bridge.initialize().unwrap();
    bridge.initialize().unwrap();

    assert_eq!(sdk.calls(), vec!["load", "create:listenlink:0.5"]);
    assert_eq!(bridge.status(), &ConnectionStatus::Initializing);

    let statuses: Vec<ConnectionStatus> =
        views.lock().unwrap().iter().map(|v| v.status.clone()).collect();
    assert_eq!(
        statuses,
        vec![
            ConnectionStatus::Uninitialized,
            ConnectionStatus::Loading,
            ConnectionStatus::Initializing
        ]
    );
}

#[test]
fn test_load_failure_is_terminal() {
    let sdk = FakeSdk {
        fail_load: true,
        ..FakeSdk::new()
    };
    let (mut bridge, transfer) = bridge(sdk.clone());

    assert!(bridge.initialize().is_err());
    assert!(matches!(bridge.status(), ConnectionStatus::Error(_)));
    assert_eq!(sdk.calls(), vec!["load"]);

    bridge.handle_event(ready(DEVICE));
    assert!(matches!(bridge.status(), ConnectionStatus::Error(_)));
    assert!(transfer.requests().is_empty());
}

#[test]
fn test_player_creation_failure_is_terminal() {
    let sdk = FakeSdk {
        fail_create: true,
        ..FakeSdk::new()
    };
    let (mut bridge, _) = bridge(sdk);

    assert!(bridge.initialize().is_err());
    assert!(matches!(bridge.status(), ConnectionStatus::Error(_)));
}

#[test]
fn test_initialization_error_event_before_ready_is_terminal() {
    let (mut bridge, _) = bridge(FakeSdk::new());
    bridge.initialize().unwrap();

    bridge.handle_event(SdkEvent::InitializationError("EME not supported".to_string()));

    assert!(matches!(bridge.status(), ConnectionStatus::Error(_)));
}

#[test]
fn test_ready_connects_and_requests_one_transfer() {
    let (mut bridge, _, transfer) = connected_bridge();

    assert_eq!(
        bridge.status(),
        &ConnectionStatus::Connected {
            device_id: DEVICE.to_string()
        }
    );
    assert_eq!(transfer.requests(), vec![DEVICE.to_string()]);

    bridge.handle_event(ready(DEVICE));
    assert_eq!(transfer.requests().len(), 1);
}

#[test]
fn test_reconnect_requests_transfer_again() {
    let (mut bridge, _, transfer) = connected_bridge();
    bridge.handle_event(SdkEvent::StateChanged(Some(sdk_state(
        TRACK_A, 1_000, 200_000, false,
    ))));

    bridge.handle_event(SdkEvent::NotReady {
        device_id: DEVICE.to_string(),
    });
    assert_eq!(bridge.status(), &ConnectionStatus::Disconnected);
    assert!(bridge.snapshot().is_none());

    bridge.handle_event(ready("device-2"));
    assert_eq!(bridge.status().device_id(), Some("device-2"));
    assert_eq!(
        transfer.requests(),
        vec![DEVICE.to_string(), "device-2".to_string()]
    );
}

#[test]
fn test_not_ready_for_other_device_is_ignored() {
    let (mut bridge, _, _) = connected_bridge();

    bridge.handle_event(SdkEvent::NotReady {
        device_id: "stale-device".to_string(),
    });

    assert!(bridge.status().is_connected());
}

#[test]
fn test_state_before_connect_is_ignored() {
    let (mut bridge, _) = bridge(FakeSdk::new());
    bridge.initialize().unwrap();

    bridge.handle_event(SdkEvent::StateChanged(Some(sdk_state(
        TRACK_A, 0, 200_000, true,
    ))));

    assert!(bridge.snapshot().is_none());
}

#[test]
fn test_state_replaces_snapshot_and_notifies_every_observer() {
    let (mut bridge, _, _) = connected_bridge();
    let first = observe(&mut bridge);
    let second = observe(&mut bridge);

    bridge.handle_event(SdkEvent::StateChanged(Some(sdk_state(
        TRACK_A, 5_000, 200_000, false,
    ))));
    bridge.handle_event(SdkEvent::StateChanged(Some(sdk_state(
        TRACK_A, 6_000, 200_000, false,
    ))));

    let snapshot = bridge.snapshot().unwrap();
    assert_eq!(snapshot.track_id, TRACK_A);
    assert_eq!(snapshot.track_uri, format!("spotify:track:{}", TRACK_A));
    assert_eq!(snapshot.position_ms, 6_000);
    assert_eq!(snapshot.duration_ms, 200_000);
    assert!(!snapshot.is_playing);

    let first = first.lock().unwrap().clone();
    let second = second.lock().unwrap().clone();
    assert_eq!(first.len(), 3);
    assert_eq!(first.last(), second.last());
    assert_eq!(first.last().unwrap().snapshot.as_ref(), bridge.snapshot());
}

#[test]
fn test_null_state_clears_snapshot() {
    let (mut bridge, _, _) = connected_bridge();
    bridge.handle_event(SdkEvent::StateChanged(Some(sdk_state(
        TRACK_A, 5_000, 200_000, true,
    ))));

    bridge.handle_event(SdkEvent::StateChanged(None));

    assert!(bridge.snapshot().is_none());
    assert!(bridge.status().is_connected());
}

#[test]
fn test_null_state_keeps_completion_record() {
    let (mut bridge, _, _) = connected_bridge();
    let fired = completions(&mut bridge);
    let at_end = || SdkEvent::StateChanged(Some(sdk_state(TRACK_A, 200_000, 200_000, true)));

    bridge.handle_event(at_end());
    // playback moved away and back, the same occurrence is reported again
    bridge.handle_event(SdkEvent::StateChanged(None));
    bridge.handle_event(at_end());

    assert!(bridge.status().is_connected());
    assert_eq!(fired.lock().unwrap().clone(), vec![TRACK_A.to_string()]);
}

#[test]
fn test_malformed_state_keeps_previous_snapshot() {
    let (mut bridge, _, _) = connected_bridge();
    bridge.handle_event(SdkEvent::StateChanged(Some(sdk_state(
        TRACK_A, 5_000, 200_000, true,
    ))));

    bridge.handle_event(SdkEvent::StateChanged(Some(json!({ "paused": "maybe" }))));
    bridge.handle_event(SdkEvent::StateChanged(Some(json!({
        "paused": true,
        "position": 0,
        "duration": 1000,
        "track_window": { "current_track": null }
    }))));

    assert_eq!(bridge.snapshot().unwrap().position_ms, 5_000);
}

#[test]
fn test_completion_fires_once_per_occurrence() {
    let (mut bridge, _, _) = connected_bridge();
    let fired = completions(&mut bridge);

    for (position, paused) in [
        (10_000, false),
        (199_400, true),
        (200_000, true),
        (200_000, true),
    ] {
        bridge.handle_event(SdkEvent::StateChanged(Some(sdk_state(
            TRACK_A, position, 200_000, paused,
        ))));
    }

    assert_eq!(fired.lock().unwrap().clone(), vec![TRACK_A.to_string()]);
}

#[test]
fn test_relinked_track_reports_requested_id() {
    let (mut bridge, _, _) = connected_bridge();
    let fired = completions(&mut bridge);

    bridge.handle_event(SdkEvent::StateChanged(Some(json!({
        "paused": true,
        "position": 180_000,
        "duration": 180_000,
        "track_window": {
            "current_track": {
                "id": TRACK_B,
                "uri": format!("spotify:track:{}", TRACK_B),
                "linked_from": {
                    "id": TRACK_A,
                    "uri": format!("spotify:track:{}", TRACK_A)
                }
            }
        }
    }))));

    assert_eq!(bridge.snapshot().unwrap().track_id, TRACK_A);
    assert_eq!(fired.lock().unwrap().clone(), vec![TRACK_A.to_string()]);
}

#[test]
fn test_poll_catches_stalled_completion() {
    let (mut bridge, sdk, _) = connected_bridge();
    let fired = completions(&mut bridge);

    sdk.set_current(Some(sdk_state(TRACK_A, 200_000, 200_000, true)));
    bridge.poll();
    bridge.poll();

    assert_eq!(fired.lock().unwrap().clone(), vec![TRACK_A.to_string()]);
}

#[test]
fn test_poll_skips_unchanged_readout() {
    let (mut bridge, sdk, _) = connected_bridge();
    let views = observe(&mut bridge);

    sdk.set_current(Some(sdk_state(TRACK_A, 42_000, 200_000, true)));
    bridge.poll();
    bridge.poll();
    bridge.poll();
    assert_eq!(views.lock().unwrap().len(), 2);

    sdk.set_current(Some(sdk_state(TRACK_A, 43_000, 200_000, true)));
    bridge.poll();
    assert_eq!(views.lock().unwrap().len(), 3);
    assert_eq!(bridge.snapshot().unwrap().position_ms, 43_000);
}

#[test]
fn test_disconnect_resets_completion_record() {
    let (mut bridge, _, _) = connected_bridge();
    let fired = completions(&mut bridge);
    let at_end = || SdkEvent::StateChanged(Some(sdk_state(TRACK_A, 200_000, 200_000, true)));

    bridge.handle_event(at_end());
    bridge.handle_event(SdkEvent::NotReady {
        device_id: DEVICE.to_string(),
    });
    bridge.handle_event(ready(DEVICE));
    bridge.handle_event(at_end());

    assert_eq!(fired.lock().unwrap().len(), 2);
}

#[test]
fn test_sdk_errors_raise_banners_without_disconnecting() {
    let (mut bridge, _, _) = connected_bridge();

    bridge.handle_event(SdkEvent::AccountError("Premium required".to_string()));
    assert_eq!(bridge.banner().unwrap().kind, BannerKind::Entitlement);
    assert!(bridge.status().is_connected());

    bridge.handle_event(SdkEvent::AuthenticationError("token expired".to_string()));
    assert_eq!(bridge.banner().unwrap().kind, BannerKind::Authentication);

    bridge.handle_event(SdkEvent::PlaybackError("cannot play".to_string()));
    assert_eq!(bridge.banner().unwrap().kind, BannerKind::Playback);
    assert_eq!(bridge.banner().unwrap().message, "cannot play");

    bridge.dismiss_banner();
    assert!(bridge.banner().is_none());
}

#[test]
fn test_transport_controls_go_straight_to_sdk() {
    let (mut bridge, sdk, _) = connected_bridge();
    let fired = completions(&mut bridge);

    bridge.toggle_play();
    bridge.next_track();
    bridge.previous_track();
    bridge.set_volume(1.7);
    bridge.set_volume(0.25);

    assert_eq!(
        sdk.calls()[2..].to_vec(),
        vec!["toggle", "next", "previous", "volume:1", "volume:0.25"]
    );
    assert!(fired.lock().unwrap().is_empty());
}

#[test]
fn test_transport_controls_need_a_device() {
    let sdk = FakeSdk::new();
    let (mut bridge, _) = bridge(sdk.clone());
    bridge.initialize().unwrap();

    bridge.toggle_play();
    bridge.set_volume(0.1);

    assert_eq!(sdk.calls().len(), 2);
    assert_eq!(bridge.volume(), 0.1);
}

#[test]
fn test_unsubscribed_observer_is_not_called() {
    let (mut bridge, _, _) = connected_bridge();
    let calls = Arc::new(Mutex::new(0));
    let sink = Arc::clone(&calls);
    let id = bridge.subscribe(Box::new(move |_: &BridgeView| *sink.lock().unwrap() += 1));

    assert!(bridge.unsubscribe(id));
    bridge.handle_event(SdkEvent::PlaybackError("x".to_string()));

    assert_eq!(*calls.lock().unwrap(), 1);
    assert!(!bridge.unsubscribe(id));
}

#[test]
fn test_teardown_clears_everything_and_silences_callbacks() {
    let (mut bridge, sdk, transfer) = connected_bridge();
    let views = observe(&mut bridge);
    let fired = completions(&mut bridge);
    let seen_before = views.lock().unwrap().len();

    bridge.teardown();

    assert_eq!(bridge.status(), &ConnectionStatus::Disconnected);
    assert!(bridge.snapshot().is_none());
    assert_eq!(bridge.observer_count(), 0);
    assert_eq!(sdk.calls().last().map(String::as_str), Some("disconnect"));

    bridge.handle_event(ready("device-2"));
    bridge.handle_event(SdkEvent::StateChanged(Some(sdk_state(
        TRACK_A, 200_000, 200_000, true,
    ))));
    bridge.poll();

    assert_eq!(views.lock().unwrap().len(), seen_before);
    assert!(fired.lock().unwrap().is_empty());
    assert_eq!(transfer.requests().len(), 1);
    assert_eq!(bridge.status(), &ConnectionStatus::Disconnected);
}

#[tokio::test]
async fn test_runtime_serializes_events_and_reports_completions() {
    let sdk = FakeSdk::new();
    let transfer = RecordingTransfer::new();
    let bridge = PlayerBridge::new(sdk.clone(), transfer.clone());
    let (handle, task) = spawn_bridge(bridge, Duration::from_millis(10));

    let (tx, mut rx) = mpsc::unbounded_channel();
    handle.set_on_track_complete(move |event: CompletionEvent| {
        let _ = tx.send(event.track_id);
    });
    assert!(handle.sdk_event(ready(DEVICE)));

    let view = handle.view().await.unwrap();
    assert!(view.status.is_connected());
    assert_eq!(transfer.requests(), vec![DEVICE.to_string()]);

    // no push from the SDK, only the periodic check sees the end state
    sdk.set_current(Some(sdk_state(TRACK_A, 200_000, 200_000, true)));
    let completed = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap();
    assert_eq!(completed.as_deref(), Some(TRACK_A));

    handle.teardown().await;
    task.await.unwrap();
    assert!(handle.view().await.is_none());
    assert!(!handle.sdk_event(ready(DEVICE)));
}

#[tokio::test]
async fn test_runtime_subscribers_see_current_view_first() {
    let (handle, receiver) = bridge_channel();
    let sdk = FakeSdk::new();
    let task = spawn(
        PlayerBridge::new(sdk.clone(), RecordingTransfer::new()),
        receiver,
        Duration::from_millis(50),
    );

    let (tx, mut rx) = mpsc::unbounded_channel();
    let id = handle
        .subscribe(move |view: &BridgeView| {
            let _ = tx.send(view.status.clone());
        })
        .await;
    assert!(id.is_some());

    assert_eq!(rx.recv().await, Some(ConnectionStatus::Initializing));
    handle.sdk_event(ready(DEVICE));
    assert_eq!(
        rx.recv().await,
        Some(ConnectionStatus::Connected {
            device_id: DEVICE.to_string()
        })
    );

    drop(handle);
    task.await.unwrap();
    assert_eq!(sdk.calls().last().map(String::as_str), Some("disconnect"));
}
