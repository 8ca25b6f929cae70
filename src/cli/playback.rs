use tabled::Table;

use crate::{
    cli, error, info, success,
    types::{Device, DeviceTableRow},
    warning,
};

/// Prints a valid access credential for `user_id`, refreshing it first if it
/// is about to expire.
pub async fn token(user_id: &str) {
    let state = cli::app_state(&cli::settings());

    match state.tokens.get_valid_session(user_id).await {
        Ok(session) => {
            info!("Expires at {}", session.access_expires_at.to_rfc3339());
            println!("{}", session.access_token);
        }
        Err(e) => error!("Cannot get access token for {}: {}", user_id, e),
    }
}

pub async fn transfer(user_id: &str, device_id: &str) {
    let state = cli::app_state(&cli::settings());

    match state.playback.transfer(user_id, device_id).await {
        Ok(()) => success!("Playback transferred to {}", device_id),
        Err(e) => error!("Transfer failed: {}", e),
    }
}

pub async fn play(user_id: &str, device_id: &str, track_uri: &str) {
    let state = cli::app_state(&cli::settings());

    match state.playback.play(user_id, device_id, track_uri).await {
        Ok(()) => success!("Playing {} on {}", track_uri, device_id),
        Err(e) => error!("Playback failed: {}", e),
    }
}

pub async fn devices(user_id: &str) {
    let state = cli::app_state(&cli::settings());

    let devices = match state.playback.devices(user_id).await {
        Ok(devices) => devices,
        Err(e) => error!("Cannot list devices: {}", e),
    };

    if devices.is_empty() {
        warning!("No devices found. Open a player for {} first.", user_id);
        return;
    }

    let rows: Vec<DeviceTableRow> = devices.into_iter().map(device_row).collect();
    let table = Table::new(rows);
    println!("{}", table);
}

fn device_row(device: Device) -> DeviceTableRow {
    DeviceTableRow {
        name: device.name,
        kind: device.kind,
        id: device.id.unwrap_or_else(|| "-".to_string()),
        active: if device.is_active { "yes" } else { "" }.to_string(),
    }
}
