use chrono::Utc;
use tabled::Table;

use crate::{cli, error, info, success, types::SessionTableRow, warning};

pub async fn sessions() {
    let state = cli::app_state(&cli::settings());

    let mut sessions = match state.tokens.store().list().await {
        Ok(sessions) => sessions,
        Err(e) => error!("Cannot read sessions: {}", e),
    };

    if sessions.is_empty() {
        info!("No connected accounts. Run `listenlink auth --user <id>` to connect one.");
        return;
    }
    sessions.sort_by(|a, b| a.user_id.cmp(&b.user_id));

    let now = Utc::now();
    let rows: Vec<SessionTableRow> = sessions
        .into_iter()
        .map(|s| SessionTableRow {
            user: s.user_id,
            expires: if s.access_expires_at > now {
                s.access_expires_at.format("%Y-%m-%d %H:%M:%S").to_string()
            } else {
                "expired (refreshes on use)".to_string()
            },
            device: s.active_device_id.unwrap_or_else(|| "-".to_string()),
        })
        .collect();

    let table = Table::new(rows);
    println!("{}", table);
}

pub async fn logout(user_id: &str) {
    let state = cli::app_state(&cli::settings());

    match state.tokens.disconnect(user_id).await {
        Ok(true) => success!("Disconnected {}", user_id),
        Ok(false) => warning!("No session stored for {}", user_id),
        Err(e) => error!("Cannot remove session: {}", e),
    }
}
