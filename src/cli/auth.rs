use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::time::{Instant, sleep};

use crate::{
    cli, error,
    server::{self, AppState},
    success, warning,
};

/// How long to wait for the user to finish the provider's consent page.
const LOGIN_TIMEOUT: Duration = Duration::from_secs(120);

/// Connects the provider account of `user_id`.
///
/// Starts the local server, which receives the OAuth callback, opens the
/// authorization URL in the browser and waits until the callback has stored a
/// new session.
pub async fn auth(user_id: &str) {
    let settings = cli::settings();
    let state = cli::app_state(&settings);

    let previous = match state.tokens.store().load(user_id).await {
        Ok(session) => session.map(|session| session.access_token),
        Err(e) => error!("Cannot read session store: {}", e),
    };

    let url = match state.begin_login(user_id).await {
        Ok(url) => url,
        Err(e) => error!("Cannot start login: {}", e),
    };

    let server_state = state.clone();
    let server_addr = settings.server_addr.clone();
    tokio::spawn(async move {
        if let Err(e) = server::start_api_server(server_state, &server_addr).await {
            tracing::error!(error = %e, "callback server failed");
        }
    });

    if webbrowser::open(&url).is_err() {
        warning!(
            "Failed to open browser. Please navigate to the following URL manually:\n{}",
            url
        )
    }

    let pb = ProgressBar::new_spinner();
    pb.set_message("Waiting for authorization in the browser...");
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_style(
        ProgressStyle::with_template("{spinner:.blue} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );

    let connected = wait_for_session(&state, user_id, previous).await;
    pb.finish_and_clear();

    if connected {
        success!("Authentication successful for {}!", user_id);
    } else {
        error!("Authentication failed or timed out.");
    }
}

async fn wait_for_session(state: &AppState, user_id: &str, previous: Option<String>) -> bool {
    let store = state.tokens.store();
    let deadline = Instant::now() + LOGIN_TIMEOUT;

    while Instant::now() < deadline {
        match store.load(user_id).await {
            Ok(Some(session)) if Some(&session.access_token) != previous.as_ref() => return true,
            Ok(_) => {}
            Err(e) => tracing::debug!(error = %e, "session store not readable yet"),
        }
        sleep(Duration::from_millis(500)).await;
    }
    false
}
