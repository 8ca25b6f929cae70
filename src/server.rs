use std::{collections::HashMap, net::SocketAddr, str::FromStr, sync::Arc};

use axum::{
    Router,
    routing::{delete, get, put},
};
use chrono::{Duration, Utc};
use tokio::{net::TcpListener, sync::Mutex};

use crate::{
    api,
    config::Settings,
    error::{Error, Result},
    management::{FileSessionStore, SessionStore, TokenManager},
    spotify::{
        auth::SpotifyAccounts,
        player::{PlaybackClient, SpotifyPlayerApi},
    },
    types::PendingLogin,
    utils,
};

/// How long a started login waits for its callback.
pub const PENDING_LOGIN_TTL_SECS: i64 = 600;

/// Logins keyed by their OAuth `state` value.
pub type PendingLogins = Arc<Mutex<HashMap<String, PendingLogin>>>;

#[derive(Clone)]
pub struct AppState {
    pub tokens: Arc<TokenManager>,
    pub playback: Arc<PlaybackClient>,
    pub accounts: Arc<SpotifyAccounts>,
    pub pending: PendingLogins,
}

impl AppState {
    pub fn new(
        tokens: Arc<TokenManager>,
        playback: Arc<PlaybackClient>,
        accounts: Arc<SpotifyAccounts>,
    ) -> Self {
        Self {
            tokens,
            playback,
            accounts,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Wires the file-backed store and the HTTP provider clients from `settings`.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let store: Arc<dyn SessionStore> = Arc::new(FileSessionStore::new(&settings.data_dir));
        Self::with_store(settings, store)
    }

    pub fn with_store(settings: &Settings, store: Arc<dyn SessionStore>) -> Result<Self> {
        let accounts = Arc::new(SpotifyAccounts::new(settings)?);
        let tokens = Arc::new(TokenManager::new(
            store,
            accounts.clone(),
            settings.refresh_buffer,
        ));
        let api = Arc::new(SpotifyPlayerApi::new(settings)?);
        let playback = Arc::new(PlaybackClient::new(Arc::clone(&tokens), api));
        Ok(Self::new(tokens, playback, accounts))
    }

    /// Starts a PKCE login for `user_id` and returns the provider URL to send
    /// the user to.
    pub async fn begin_login(&self, user_id: &str) -> Result<String> {
        utils::validate_user_id(user_id)?;

        let verifier = utils::generate_code_verifier();
        let challenge = utils::generate_code_challenge(&verifier);
        let state = utils::generate_state();
        let url = self.accounts.authorize_url(&challenge, &state)?;

        let mut pending = self.pending.lock().await;
        let now = Utc::now();
        pending.retain(|_, login| !is_expired(login, now));
        pending.insert(
            state,
            PendingLogin {
                user_id: user_id.to_string(),
                code_verifier: verifier,
                created_at: now,
            },
        );
        tracing::debug!(user_id, pending = pending.len(), "login started");
        Ok(url)
    }

    /// Takes the pending login for `state`. Each state is usable once.
    pub async fn take_login(&self, state: &str) -> Result<PendingLogin> {
        let login = self
            .pending
            .lock()
            .await
            .remove(state)
            .ok_or_else(|| Error::InvalidRequest("unknown login state".to_string()))?;

        if is_expired(&login, Utc::now()) {
            return Err(Error::InvalidRequest("login expired".to_string()));
        }
        Ok(login)
    }
}

fn is_expired(login: &PendingLogin, now: chrono::DateTime<Utc>) -> bool {
    now - login.created_at > Duration::seconds(PENDING_LOGIN_TTL_SECS)
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/login", get(api::login))
        .route("/callback", get(api::callback))
        .route("/api/spotify/token", get(api::token))
        .route("/api/spotify/transfer", put(api::transfer))
        .route("/api/spotify/play", put(api::play))
        .route("/api/spotify/devices", get(api::devices))
        .route("/api/spotify/session", delete(api::disconnect))
        .with_state(state)
}

/// Binds `server_addr` and serves the router until the process ends.
pub async fn start_api_server(state: AppState, server_addr: &str) -> Result<()> {
    let addr = SocketAddr::from_str(server_addr)
        .map_err(|e| Error::Config(format!("invalid server address {}: {}", server_addr, e)))?;

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::Config(format!("cannot bind {}: {}", addr, e)))?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, create_router(state))
        .await
        .map_err(|e| Error::UpstreamUnavailable(format!("server stopped: {}", e)))
}
