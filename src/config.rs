//! Configuration management for listenlink.
//!
//! This module handles loading and accessing configuration values from environment
//! variables and `.env` files. It provides a centralized way to manage provider
//! credentials, server settings, and the timing parameters of the token manager
//! and the player bridge.
//!
//! The configuration system follows a hierarchical approach:
//! 1. Environment variables (highest priority)
//! 2. `.env` file in the local data directory
//! 3. Application defaults (where applicable)

use std::{env, path::PathBuf, time::Duration};

use crate::error::{Error, Result};

pub const DEFAULT_SERVER_ADDRESS: &str = "127.0.0.1:8888";
pub const DEFAULT_API_URL: &str = "https://api.spotify.com/v1";
pub const DEFAULT_AUTH_URL: &str = "https://accounts.spotify.com/authorize";
pub const DEFAULT_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const DEFAULT_SCOPE: &str = "streaming user-read-email user-read-private user-read-playback-state user-modify-playback-state";
pub const DEFAULT_REFRESH_BUFFER_SECS: u64 = 300;
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Loads environment variables from a `.env` file in the local data directory.
///
/// The file lives under `listenlink/.env` in the platform-specific local data
/// directory:
/// - Linux: `~/.local/share/listenlink/.env`
/// - macOS: `~/Library/Application Support/listenlink/.env`
/// - Windows: `%LOCALAPPDATA%/listenlink/.env`
///
/// A missing file is not an error; variables already present in the process
/// environment are never overridden.
///
/// # Errors
///
/// Returns `Error::Config` if the directory cannot be created or an existing
/// `.env` file cannot be parsed.
pub async fn load_env() -> Result<()> {
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("listenlink/.env");
    if let Some(parent) = path.parent() {
        async_fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::Config(e.to_string()))?;
    }

    if path.is_file() {
        dotenv::from_path(&path).map_err(|e| Error::Config(e.to_string()))?;
    }
    Ok(())
}

/// Runtime settings resolved from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server_addr: String,
    pub api_url: String,
    pub auth_url: String,
    pub token_url: String,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub scope: String,
    pub refresh_buffer: chrono::Duration,
    pub provider_timeout: Duration,
    pub data_dir: PathBuf,
    pub backend_url: String,
    pub poll_interval: Duration,
}

impl Settings {
    /// Reads every setting, applying defaults for the optional ones.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when `SPOTIFY_API_AUTH_CLIENT_ID` or
    /// `SPOTIFY_API_REDIRECT_URI` is missing, or a numeric value does not parse.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            server_addr: var_or("SERVER_ADDRESS", DEFAULT_SERVER_ADDRESS),
            api_url: trim_url(var_or("SPOTIFY_API_URL", DEFAULT_API_URL)),
            auth_url: var_or("SPOTIFY_API_AUTH_URL", DEFAULT_AUTH_URL),
            token_url: var_or("SPOTIFY_API_TOKEN_URL", DEFAULT_TOKEN_URL),
            client_id: var("SPOTIFY_API_AUTH_CLIENT_ID")?,
            client_secret: env::var("SPOTIFY_API_AUTH_CLIENT_SECRET")
                .ok()
                .filter(|s| !s.is_empty()),
            redirect_uri: var("SPOTIFY_API_REDIRECT_URI")?,
            scope: var_or("SPOTIFY_API_AUTH_SCOPE", DEFAULT_SCOPE),
            refresh_buffer: chrono::Duration::seconds(number_or(
                "LISTENLINK_REFRESH_BUFFER_SECS",
                DEFAULT_REFRESH_BUFFER_SECS,
            )? as i64),
            provider_timeout: Duration::from_secs(number_or(
                "LISTENLINK_PROVIDER_TIMEOUT_SECS",
                DEFAULT_PROVIDER_TIMEOUT_SECS,
            )?),
            data_dir: env::var("LISTENLINK_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_data_dir()),
            backend_url: trim_url(var_or(
                "LISTENLINK_BACKEND_URL",
                &format!("http://{}", DEFAULT_SERVER_ADDRESS),
            )),
            poll_interval: Duration::from_millis(number_or(
                "LISTENLINK_POLL_INTERVAL_MS",
                DEFAULT_POLL_INTERVAL_MS,
            )?),
        })
    }

    /// Settings pointing at the given provider base URLs, for tests and local tooling.
    pub fn for_provider(api_url: &str, token_url: &str) -> Self {
        Self {
            server_addr: DEFAULT_SERVER_ADDRESS.to_string(),
            api_url: trim_url(api_url.to_string()),
            auth_url: DEFAULT_AUTH_URL.to_string(),
            token_url: token_url.to_string(),
            client_id: "listenlink-test".to_string(),
            client_secret: None,
            redirect_uri: format!("http://{}/callback", DEFAULT_SERVER_ADDRESS),
            scope: DEFAULT_SCOPE.to_string(),
            refresh_buffer: chrono::Duration::seconds(DEFAULT_REFRESH_BUFFER_SECS as i64),
            provider_timeout: Duration::from_secs(DEFAULT_PROVIDER_TIMEOUT_SECS),
            data_dir: default_data_dir(),
            backend_url: format!("http://{}", DEFAULT_SERVER_ADDRESS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

/// `<data_local_dir>/listenlink`
pub fn default_data_dir() -> PathBuf {
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("listenlink");
    path
}

fn var(name: &str) -> Result<String> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| Error::Config(format!("{} must be set", name)))
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn number_or(name: &str, default: u64) -> Result<u64> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<u64>()
            .map_err(|e| Error::Config(format!("{} is not a number: {}", name, e))),
        _ => Ok(default),
    }
}

fn trim_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}
