//! listenlink: playback bridge between a music-sharing app and a streaming provider.
//!
//! The backend keeps every user's provider session valid and remote-controls
//! their devices; the client side owns the browser player, detects finished
//! tracks and records listens for the shares they came from.
//!
//! # Modules
//!
//! - `api` - HTTP handlers of the backend
//! - `bridge` - Remote player bridge, completion detection and listen recording
//! - `cli` - Command-line interface implementations
//! - `config` - Configuration management and environment variables
//! - `error` - Error taxonomy shared by every component
//! - `management` - Session store, token lifecycle and listen cache
//! - `server` - Router and shared state of the backend
//! - `spotify` - Provider accounts service and playback endpoints
//! - `types` - Data structures and type definitions
//! - `utils` - PKCE helpers and identifier parsing
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use listenlink::{config::Settings, server::AppState};
//!
//! #[tokio::main]
//! async fn main() -> listenlink::Res<()> {
//!     listenlink::config::load_env().await?;
//!     let settings = Settings::from_env()?;
//!     let state = AppState::from_settings(&settings)?;
//!     let token = state.tokens.get_valid_token("alice").await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod bridge;
pub mod cli;
pub mod config;
pub mod error;
pub mod management;
pub mod server;
pub mod spotify;
pub mod types;
pub mod utils;

/// Boxed-error result used at the binary's edges, where the typed
/// [`error::Error`] meets errors from clap, dotenv and the subscriber setup.
pub type Res<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Prints an informational line with a blue `o` marker.
///
/// ```ignore
/// info!("Serving on http://{}", addr);
/// ```
#[macro_export]
macro_rules! info {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "o".blue().bold(), std::format_args!($($arg)*));
  })
}

/// Prints a success line with a green check mark.
#[macro_export]
macro_rules! success {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "✓".green().bold(), std::format_args!($($arg)*));
  })
}

/// Prints an error line with a red `!` marker to stderr and exits with code 1.
///
/// Only for the CLI's fatal paths; library code returns [`error::Error`] instead.
///
/// ```ignore
/// error!("Cannot list devices: {}", e);
/// // not reached
/// ```
#[macro_export]
macro_rules! error {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    eprintln!("[{}] {}", "!".red().bold(), std::format_args!($($arg)*));
    std::process::exit(1);
  })
}

/// Prints a warning line with a yellow `!` marker.
#[macro_export]
macro_rules! warning {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "!".yellow().bold(), std::format_args!($($arg)*));
  })
}
