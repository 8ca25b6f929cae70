//! # CLI Module
//!
//! Command-line front end of listenlink. Every command loads [`Settings`] from
//! the environment, wires the same components the HTTP server uses, and prints
//! its result with the colored output macros.
//!
//! ## Commands
//!
//! ### Server
//!
//! - [`serve`] - runs the backend HTTP surface
//!
//! ### Account connection
//!
//! - [`auth`] - connects a user's provider account via the PKCE flow
//! - [`sessions`] - lists stored provider sessions
//! - [`logout`] - forgets a user's provider session
//!
//! ### Playback
//!
//! - [`token`] - prints a valid access credential, refreshing it if needed
//! - [`devices`] - lists the user's devices
//! - [`transfer`] - moves playback to a device
//! - [`play`] - starts a track on a device
//!
//! ## Usage
//!
//! ```bash
//! listenlink auth --user alice
//! listenlink devices --user alice
//! listenlink play --user alice --device <id> --track spotify:track:<id>
//! ```
//!
//! Failures end the process through the `error!` macro with a non-zero exit code.

mod auth;
mod playback;
mod serve;
mod sessions;

pub use auth::auth;
pub use playback::{devices, play, token, transfer};
pub use serve::serve;
pub use sessions::{logout, sessions};

use crate::{config::Settings, error, server::AppState};

fn settings() -> Settings {
    match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => error!("Invalid configuration: {}", e),
    }
}

fn app_state(settings: &Settings) -> AppState {
    match AppState::from_settings(settings) {
        Ok(state) => state,
        Err(e) => error!("Cannot set up provider clients: {}", e),
    }
}
