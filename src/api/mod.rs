//! # API Module
//!
//! HTTP handlers of the listenlink backend. The router itself lives in
//! [`crate::server`].
//!
//! ## Endpoints
//!
//! ### Account connection
//!
//! - [`login`] - `GET /login`: starts the PKCE flow for the calling user and
//!   redirects to the provider's consent page.
//! - [`callback`] - `GET /callback`: completes the flow, exchanges the code and
//!   stores the user's provider session.
//!
//! ### Playback
//!
//! - [`token`] - `GET /api/spotify/token`: a valid access credential for the
//!   browser player.
//! - [`transfer`] - `PUT /api/spotify/transfer`: moves playback to a device.
//! - [`play`] - `PUT /api/spotify/play`: starts a track on a device.
//! - [`devices`] - `GET /api/spotify/devices`: devices known to the provider.
//! - [`disconnect`] - `DELETE /api/spotify/session`: forgets the provider session.
//!
//! ### Monitoring
//!
//! - [`health`] - `GET /health`: status and version.
//!
//! ## Identity
//!
//! Every route except `/health` and `/callback` acts for the user named in the
//! [`USER_HEADER`] header, which the application's session layer sets in front
//! of this service. See [`AppUser`].
//!
//! Failures are returned as `{"error": kind, "message": text}` with the status
//! code of the corresponding [`crate::error::Error`] variant.

mod callback;
mod health;
mod spotify;
mod user;

pub use callback::{callback, login};
pub use health::health;
pub use spotify::{devices, disconnect, play, token, transfer};
pub use user::{AppUser, USER_HEADER};
