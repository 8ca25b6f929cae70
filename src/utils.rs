use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

const TRACK_URI_PREFIX: &str = "spotify:track:";
const TRACK_ID_LEN: usize = 22;
const MAX_ID_LEN: usize = 128;

pub fn generate_code_verifier() -> String {
    random_alphanumeric(128)
}

pub fn generate_code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Opaque value for the OAuth `state` parameter.
pub fn generate_state() -> String {
    random_alphanumeric(32)
}

fn random_alphanumeric(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

pub fn is_track_id(id: &str) -> bool {
    id.len() == TRACK_ID_LEN && id.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Checks `spotify:track:<22 alphanumerics>` and returns the track id.
pub fn validate_track_uri(uri: &str) -> Result<&str> {
    match uri.strip_prefix(TRACK_URI_PREFIX) {
        Some(id) if is_track_id(id) => Ok(id),
        _ => Err(Error::InvalidRequest(format!(
            "'{}' is not a track URI",
            uri
        ))),
    }
}

pub fn validate_device_id(device_id: &str) -> Result<()> {
    let valid = !device_id.is_empty()
        && device_id.len() <= MAX_ID_LEN
        && device_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidRequest(format!(
            "'{}' is not a device id",
            device_id
        )))
    }
}

/// User ids double as storage keys, so they are restricted to a file-name safe set.
pub fn validate_user_id(user_id: &str) -> Result<()> {
    let valid = !user_id.is_empty()
        && user_id.len() <= MAX_ID_LEN
        && !user_id.starts_with('.')
        && user_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'));
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidRequest(format!("'{}' is not a user id", user_id)))
    }
}

/// Extracts the track id from a shared track reference.
///
/// Accepts track URIs (`spotify:track:<id>`) and open.spotify.com links, with or
/// without a locale segment (`/intl-de/track/<id>`) and query string.
pub fn track_id_from_reference(reference: &str) -> Option<String> {
    let reference = reference.trim();
    if let Ok(id) = validate_track_uri(reference) {
        return Some(id.to_string());
    }

    let rest = reference
        .strip_prefix("https://")
        .or_else(|| reference.strip_prefix("http://"))?;
    let rest = rest.strip_prefix("open.spotify.com/")?;
    let path = rest.split(['?', '#']).next().unwrap_or_default();

    let mut segments = path.split('/').filter(|s| !s.is_empty());
    let mut kind = segments.next()?;
    if kind.starts_with("intl-") {
        kind = segments.next()?;
    }
    if kind != "track" {
        return None;
    }

    segments
        .next()
        .filter(|id| is_track_id(id))
        .map(str::to_string)
}

pub fn track_uri(track_id: &str) -> String {
    format!("{}{}", TRACK_URI_PREFIX, track_id)
}
