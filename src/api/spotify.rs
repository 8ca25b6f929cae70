use axum::{Json, extract::State, http::StatusCode};

use crate::{
    api::AppUser,
    error::Result,
    server::AppState,
    types::{AccessTokenBody, Device, PlayBody, TransferBody},
};

pub async fn token(
    State(app): State<AppState>,
    AppUser(user_id): AppUser,
) -> Result<Json<AccessTokenBody>> {
    let session = app.tokens.get_valid_session(&user_id).await?;
    Ok(Json(AccessTokenBody {
        access_token: session.access_token,
        expires_at: session.access_expires_at,
    }))
}

pub async fn transfer(
    State(app): State<AppState>,
    AppUser(user_id): AppUser,
    Json(body): Json<TransferBody>,
) -> Result<StatusCode> {
    app.playback.transfer(&user_id, &body.device_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn play(
    State(app): State<AppState>,
    AppUser(user_id): AppUser,
    Json(body): Json<PlayBody>,
) -> Result<StatusCode> {
    app.playback
        .play(&user_id, &body.device_id, &body.track_uri)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn devices(
    State(app): State<AppState>,
    AppUser(user_id): AppUser,
) -> Result<Json<Vec<Device>>> {
    Ok(Json(app.playback.devices(&user_id).await?))
}

pub async fn disconnect(
    State(app): State<AppState>,
    AppUser(user_id): AppUser,
) -> Result<StatusCode> {
    if app.tokens.disconnect(&user_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Ok(StatusCode::NOT_FOUND)
    }
}
