use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;

use crate::{api::AppUser, error::Result, server::AppState};

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// Starts a login for the calling user and redirects to the provider.
pub async fn login(State(app): State<AppState>, AppUser(user_id): AppUser) -> Result<Redirect> {
    let url = app.begin_login(&user_id).await?;
    Ok(Redirect::to(&url))
}

pub async fn callback(State(app): State<AppState>, Query(params): Query<CallbackParams>) -> Response {
    if let Some(error) = params.error {
        tracing::warn!(error = %error, "authorization denied");
        return page(StatusCode::BAD_REQUEST, "Authorization denied.");
    }
    let (Some(code), Some(state)) = (params.code, params.state) else {
        return page(StatusCode::BAD_REQUEST, "Missing authorization code.");
    };

    let login = match app.take_login(&state).await {
        Ok(login) => login,
        Err(e) => {
            tracing::warn!(error = %e, "callback for unknown login");
            return page(StatusCode::BAD_REQUEST, "Unknown or expired login.");
        }
    };

    let token = match app.accounts.exchange_code_pkce(&code, &login.code_verifier).await {
        Ok(token) => token,
        Err(e) => {
            tracing::warn!(user_id = %login.user_id, error = %e, "token exchange failed");
            return page(e.status_code(), "Login failed.");
        }
    };

    match app.tokens.connect(&login.user_id, &token).await {
        Ok(_) => Html("<h2>Authentication successful.</h2><p>You can close this window.</p>")
            .into_response(),
        Err(e) => {
            tracing::error!(user_id = %login.user_id, error = %e, "cannot store session");
            page(e.status_code(), "Login failed.")
        }
    }
}

fn page(status: StatusCode, message: &str) -> Response {
    (status, Html(format!("<h2>{}</h2>", message))).into_response()
}
