use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};

use crate::{types::ErrorBody, utils};

/// Header carrying the application's own user identity.
pub const USER_HEADER: &str = "x-user-id";

/// The calling user, taken from [`USER_HEADER`].
///
/// A missing header is rejected with 401 `unauthenticated`, a malformed one
/// with 400 `invalid_request`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppUser(pub String);

impl<S> FromRequestParts<S> for AppUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(USER_HEADER) else {
            return Err(unauthenticated());
        };
        let user_id = value
            .to_str()
            .map_err(|_| unauthenticated())?
            .trim()
            .to_string();
        if user_id.is_empty() {
            return Err(unauthenticated());
        }

        utils::validate_user_id(&user_id).map_err(IntoResponse::into_response)?;
        Ok(AppUser(user_id))
    }
}

fn unauthenticated() -> Response {
    let body = ErrorBody {
        error: "unauthenticated".to_string(),
        message: format!("missing {} header", USER_HEADER),
    };
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}
