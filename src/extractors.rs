use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use crate::auth::session;
use crate::error::AppError;
use crate::state::AppState;

/// Represents the currently authenticated user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: String,
    pub username: String,
}

/// Extractor that requires authentication.
/// Without a valid session the request is redirected to the login page, with
/// the original path and query carried in `next`.
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match lookup_session(parts, state)? {
            Some(user) => Ok(user),
            None => Err(AppError::LoginRequired {
                next: request_path(parts),
            }),
        }
    }
}

/// Optional user extractor. Yields None instead of redirecting when not
/// authenticated.
pub struct MaybeUser(pub Option<CurrentUser>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(lookup_session(parts, state)?))
    }
}

impl MaybeUser {
    pub fn username(&self) -> Option<String> {
        self.0.as_ref().map(|u| u.username.clone())
    }
}

fn lookup_session(parts: &Parts, state: &AppState) -> Result<Option<CurrentUser>, AppError> {
    user_from_headers(&parts.headers, state)
}

/// Resolve the session cookie in `headers` to its user, if any.
pub fn user_from_headers(
    headers: &HeaderMap,
    state: &AppState,
) -> Result<Option<CurrentUser>, AppError> {
    let Some(token) = session::get_cookie_value(headers, &state.config.auth.cookie_name) else {
        return Ok(None);
    };

    let conn = state.db.get()?;
    let user = session::user_for_token(&conn, token)?;
    Ok(user.map(|u| CurrentUser {
        id: u.id,
        username: u.username,
    }))
}

fn request_path(parts: &Parts) -> String {
    parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string())
}
