use askama::Template;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Form;
use serde::Deserialize;

use crate::auth::{password, session};
use crate::db::users;
use crate::error::{AppError, AppResult};
use crate::routes::Html;
use crate::state::AppState;

const MAX_USERNAME_LEN: usize = 150;
const MIN_PASSWORD_LEN: usize = 8;

// -- Templates --

#[derive(Template)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub viewer: Option<String>,
    pub next: String,
    pub username: String,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "auth/signup.html")]
pub struct SignupTemplate {
    pub viewer: Option<String>,
    pub username: String,
    pub errors: Vec<String>,
}

// -- Request types --

#[derive(Deserialize, Default)]
pub struct NextQuery {
    #[serde(default)]
    pub next: String,
}

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub next: String,
}

#[derive(Deserialize)]
pub struct SignupForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_confirm: String,
}

// -- Login --

/// GET /auth/login: render the login form
pub async fn login_page(Query(query): Query<NextQuery>) -> Html<LoginTemplate> {
    Html(LoginTemplate {
        viewer: None,
        next: query.next,
        username: String::new(),
        error: None,
    })
}

/// POST /auth/login: verify credentials, then resume `next` with a fresh session
pub async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> AppResult<Response> {
    let username = form.username.trim().to_string();
    let credentials = {
        let conn = state.db.get()?;
        users::find_credentials(&conn, &username)?
    };

    let user = match credentials {
        Some((user, Some(hash))) => {
            let candidate = form.password.clone();
            let valid = tokio::task::spawn_blocking(move || {
                password::verify_password(&candidate, &hash)
            })
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;
            valid.then_some(user)
        }
        _ => None,
    };

    let Some(user) = user else {
        tracing::info!("Failed login for {:?}", username);
        return Ok(Html(LoginTemplate {
            viewer: None,
            next: form.next,
            username,
            error: Some("Please enter a correct username and password.".to_string()),
        })
        .into_response());
    };

    start_session(&state, &user.id, safe_next(&form.next))
}

// -- Signup --

pub async fn signup_page() -> Html<SignupTemplate> {
    Html(SignupTemplate {
        viewer: None,
        username: String::new(),
        errors: Vec::new(),
    })
}

pub async fn signup(State(state): State<AppState>, Form(form): Form<SignupForm>) -> AppResult<Response> {
    let username = form.username.trim().to_string();
    let mut errors = validate_signup(&username, &form.password, &form.password_confirm);

    if errors.is_empty() {
        let conn = state.db.get()?;
        if users::exists(&conn, &username)? {
            errors.push("A user with that username already exists.".to_string());
        }
    }

    if !errors.is_empty() {
        return Ok(Html(SignupTemplate {
            viewer: None,
            username,
            errors,
        })
        .into_response());
    }

    let plain = form.password.clone();
    let hash = tokio::task::spawn_blocking(move || password::hash_password(&plain))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let user = {
        let conn = state.db.get()?;
        users::create(&conn, &username, Some(&hash))?
    };
    tracing::info!("New account {}", user.username);

    start_session(&state, &user.id, "/")
}

// -- Logout --

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let cookie_name = &state.config.auth.cookie_name;
    if let Some(token) = session::get_cookie_value(&headers, cookie_name) {
        let conn = state.db.get()?;
        session::delete_session(&conn, token)?;
    }

    Ok((
        [(header::SET_COOKIE, session::clear_session_cookie(cookie_name))],
        Redirect::to("/"),
    )
        .into_response())
}

// -- Helpers --

fn start_session(state: &AppState, user_id: &str, redirect_to: &str) -> AppResult<Response> {
    let token = {
        let conn = state.db.get()?;
        session::create_session(&conn, user_id, state.config.auth.session_hours)?
    };
    let cookie = session::session_cookie(
        &state.config.auth.cookie_name,
        &token,
        state.config.auth.session_hours,
    );

    Ok(([(header::SET_COOKIE, cookie)], Redirect::to(redirect_to)).into_response())
}

/// Only same-site absolute paths are followed after login.
pub fn safe_next(next: &str) -> &str {
    if next.starts_with('/') && !next.starts_with("//") && !next.contains('\\') {
        next
    } else {
        "/"
    }
}

fn validate_signup(username: &str, password: &str, confirm: &str) -> Vec<String> {
    let mut errors = Vec::new();

    if username.is_empty() {
        errors.push("Username is required.".to_string());
    } else if username.chars().count() > MAX_USERNAME_LEN {
        errors.push(format!(
            "Username must be {} characters or fewer.",
            MAX_USERNAME_LEN
        ));
    } else if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "@.+-_".contains(c))
    {
        errors.push("Username may contain only letters, digits and @/./+/-/_.".to_string());
    }

    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(format!(
            "Password must be at least {} characters.",
            MIN_PASSWORD_LEN
        ));
    } else if password != confirm {
        errors.push("The two password fields didn't match.".to_string());
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_next_allows_local_paths() {
        assert_eq!(safe_next("/create/"), "/create/");
        assert_eq!(safe_next("/posts/1/edit/?x=1"), "/posts/1/edit/?x=1");
    }

    #[test]
    fn safe_next_rejects_offsite_targets() {
        assert_eq!(safe_next("https://evil.example/"), "/");
        assert_eq!(safe_next("//evil.example/"), "/");
        assert_eq!(safe_next("/\\evil.example"), "/");
        assert_eq!(safe_next(""), "/");
    }

    #[test]
    fn signup_validation_accepts_good_input() {
        assert!(validate_signup("alice_1", "longenough", "longenough").is_empty());
    }

    #[test]
    fn signup_validation_reports_problems() {
        assert_eq!(validate_signup("", "longenough", "longenough").len(), 1);
        assert_eq!(validate_signup("bad name", "longenough", "longenough").len(), 1);
        assert_eq!(validate_signup("alice", "short", "short").len(), 1);
        assert_eq!(validate_signup("alice", "longenough", "different").len(), 1);
    }
}
