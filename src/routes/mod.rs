pub mod auth;
pub mod follow;
pub mod media;
pub mod posts;

use askama::Template;
use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::error::AppError;
use crate::extractors;
use crate::state::AppState;

/// The full application router with state attached.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(posts::router())
        .merge(follow::router())
        .merge(auth::router())
        .route("/media/{*path}", get(media::serve))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            not_found_with_viewer,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => html_body(StatusCode::OK, body),
            Err(e) => {
                tracing::error!("Template render error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

/// Render a template to a string, for responses that are also cached.
pub fn render<T: Template>(template: &T) -> Result<String, AppError> {
    template
        .render()
        .map_err(|e| AppError::Internal(format!("Template render error: {}", e)))
}

pub fn html_body(status: StatusCode, body: String) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        body,
    )
        .into_response()
}

#[derive(Template)]
#[template(path = "core/404.html")]
pub struct NotFoundTemplate {
    pub viewer: Option<String>,
}

/// Marks a response as the not-found page so it can be re-rendered for the
/// signed-in viewer.
#[derive(Debug, Clone, Copy)]
pub struct NotFoundPage;

/// The custom not-found page with a 404 status.
pub fn not_found_page(viewer: Option<String>) -> Response {
    let mut response = match (NotFoundTemplate { viewer }).render() {
        Ok(body) => html_body(StatusCode::NOT_FOUND, body),
        Err(e) => {
            tracing::error!("Template render error: {}", e);
            (StatusCode::NOT_FOUND, "Not found").into_response()
        }
    };
    response.extensions_mut().insert(NotFoundPage);
    response
}

async fn not_found() -> Response {
    not_found_page(None)
}

/// A 404 raised anywhere renders anonymously; re-render it for the signed-in
/// viewer.
async fn not_found_with_viewer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let headers = request.headers().clone();
    let response = next.run(request).await;
    if response.extensions().get::<NotFoundPage>().is_none() {
        return response;
    }

    match extractors::user_from_headers(&headers, &state) {
        Ok(Some(user)) => not_found_page(Some(user.username)),
        Ok(None) => response,
        Err(e) => {
            tracing::warn!("Session lookup for 404 page failed: {}", e);
            response
        }
    }
}
