use askama::Template;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::Router;

use crate::db::{follows, posts, users};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::feed::{FeedFilter, PageQuery};
use crate::routes::posts::{page_view, profile_url, Paginator, PostCard};
use crate::routes::Html;
use crate::state::AppState;

#[derive(Template)]
#[template(path = "posts/follow.html")]
pub struct FollowTemplate {
    pub viewer: Option<String>,
    pub posts: Vec<PostCard>,
    pub paginator: Paginator,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/follow/", get(follow_index))
        .route("/profile/{username}/follow/", get(profile_follow))
        .route("/profile/{username}/unfollow/", get(profile_unfollow))
}

/// Posts from every author the current user follows.
async fn follow_index(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<PageQuery>,
) -> AppResult<Html<FollowTemplate>> {
    let page = {
        let conn = state.db.get()?;
        posts::feed(
            &conn,
            &FeedFilter::FollowedBy(user.id.clone()),
            query.number(),
            state.config.feed.page_size,
        )?
    };
    let (posts, paginator) = page_view(page);

    Ok(Html(FollowTemplate {
        viewer: Some(user.username),
        posts,
        paginator,
    }))
}

async fn profile_follow(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(username): Path<String>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let author = users::find_by_username(&conn, &username)?.ok_or(AppError::NotFound)?;

    if follows::follow(&conn, &user.id, &author.id)? {
        tracing::info!("{} now follows {}", user.username, author.username);
    }

    Ok(Redirect::to(&profile_url(&author.username)).into_response())
}

async fn profile_unfollow(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(username): Path<String>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let author = users::find_by_username(&conn, &username)?.ok_or(AppError::NotFound)?;

    if follows::unfollow(&conn, &user.id, &author.id)? {
        tracing::info!("{} unfollowed {}", user.username, author.username);
    }

    Ok(Redirect::to(&profile_url(&author.username)).into_response())
}
