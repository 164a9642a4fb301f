use askama::Template;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use chrono::{NaiveDateTime, Utc};

use crate::db::models::{Comment, Group, Post};
use crate::db::{comments, groups, posts, users};
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::feed::{FeedFilter, Page, PageQuery};
use crate::forms::{CommentForm, FormErrors, PostForm};
use crate::media;
use crate::routes::{html_body, render, Html};
use crate::state::AppState;

// --- View structs ---

pub struct PostCard {
    pub id: i64,
    pub text: String,
    pub author: String,
    pub pub_date: String,
    pub group_slug: Option<String>,
    pub group_title: String,
    pub image_url: Option<String>,
}

impl From<Post> for PostCard {
    fn from(post: Post) -> Self {
        let image_url = post
            .has_image()
            .then(|| format!("/media/{}", post.image));
        let (group_slug, group_title) = match post.group {
            Some(g) => (Some(g.slug), g.title),
            None => (None, String::new()),
        };
        Self {
            id: post.id,
            pub_date: parse_and_format_time(&post.pub_date),
            text: post.text,
            author: post.author_username,
            group_slug,
            group_title,
            image_url,
        }
    }
}

pub struct CommentView {
    pub author: String,
    pub text: String,
    pub created: String,
}

impl From<Comment> for CommentView {
    fn from(comment: Comment) -> Self {
        Self {
            author: comment
                .author_username
                .unwrap_or_else(|| "deleted".to_string()),
            created: parse_and_format_time(&comment.created),
            text: comment.text,
        }
    }
}

/// Numbers the paginator links need, flattened for the templates.
pub struct Paginator {
    pub number: u32,
    pub num_pages: u32,
    pub has_previous: bool,
    pub has_next: bool,
    pub previous: u32,
    pub next: u32,
}

impl<T> From<&Page<T>> for Paginator {
    fn from(page: &Page<T>) -> Self {
        Self {
            number: page.number,
            num_pages: page.num_pages(),
            has_previous: page.has_previous(),
            has_next: page.has_next(),
            previous: page.previous_number(),
            next: page.next_number(),
        }
    }
}

/// Split a page of posts into cards plus paginator for rendering.
pub fn page_view(page: Page<Post>) -> (Vec<PostCard>, Paginator) {
    let paginator = Paginator::from(&page);
    let cards = page.items.into_iter().map(PostCard::from).collect();
    (cards, paginator)
}

pub struct GroupOption {
    pub id: i64,
    pub title: String,
    pub selected: bool,
}

fn group_options(groups: &[Group], selected: Option<i64>) -> Vec<GroupOption> {
    groups
        .iter()
        .map(|g| GroupOption {
            id: g.id,
            title: g.title.clone(),
            selected: Some(g.id) == selected,
        })
        .collect()
}

// --- Templates ---

#[derive(Template)]
#[template(path = "posts/index.html")]
pub struct IndexTemplate {
    pub viewer: Option<String>,
    pub posts: Vec<PostCard>,
    pub paginator: Paginator,
}

#[derive(Template)]
#[template(path = "posts/group_list.html")]
pub struct GroupTemplate {
    pub viewer: Option<String>,
    pub group: Group,
    pub posts: Vec<PostCard>,
    pub paginator: Paginator,
}

#[derive(Template)]
#[template(path = "posts/profile.html")]
pub struct ProfileTemplate {
    pub viewer: Option<String>,
    pub author: String,
    pub post_count: i64,
    pub following: bool,
    pub can_follow: bool,
    pub posts: Vec<PostCard>,
    pub paginator: Paginator,
}

#[derive(Template)]
#[template(path = "posts/post_detail.html")]
pub struct PostDetailTemplate {
    pub viewer: Option<String>,
    pub post: PostCard,
    pub author_post_count: i64,
    pub can_edit: bool,
    pub comments: Vec<CommentView>,
}

#[derive(Template)]
#[template(path = "posts/post_create.html")]
pub struct PostFormTemplate {
    pub viewer: Option<String>,
    pub is_edit: bool,
    pub action: String,
    pub text: String,
    pub groups: Vec<GroupOption>,
    pub errors: FormErrors,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/group/{slug}/", get(group_posts))
        .route("/profile/{username}/", get(profile))
        .route("/posts/{id}/", get(post_detail))
        .route("/create/", get(create_page).post(create_post))
        .route("/posts/{id}/edit/", get(edit_page).post(edit_post))
        .route("/posts/{id}/delete/", post(delete_post))
        .route("/posts/{id}/comment/", post(add_comment))
}

// --- Handlers ---

/// Global feed. The rendered body is served from the page cache while fresh.
async fn index(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Query(query): Query<PageQuery>,
) -> AppResult<Response> {
    let viewer = viewer.username();
    let key = index_cache_key(query.number(), viewer.as_deref());

    if let Some(body) = state.page_cache.lock().await.get(&key) {
        return Ok(html_body(StatusCode::OK, body));
    }

    let page = {
        let conn = state.db.get()?;
        posts::feed(
            &conn,
            &FeedFilter::All,
            query.number(),
            state.config.feed.page_size,
        )?
    };
    let (posts, paginator) = page_view(page);
    let body = render(&IndexTemplate {
        viewer,
        posts,
        paginator,
    })?;

    state.page_cache.lock().await.insert(key, body.clone());
    Ok(html_body(StatusCode::OK, body))
}

async fn group_posts(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<Html<GroupTemplate>> {
    let conn = state.db.get()?;
    let group = groups::find_by_slug(&conn, &slug)?.ok_or(AppError::NotFound)?;
    let page = posts::feed(
        &conn,
        &FeedFilter::Group(group.slug.clone()),
        query.number(),
        state.config.feed.page_size,
    )?;
    let (posts, paginator) = page_view(page);

    Ok(Html(GroupTemplate {
        viewer: viewer.username(),
        group,
        posts,
        paginator,
    }))
}

async fn profile(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<Html<ProfileTemplate>> {
    let conn = state.db.get()?;
    let author = users::find_by_username(&conn, &username)?.ok_or(AppError::NotFound)?;
    let post_count = posts::count_by_author(&conn, &author.id)?;

    let (following, can_follow) = match &viewer {
        Some(v) if v.id != author.id => (
            crate::db::follows::is_following(&conn, &v.id, &author.id)?,
            true,
        ),
        _ => (false, false),
    };

    let page = posts::feed(
        &conn,
        &FeedFilter::Author(author.username.clone()),
        query.number(),
        state.config.feed.page_size,
    )?;
    let (posts, paginator) = page_view(page);

    Ok(Html(ProfileTemplate {
        viewer: viewer.map(|v| v.username),
        author: author.username,
        post_count,
        following,
        can_follow,
        posts,
        paginator,
    }))
}

async fn post_detail(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(id): Path<String>,
) -> AppResult<Html<PostDetailTemplate>> {
    let post_id = parse_post_id(&id)?;
    let conn = state.db.get()?;
    let post = posts::find_by_id(&conn, post_id)?.ok_or(AppError::NotFound)?;
    let author_post_count = posts::count_by_author(&conn, &post.author_id)?;
    let comments = comments::for_post(&conn, post_id)?
        .into_iter()
        .map(CommentView::from)
        .collect();

    let can_edit = viewer.as_ref().map(|v| v.id == post.author_id).unwrap_or(false);

    Ok(Html(PostDetailTemplate {
        viewer: viewer.map(|v| v.username),
        post: PostCard::from(post),
        author_post_count,
        can_edit,
        comments,
    }))
}

async fn create_page(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Html<PostFormTemplate>> {
    let groups = {
        let conn = state.db.get()?;
        groups::list(&conn)?
    };

    Ok(Html(PostFormTemplate {
        viewer: Some(user.username),
        is_edit: false,
        action: "/create/".to_string(),
        text: String::new(),
        groups: group_options(&groups, None),
        errors: FormErrors::default(),
    }))
}

async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    form: PostForm,
) -> AppResult<Response> {
    let groups = {
        let conn = state.db.get()?;
        groups::list(&conn)?
    };

    let mut fields = match form.validate(&groups) {
        Ok(fields) => fields,
        Err(errors) => {
            return Ok(Html(PostFormTemplate {
                viewer: Some(user.username),
                is_edit: false,
                action: "/create/".to_string(),
                text: form.text.clone(),
                groups: group_options(&groups, form.selected_group()),
                errors,
            })
            .into_response());
        }
    };

    let uploads = state.config.uploads_path();
    if let Some(image) = &form.image {
        let path = media::save_post_image(&uploads, &image.filename, &image.data).await?;
        fields.image = Some(path);
    }

    let created = state
        .db
        .get()
        .map_err(AppError::from)
        .and_then(|conn| Ok(posts::create(&conn, &user.id, &fields)?));
    let post_id = match created {
        Ok(id) => id,
        Err(e) => {
            discard_upload(&uploads, &fields).await;
            return Err(e);
        }
    };
    tracing::info!("{} created post {}", user.username, post_id);

    Ok(Redirect::to(&profile_url(&user.username)).into_response())
}

async fn edit_page(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let post_id = parse_post_id(&id)?;
    let conn = state.db.get()?;
    let post = posts::find_by_id(&conn, post_id)?.ok_or(AppError::NotFound)?;

    if post.author_id != user.id {
        return Ok(Redirect::to(&detail_url(post_id)).into_response());
    }

    let groups = groups::list(&conn)?;
    let selected = post.group.as_ref().map(|g| g.id);

    Ok(Html(PostFormTemplate {
        viewer: Some(user.username),
        is_edit: true,
        action: format!("/posts/{}/edit/", post_id),
        text: post.text,
        groups: group_options(&groups, selected),
        errors: FormErrors::default(),
    })
    .into_response())
}

/// Only the author may change a post; anyone else lands back on the detail
/// page with the post untouched.
async fn edit_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    form: PostForm,
) -> AppResult<Response> {
    let post_id = parse_post_id(&id)?;
    let (post, groups) = {
        let conn = state.db.get()?;
        let post = posts::find_by_id(&conn, post_id)?.ok_or(AppError::NotFound)?;
        (post, groups::list(&conn)?)
    };

    if post.author_id != user.id {
        tracing::warn!("{} tried to edit post {} they do not own", user.username, post_id);
        return Ok(Redirect::to(&detail_url(post_id)).into_response());
    }

    let mut fields = match form.validate(&groups) {
        Ok(fields) => fields,
        Err(errors) => {
            return Ok(Html(PostFormTemplate {
                viewer: Some(user.username),
                is_edit: true,
                action: format!("/posts/{}/edit/", post_id),
                text: form.text.clone(),
                groups: group_options(&groups, form.selected_group()),
                errors,
            })
            .into_response());
        }
    };

    let uploads = state.config.uploads_path();
    if let Some(image) = &form.image {
        let path = media::save_post_image(&uploads, &image.filename, &image.data).await?;
        fields.image = Some(path);
    }

    let updated = state
        .db
        .get()
        .map_err(AppError::from)
        .and_then(|conn| Ok(posts::update(&conn, post_id, &fields)?));
    if let Err(e) = updated {
        discard_upload(&uploads, &fields).await;
        return Err(e);
    }
    tracing::info!("{} edited post {}", user.username, post_id);

    Ok(Redirect::to(&detail_url(post_id)).into_response())
}

async fn delete_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let post_id = parse_post_id(&id)?;
    let conn = state.db.get()?;
    let post = posts::find_by_id(&conn, post_id)?.ok_or(AppError::NotFound)?;

    if post.author_id != user.id {
        return Ok(Redirect::to(&detail_url(post_id)).into_response());
    }

    posts::delete(&conn, post_id)?;
    tracing::info!("{} deleted post {}", user.username, post_id);

    Ok(Redirect::to(&profile_url(&user.username)).into_response())
}

async fn add_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Form(form): Form<CommentForm>,
) -> AppResult<Response> {
    let post_id = parse_post_id(&id)?;
    let conn = state.db.get()?;
    posts::find_by_id(&conn, post_id)?.ok_or(AppError::NotFound)?;

    match form.validate() {
        Ok(text) => {
            comments::create(&conn, post_id, &user.id, &text)?;
        }
        Err(_) => {
            tracing::debug!("Empty comment on post {} from {} ignored", post_id, user.username);
        }
    }

    Ok(Redirect::to(&detail_url(post_id)).into_response())
}

// --- Helpers ---

/// The global feed differs only by page number and by who is looking.
fn index_cache_key(page: u32, viewer: Option<&str>) -> String {
    format!("page={}|{}", page, viewer.unwrap_or(""))
}

async fn discard_upload(uploads: &std::path::Path, fields: &posts::PostFields) {
    if let Some(path) = &fields.image {
        media::discard(uploads, path).await;
    }
}

/// Post ids in paths that are not integers name no post.
fn parse_post_id(raw: &str) -> AppResult<i64> {
    raw.parse().map_err(|_| AppError::NotFound)
}

pub fn detail_url(post_id: i64) -> String {
    format!("/posts/{}/", post_id)
}

pub fn profile_url(username: &str) -> String {
    format!("/profile/{}/", username)
}

// --- Time formatting ---

fn parse_and_format_time(db_time: &str) -> String {
    NaiveDateTime::parse_from_str(db_time, "%Y-%m-%d %H:%M:%S")
        .map(|dt| format_relative_time(&dt))
        .unwrap_or_else(|_| db_time.to_string())
}

pub fn format_relative_time(dt: &NaiveDateTime) -> String {
    let now = Utc::now().naive_utc();
    let diff = now.signed_duration_since(*dt);

    let seconds = diff.num_seconds();
    if seconds < 60 {
        return "just now".to_string();
    }

    let minutes = diff.num_minutes();
    if minutes < 60 {
        return format!("{}m ago", minutes);
    }

    let hours = diff.num_hours();
    if hours < 24 {
        return format!("{}h ago", hours);
    }

    let days = diff.num_days();
    if days < 7 {
        return format!("{}d ago", days);
    }

    dt.format("%b %-d, %Y").to_string()
}

// --- Tests ---

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::GroupRef;
    use chrono::NaiveDate;

    #[test]
    fn format_relative_time_just_now() {
        let now = Utc::now().naive_utc();
        assert_eq!(format_relative_time(&now), "just now");
    }

    #[test]
    fn format_relative_time_hours() {
        let dt = Utc::now().naive_utc() - chrono::Duration::hours(3);
        assert_eq!(format_relative_time(&dt), "3h ago");
    }

    #[test]
    fn format_relative_time_old_date() {
        let dt = NaiveDate::from_ymd_opt(2025, 1, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        assert_eq!(format_relative_time(&dt), "Jan 15, 2025");
    }

    #[test]
    fn parse_and_format_bad_input_returns_raw() {
        assert_eq!(parse_and_format_time("not-a-date"), "not-a-date");
    }

    #[test]
    fn post_card_links_image_and_group() {
        let card = PostCard::from(Post {
            id: 7,
            text: "hello".into(),
            pub_date: "2025-01-15 12:00:00".into(),
            author_id: "u1".into(),
            author_username: "alice".into(),
            group: Some(GroupRef {
                id: 1,
                slug: "cats".into(),
                title: "Cats".into(),
            }),
            image: "posts/small.gif".into(),
        });
        assert_eq!(card.image_url.as_deref(), Some("/media/posts/small.gif"));
        assert_eq!(card.group_slug.as_deref(), Some("cats"));
        assert_eq!(card.pub_date, "Jan 15, 2025");
    }

    #[test]
    fn group_options_mark_selection() {
        let groups = vec![
            Group {
                id: 1,
                title: "Cats".into(),
                slug: "cats".into(),
                description: String::new(),
            },
            Group {
                id: 2,
                title: "Dogs".into(),
                slug: "dogs".into(),
                description: String::new(),
            },
        ];
        let options = group_options(&groups, Some(2));
        assert!(!options[0].selected);
        assert!(options[1].selected);
    }

    #[test]
    fn index_cache_key_ignores_unrelated_query() {
        assert_eq!(index_cache_key(1, None), "page=1|");
        assert_eq!(index_cache_key(2, Some("alice")), "page=2|alice");
    }

    #[test]
    fn non_numeric_post_id_is_not_found() {
        assert!(matches!(parse_post_id("abc"), Err(AppError::NotFound)));
        assert_eq!(parse_post_id("12").unwrap(), 12);
    }
}
