mod common;

use axum::http::header;
use common::*;
use quillpost::auth::session;
use quillpost::db::users;

fn set_cookie(response: &axum::response::Response) -> String {
    response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn user_with_password(app: &TestApp, username: &str, password: &str) {
    let hash = bcrypt::hash(password, 4).unwrap();
    users::create(&app.conn(), username, Some(&hash)).unwrap();
}

#[tokio::test]
async fn login_page_renders() {
    let app = TestApp::new();
    let response = app.get("/auth/login?next=/create/", None).await;
    assert_ok(&response);
    assert!(body_text(response).await.contains("name=\"password\""));
}

#[tokio::test]
async fn login_starts_session_and_follows_next() {
    let app = TestApp::new();
    user_with_password(&app, "alice", "correct horse");

    let response = app
        .post_form(
            "/auth/login",
            "username=alice&password=correct+horse&next=%2Fcreate%2F",
            None,
        )
        .await;

    assert_eq!(location(&response), "/create/");
    let cookie = set_cookie(&response);
    assert!(cookie.starts_with("quillpost_session="));

    let token = cookie
        .trim_start_matches("quillpost_session=")
        .split(';')
        .next()
        .unwrap()
        .to_string();
    let user = session::user_for_token(&app.conn(), &token).unwrap().unwrap();
    assert_eq!(user.username, "alice");

    let create = app
        .get("/create/", Some(&format!("quillpost_session={}", token)))
        .await;
    assert_ok(&create);
}

#[tokio::test]
async fn login_ignores_offsite_next() {
    let app = TestApp::new();
    user_with_password(&app, "alice", "correct horse");

    let response = app
        .post_form(
            "/auth/login",
            "username=alice&password=correct+horse&next=https%3A%2F%2Fevil.example%2F",
            None,
        )
        .await;

    assert_eq!(location(&response), "/");
}

#[tokio::test]
async fn wrong_password_rerenders_form() {
    let app = TestApp::new();
    user_with_password(&app, "alice", "correct horse");

    let response = app
        .post_form("/auth/login", "username=alice&password=nope", None)
        .await;

    assert_ok(&response);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
    let html = body_text(response).await;
    assert!(html.contains("Please enter a correct username and password."));
}

#[tokio::test]
async fn signup_creates_account_and_logs_in() {
    let app = TestApp::new();

    let response = app
        .post_form(
            "/auth/signup",
            "username=newbie&password=longenough&password_confirm=longenough",
            None,
        )
        .await;

    assert_eq!(location(&response), "/");
    assert!(set_cookie(&response).starts_with("quillpost_session="));
    assert!(users::exists(&app.conn(), "newbie").unwrap());
}

#[tokio::test]
async fn signup_rejects_taken_username() {
    let app = TestApp::new();
    app.user("alice");

    let response = app
        .post_form(
            "/auth/signup",
            "username=alice&password=longenough&password_confirm=longenough",
            None,
        )
        .await;

    assert_ok(&response);
    assert!(body_text(response)
        .await
        .contains("A user with that username already exists."));
}

#[tokio::test]
async fn logout_ends_session() {
    let app = TestApp::new();
    let (_, cookie) = app.login("alice");
    let token = cookie.trim_start_matches("quillpost_session=").to_string();

    let response = app.post_form("/auth/logout", "", Some(&cookie)).await;

    assert_eq!(location(&response), "/");
    assert!(set_cookie(&response).contains("Max-Age=0"));
    assert!(session::user_for_token(&app.conn(), &token).unwrap().is_none());

    let create = app.get("/create/", Some(&cookie)).await;
    assert_eq!(location(&create), "/auth/login?next=/create/");
}
