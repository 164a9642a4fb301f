mod common;

use axum::http::StatusCode;
use common::*;
use quillpost::db::follows;
use quillpost::db::posts::{self, PostFields};

fn post_by(app: &TestApp, author_id: &str, text: &str) -> i64 {
    posts::create(
        &app.conn(),
        author_id,
        &PostFields {
            text: text.to_string(),
            group_id: None,
            image: None,
        },
    )
    .unwrap()
}

#[tokio::test]
async fn follow_and_unfollow_toggle_the_edge() {
    let app = TestApp::new();
    let (alice, cookie) = app.login("alice");
    let bob = app.user("bob");

    let response = app.get("/profile/bob/follow/", Some(&cookie)).await;
    assert_eq!(location(&response), "/profile/bob/");
    assert_eq!(follows::count(&app.conn()).unwrap(), 1);
    assert!(follows::is_following(&app.conn(), &alice.id, &bob.id).unwrap());

    let again = app.get("/profile/bob/follow/", Some(&cookie)).await;
    assert_eq!(location(&again), "/profile/bob/");
    assert_eq!(follows::count(&app.conn()).unwrap(), 1);

    let response = app.get("/profile/bob/unfollow/", Some(&cookie)).await;
    assert_eq!(location(&response), "/profile/bob/");
    assert_eq!(follows::count(&app.conn()).unwrap(), 0);

    let again = app.get("/profile/bob/unfollow/", Some(&cookie)).await;
    assert_eq!(location(&again), "/profile/bob/");
    assert_eq!(follows::count(&app.conn()).unwrap(), 0);
}

#[tokio::test]
async fn following_yourself_is_ignored() {
    let app = TestApp::new();
    let (_, cookie) = app.login("alice");

    let response = app.get("/profile/alice/follow/", Some(&cookie)).await;
    assert_eq!(location(&response), "/profile/alice/");
    assert_eq!(follows::count(&app.conn()).unwrap(), 0);
}

#[tokio::test]
async fn follow_feed_shows_only_followed_authors() {
    let app = TestApp::new();
    let (alice, alice_cookie) = app.login("alice");
    let (_, carol_cookie) = app.login("carol");
    let bob = app.user("bob");
    follows::follow(&app.conn(), &alice.id, &bob.id).unwrap();

    post_by(&app, &bob.id, "from bob");

    let alice_feed = body_text(app.get("/follow/", Some(&alice_cookie)).await).await;
    assert_eq!(card_count(&alice_feed), 1);
    assert!(alice_feed.contains("from bob"));

    let carol_feed = body_text(app.get("/follow/", Some(&carol_cookie)).await).await;
    assert_eq!(card_count(&carol_feed), 0);
    assert!(!carol_feed.contains("from bob"));
}

#[tokio::test]
async fn follow_feed_paginates() {
    let app = TestApp::new();
    let (alice, cookie) = app.login("alice");
    let bob = app.user("bob");
    follows::follow(&app.conn(), &alice.id, &bob.id).unwrap();
    for i in 0..13 {
        post_by(&app, &bob.id, &format!("post {}", i));
    }

    let first = body_text(app.get("/follow/", Some(&cookie)).await).await;
    assert_eq!(card_count(&first), 10);
    let second = body_text(app.get("/follow/?page=2", Some(&cookie)).await).await;
    assert_eq!(card_count(&second), 3);
}

#[tokio::test]
async fn anonymous_follow_routes_redirect_to_login() {
    let app = TestApp::new();
    app.user("bob");

    for path in ["/follow/", "/profile/bob/follow/", "/profile/bob/unfollow/"] {
        let response = app.get(path, None).await;
        assert_eq!(location(&response), format!("/auth/login?next={}", path));
    }
    assert_eq!(follows::count(&app.conn()).unwrap(), 0);
}

#[tokio::test]
async fn following_unknown_user_is_404() {
    let app = TestApp::new();
    let (_, cookie) = app.login("alice");

    let response = app.get("/profile/nobody/follow/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let response = app.get("/profile/nobody/unfollow/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn profile_shows_follow_button_to_other_users_only() {
    let app = TestApp::new();
    let (alice, alice_cookie) = app.login("alice");
    let bob = app.user("bob");

    let own = body_text(app.get("/profile/alice/", Some(&alice_cookie)).await).await;
    assert!(!own.contains("/profile/alice/follow/"));

    let guest = body_text(app.get("/profile/bob/", None).await).await;
    assert!(!guest.contains("/profile/bob/follow/"));

    let before = body_text(app.get("/profile/bob/", Some(&alice_cookie)).await).await;
    assert!(before.contains("/profile/bob/follow/"));

    follows::follow(&app.conn(), &alice.id, &bob.id).unwrap();
    let after = body_text(app.get("/profile/bob/", Some(&alice_cookie)).await).await;
    assert!(after.contains("/profile/bob/unfollow/"));
}
