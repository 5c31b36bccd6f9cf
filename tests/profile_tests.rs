mod common;

use axum::http::StatusCode;
use common::{PASSWORD, body_text, location, spawn_app};

#[tokio::test]
async fn test_profile_page_shows_account() {
    let app = spawn_app().await;
    app.register_user("alice").await;
    let cookie = app.login_cookie("alice", PASSWORD).await;

    let response = app.get("/profile", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("cache-control").unwrap(),
        "no-store"
    );
    let body = body_text(response).await;
    assert!(body.contains("<strong>alice</strong>"));
    assert!(body.contains("alice@example.com"));
    assert!(body.contains(r##"value="#3b82f6""##));
}

#[tokio::test]
async fn test_change_display_name_and_color() {
    let app = spawn_app().await;
    app.register_user("alice").await;
    let cookie = app.login_cookie("alice", PASSWORD).await;

    let response = app
        .post_form(
            "/profile/update-display-name",
            Some(&cookie),
            &[("display_name", "  Queen Alice ")],
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.contains("Display name updated"));
    assert!(body.contains(r#"value="Queen Alice""#));

    let response = app
        .post_form(
            "/profile/update-display-name",
            Some(&cookie),
            &[("display_name", "alice")],
        )
        .await;
    assert!(
        body_text(response)
            .await
            .contains("Display name must be different from your username")
    );

    let response = app
        .post_form(
            "/profile/update-color",
            Some(&cookie),
            &[("profile_color", "#10b981")],
        )
        .await;
    assert!(body_text(response).await.contains("Color updated"));

    let response = app
        .post_form(
            "/profile/update-color",
            Some(&cookie),
            &[("profile_color", "red")],
        )
        .await;
    assert!(body_text(response).await.contains("Color must be a hex value"));

    // The navigation bar follows the stored profile on the next request.
    let body = body_text(app.get("/", Some(&cookie)).await).await;
    assert!(body.contains("Welcome back, Queen Alice."));
    assert!(body.contains("color: #10b981"));
}

#[tokio::test]
async fn test_change_email() {
    let app = spawn_app().await;
    app.register_user("alice").await;
    app.register_user("bob").await;
    let cookie = app.login_cookie("alice", PASSWORD).await;

    let response = app
        .post_form(
            "/profile/update-email",
            Some(&cookie),
            &[("email", "new@example.com"), ("current_password", "Wr0ng!Pass")],
        )
        .await;
    assert!(
        body_text(response)
            .await
            .contains("Current password is incorrect")
    );

    let response = app
        .post_form(
            "/profile/update-email",
            Some(&cookie),
            &[("email", "bob@example.com"), ("current_password", PASSWORD)],
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("already in use"));

    let response = app
        .post_form(
            "/profile/update-email",
            Some(&cookie),
            &[("email", "new@example.com"), ("current_password", PASSWORD)],
        )
        .await;
    let body = body_text(response).await;
    assert!(body.contains("Email updated"));
    assert!(body.contains("new@example.com"));

    // Reset links now go to the new address.
    app.post_form("/forgot", None, &[("email", "new@example.com")])
        .await;
    assert!(app.notifier.wait_for_token("new@example.com").await.is_some());
}

#[tokio::test]
async fn test_change_password_ends_sessions() {
    let app = spawn_app().await;
    app.register_user("alice").await;
    let cookie = app.login_cookie("alice", PASSWORD).await;
    let other_device = app.login_cookie("alice", PASSWORD).await;

    let response = app
        .post_form(
            "/profile/update-password",
            Some(&cookie),
            &[("current_password", "Wr0ng!Pass"), ("new_password", "N3w!Secret")],
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        body_text(response)
            .await
            .contains("Current password is incorrect")
    );

    let response = app
        .post_form(
            "/profile/update-password",
            Some(&cookie),
            &[("current_password", PASSWORD), ("new_password", "weak")],
        )
        .await;
    assert!(
        body_text(response)
            .await
            .contains("Password must be at least 8 characters")
    );

    let response = app
        .post_form(
            "/profile/update-password",
            Some(&cookie),
            &[("current_password", PASSWORD), ("new_password", "N3w!Secret")],
        )
        .await;
    assert_eq!(
        location(&response).as_deref(),
        Some("/login?password_changed=1")
    );

    for stale in [&cookie, &other_device] {
        let response = app.get("/profile", Some(stale)).await;
        assert_eq!(location(&response).as_deref(), Some("/login"));
    }

    app.login_cookie("alice", "N3w!Secret").await;
}
