mod common;

use std::time::{Duration, Instant};

use agora::services::AuthError;
use axum::http::StatusCode;
use common::{PASSWORD, body_text, location, session_cookie, spawn_app, spawn_app_with, test_config};

#[tokio::test]
async fn test_register_then_login() {
    let app = spawn_app().await;

    let response = app
        .register("alice", "alice@example.com", PASSWORD, "Alice A")
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response).as_deref(), Some("/login?registered=1"));

    let response = app.get("/login?registered=1", None).await;
    assert!(body_text(response).await.contains("Registration successful"));

    let cookie = app.login_cookie("alice", PASSWORD).await;

    let response = app.get("/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.contains("Welcome back, Alice A."));
    assert!(body.contains(r#"action="/logout""#));
}

#[tokio::test]
async fn test_register_rejects_invalid_input() {
    let app = spawn_app().await;

    let response = app
        .register("alice", "alice@example.com", "weakpass", "Alice A")
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.contains("Password must be at least 8 characters"));
    // The submitted values are kept in the form.
    assert!(body.contains(r#"value="alice@example.com""#));

    let response = app
        .register("alice", "not-an-email", PASSWORD, "Alice A")
        .await;
    assert!(body_text(response).await.contains("valid email address"));

    let response = app
        .register("alice", "alice@example.com", PASSWORD, "alice")
        .await;
    assert!(
        body_text(response)
            .await
            .contains("Display name must be different from your username")
    );

    let response = app.register("", "", "", "").await;
    assert!(body_text(response).await.contains("is required"));

    // None of the above created the account.
    let response = app.login("alice", PASSWORD).await;
    assert!(
        body_text(response)
            .await
            .contains("Invalid username or password")
    );
}

#[tokio::test]
async fn test_register_duplicate_username_and_email() {
    let app = spawn_app().await;
    app.register_user("alice").await;

    let response = app
        .register("alice", "other@example.com", PASSWORD, "Someone")
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("already in use"));

    let response = app
        .register("alice2", "alice@example.com", PASSWORD, "Someone")
        .await;
    assert!(body_text(response).await.contains("already in use"));
}

#[tokio::test]
async fn test_login_failures() {
    let app = spawn_app().await;
    app.register_user("alice").await;

    let response = app.login("alice", "Wr0ng!Pass").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(session_cookie(&response).is_none());
    let body = body_text(response).await;
    assert!(body.contains("Invalid username or password"));
    assert!(body.contains(r#"value="alice""#));

    // Unknown users get the same message.
    let response = app.login("nobody", PASSWORD).await;
    assert!(
        body_text(response)
            .await
            .contains("Invalid username or password")
    );

    let response = app.login("", "").await;
    assert!(
        body_text(response)
            .await
            .contains("Username and password are required")
    );
}

#[tokio::test]
async fn test_lockout_after_repeated_failures() {
    let (mut config, _) = test_config();
    config.security.auth_throttle.max_attempts = 3;
    config.security.auth_throttle.window_seconds = 60;
    config.security.auth_throttle.lockout_seconds = 2;
    let app = spawn_app_with(config).await;
    app.register_user("alice").await;

    for _ in 0..3 {
        let response = app.login("alice", "Wr0ng!Pass").await;
        assert!(session_cookie(&response).is_none());
    }

    // The right password is refused while the lock holds.
    let response = app.login("alice", PASSWORD).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("temporarily locked"));

    tokio::time::sleep(std::time::Duration::from_secs(3)).await;

    let cookie = app.login_cookie("alice", PASSWORD).await;
    let response = app.get("/profile", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_lockout_is_per_username() {
    let (mut config, _) = test_config();
    config.security.auth_throttle.max_attempts = 2;
    let app = spawn_app_with(config).await;
    app.register_user("alice").await;
    app.register_user("bob").await;

    for _ in 0..2 {
        app.login("alice", "Wr0ng!Pass").await;
    }

    let response = app.login("alice", PASSWORD).await;
    assert!(body_text(response).await.contains("temporarily locked"));

    app.login_cookie("bob", PASSWORD).await;
}

#[tokio::test]
async fn test_unknown_username_costs_a_password_check() {
    let (mut config, _) = test_config();
    config.security.argon2_memory_cost_kib = 19_456;
    config.security.argon2_time_cost = 2;
    config.security.auth_throttle.max_attempts = 100;
    let app = spawn_app_with(config).await;
    app.register_user("alice").await;
    let auth = app.state.auth();

    // Warm-up builds the stand-in hash once.
    let _ = auth.login("nobody", "Wr0ng!Pass", "127.0.0.1").await;

    let mut known = Duration::ZERO;
    let mut unknown = Duration::ZERO;
    for _ in 0..3 {
        let started = Instant::now();
        let result = auth.login("alice", "Wr0ng!Pass", "127.0.0.1").await;
        known += started.elapsed();
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));

        let started = Instant::now();
        let result = auth.login("nobody", "Wr0ng!Pass", "127.0.0.1").await;
        unknown += started.elapsed();
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    assert!(
        unknown * 3 >= known,
        "unknown user took {unknown:?}, known user took {known:?}"
    );
}

#[tokio::test]
async fn test_protected_routes_redirect_to_login() {
    let app = spawn_app().await;

    for uri in ["/profile", "/new-comment", "/chat"] {
        let response = app.get(uri, None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{uri}");
        assert_eq!(location(&response).as_deref(), Some("/login"), "{uri}");
    }

    let response = app.post_form("/comment", None, &[("text", "hi")]).await;
    assert_eq!(location(&response).as_deref(), Some("/login"));
}

#[tokio::test]
async fn test_logout_ends_session() {
    let app = spawn_app().await;
    app.register_user("alice").await;
    let cookie = app.login_cookie("alice", PASSWORD).await;

    let response = app.post_form("/logout", Some(&cookie), &[]).await;
    assert_eq!(location(&response).as_deref(), Some("/login"));

    let response = app.get("/profile", Some(&cookie)).await;
    assert_eq!(location(&response).as_deref(), Some("/login"));
}

#[tokio::test]
async fn test_login_page_redirects_signed_in_user() {
    let app = spawn_app().await;
    app.register_user("alice").await;
    let cookie = app.login_cookie("alice", PASSWORD).await;

    let response = app.get("/login", Some(&cookie)).await;
    assert_eq!(location(&response).as_deref(), Some("/"));
}

#[tokio::test]
async fn test_unknown_route_is_404_page() {
    let app = spawn_app().await;

    let response = app.get("/does-not-exist", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_text(response).await.contains("Route not found"));
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = spawn_app().await;

    let response = app.get("/api/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["database"], true);
}
