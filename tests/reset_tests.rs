mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use agora::api::reset::FORGOT_CONFIRMATION;
use agora::models::user::SessionUser;
use agora::services::Maintenance;
use axum::http::StatusCode;
use common::{
    PASSWORD, RecordingNotifier, TestApp, body_text, location, spawn_app, spawn_app_with,
    spawn_app_with_notifier, test_config,
};

const NEW_PASSWORD: &str = "N3w!Secret";

async fn request_token(app: &TestApp, email: &str) -> String {
    let response = app.post_form("/forgot", None, &[("email", email)]).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains(FORGOT_CONFIRMATION));

    app.notifier
        .wait_for_token(email)
        .await
        .expect("a reset token should have been delivered")
}

#[tokio::test]
async fn test_full_reset_flow() {
    let app = spawn_app().await;
    app.register_user("alice").await;

    let token = request_token(&app, "alice@example.com").await;
    assert_eq!(token.len(), 64);

    let response = app
        .get(&format!("/reset-password?token={token}"), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        body_text(response)
            .await
            .contains(&format!(r#"name="token" value="{token}""#))
    );

    let response = app
        .post_form(
            "/reset-password",
            None,
            &[("token", &token), ("password", NEW_PASSWORD)],
        )
        .await;
    assert_eq!(location(&response).as_deref(), Some("/login?reset=1"));

    let response = app.login("alice", PASSWORD).await;
    assert!(
        body_text(response)
            .await
            .contains("Invalid username or password")
    );
    app.login_cookie("alice", NEW_PASSWORD).await;
}

#[tokio::test]
async fn test_token_is_single_use() {
    let app = spawn_app().await;
    app.register_user("alice").await;
    let token = request_token(&app, "alice@example.com").await;

    let response = app
        .post_form(
            "/reset-password",
            None,
            &[("token", &token), ("password", NEW_PASSWORD)],
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let response = app
        .post_form(
            "/reset-password",
            None,
            &[("token", &token), ("password", "An0ther!Pass")],
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("invalid or has expired"));

    let response = app
        .get(&format!("/reset-password?token={token}"), None)
        .await;
    assert!(body_text(response).await.contains("invalid or has expired"));

    app.login_cookie("alice", NEW_PASSWORD).await;
}

#[tokio::test]
async fn test_weak_password_keeps_token_usable() {
    let app = spawn_app().await;
    app.register_user("alice").await;
    let token = request_token(&app, "alice@example.com").await;

    let response = app
        .post_form(
            "/reset-password",
            None,
            &[("token", &token), ("password", "short")],
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        body_text(response)
            .await
            .contains("Password must be at least 8 characters")
    );

    let response = app
        .post_form(
            "/reset-password",
            None,
            &[("token", &token), ("password", NEW_PASSWORD)],
        )
        .await;
    assert_eq!(location(&response).as_deref(), Some("/login?reset=1"));
}

#[tokio::test]
async fn test_unknown_email_gets_same_confirmation() {
    let app = spawn_app().await;
    app.register_user("alice").await;

    let response = app
        .post_form("/forgot", None, &[("email", "nobody@example.com")])
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains(FORGOT_CONFIRMATION));
    assert_eq!(app.notifier.count(), 0);

    let response = app
        .post_form("/forgot", None, &[("email", "not an email")])
        .await;
    let body = body_text(response).await;
    assert!(body.contains("valid email address"));
    assert!(!body.contains(FORGOT_CONFIRMATION));
}

#[tokio::test]
async fn test_slow_mail_relay_does_not_delay_forgot() {
    let (config, _) = test_config();
    let app =
        spawn_app_with_notifier(config, RecordingNotifier::delayed(Duration::from_millis(1500)))
            .await;
    app.register_user("alice").await;

    for email in ["alice@example.com", "nobody@example.com"] {
        let started = Instant::now();
        let response = app.post_form("/forgot", None, &[("email", email)]).await;
        assert!(body_text(response).await.contains(FORGOT_CONFIRMATION));
        assert!(started.elapsed() < Duration::from_millis(1000));
    }

    assert_eq!(app.notifier.count(), 0);
    tokio::time::sleep(Duration::from_millis(1800)).await;
    assert_eq!(app.notifier.count(), 1);
    assert!(app.notifier.last_token_for("alice@example.com").is_some());
}

#[tokio::test]
async fn test_unknown_token_is_rejected() {
    let app = spawn_app().await;

    let response = app.get("/reset-password?token=deadbeef", None).await;
    assert!(body_text(response).await.contains("invalid or has expired"));

    let response = app
        .post_form(
            "/reset-password",
            None,
            &[("token", ""), ("password", NEW_PASSWORD)],
        )
        .await;
    assert!(body_text(response).await.contains("invalid or has expired"));
}

#[tokio::test]
async fn test_expired_token_is_rejected_and_pruned() {
    let (mut config, _) = test_config();
    config.reset.token_ttl_seconds = 1;
    let maintenance_config = config.maintenance.clone();
    let app = spawn_app_with(config).await;
    app.register_user("alice").await;
    let token = request_token(&app, "alice@example.com").await;

    tokio::time::sleep(std::time::Duration::from_secs(2)).await;

    let response = app
        .post_form(
            "/reset-password",
            None,
            &[("token", &token), ("password", NEW_PASSWORD)],
        )
        .await;
    assert!(body_text(response).await.contains("invalid or has expired"));

    let mut maintenance_config = maintenance_config;
    maintenance_config.reset_token_retention_hours = 0;
    let maintenance = Maintenance::new(Arc::clone(app.state.resets()), maintenance_config);
    assert_eq!(maintenance.run_once().await.unwrap(), 1);
    assert_eq!(maintenance.run_once().await.unwrap(), 0);
}

#[tokio::test]
async fn test_reset_signs_out_existing_sessions() {
    let app = spawn_app().await;
    app.register_user("alice").await;
    let cookie = app.login_cookie("alice", PASSWORD).await;

    let user = app
        .state
        .store()
        .get_user_by_username("alice")
        .await
        .unwrap()
        .unwrap();
    let session = SessionUser::for_user(&user);
    let mut chat = app.state.chat().join(user.into(), session).await.unwrap();

    let token = request_token(&app, "alice@example.com").await;
    app.post_form(
        "/reset-password",
        None,
        &[("token", &token), ("password", NEW_PASSWORD)],
    )
    .await;

    // The open chat connection is dropped too.
    assert!(chat.events.recv().await.is_some());
    assert!(chat.events.recv().await.is_none());
    assert_eq!(app.state.chat().active_connections(), 0);

    let response = app.get("/profile", Some(&cookie)).await;
    assert_eq!(location(&response).as_deref(), Some("/login"));
}

#[tokio::test]
async fn test_reset_lifts_lockout() {
    let (mut config, _) = test_config();
    config.security.auth_throttle.max_attempts = 2;
    let app = spawn_app_with(config).await;
    app.register_user("alice").await;

    for _ in 0..2 {
        app.login("alice", "Wr0ng!Pass").await;
    }
    let response = app.login("alice", PASSWORD).await;
    assert!(body_text(response).await.contains("temporarily locked"));

    let token = request_token(&app, "alice@example.com").await;
    app.post_form(
        "/reset-password",
        None,
        &[("token", &token), ("password", NEW_PASSWORD)],
    )
    .await;

    app.login_cookie("alice", NEW_PASSWORD).await;
}

#[tokio::test]
async fn test_concurrent_redemption_succeeds_once() {
    let app = spawn_app().await;
    app.register_user("alice").await;
    let token = request_token(&app, "alice@example.com").await;

    let fields = [("token", token.as_str()), ("password", NEW_PASSWORD)];
    let (first, second) = tokio::join!(
        app.post_form("/reset-password", None, &fields),
        app.post_form("/reset-password", None, &fields),
    );

    let redirects = [&first, &second]
        .iter()
        .filter(|r| r.status() == StatusCode::SEE_OTHER)
        .count();
    assert_eq!(redirects, 1);
}
