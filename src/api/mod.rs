use axum::{
    Router, middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, SessionManagerLayer, cookie::SameSite};
use tower_sessions_sqlx_store::SqliteStore;

use crate::config::Config;
use crate::services::{AuthService, ChatHub, CommentService, PasswordResetService, ResetNotifier};
use crate::state::SharedState;

pub mod auth;
mod chat;
pub mod client_addr;
mod comments;
mod error;
mod observability;
mod profile;
pub mod reset;
pub mod session;
mod system;
mod types;
mod validation;
pub mod views;

pub use error::ApiError;
pub use types::*;

use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub session_store: SqliteStore,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &crate::db::Store {
        &self.shared.store
    }

    #[must_use]
    pub fn auth(&self) -> &Arc<dyn AuthService> {
        &self.shared.auth
    }

    #[must_use]
    pub fn resets(&self) -> &Arc<PasswordResetService> {
        &self.shared.resets
    }

    #[must_use]
    pub fn comments(&self) -> &Arc<CommentService> {
        &self.shared.comments
    }

    #[must_use]
    pub fn chat(&self) -> &Arc<ChatHub> {
        &self.shared.chat
    }
}

pub async fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    // Sessions live in the application database next to the accounts.
    let pool = shared.store.conn.get_sqlite_connection_pool().clone();
    let session_store = SqliteStore::new(pool);
    session_store
        .migrate()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to prepare session table: {e}"))?;

    Ok(Arc::new(AppState {
        shared,
        session_store,
        start_time: std::time::Instant::now(),
        prometheus_handle,
    }))
}

pub async fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config).await?);
    create_app_state(shared, prometheus_handle).await
}

/// Like [`create_app_state_from_config`] with a specific reset notifier.
pub async fn create_app_state_with_notifier(
    config: Config,
    notifier: Arc<dyn ResetNotifier>,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::with_notifier(config, notifier).await?);
    create_app_state(shared, prometheus_handle).await
}

pub async fn router(state: Arc<AppState>) -> Router {
    let (static_path, secure_cookies, inactivity_minutes) = {
        let config = state.config();
        (
            config.general.static_path.clone(),
            config.server.secure_cookies,
            config.server.session_inactivity_minutes,
        )
    };

    let protected_routes = create_protected_router(state.clone());

    let session_layer = SessionManagerLayer::new(state.session_store.clone())
        .with_secure(secure_cookies)
        .with_http_only(true)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(
            inactivity_minutes,
        )));

    Router::new()
        .merge(protected_routes)
        .route("/", get(comments::home))
        .route("/comments", get(comments::list_comments))
        .route("/user/{id}/comments", get(comments::user_comments))
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/forgot", get(reset::forgot_page).post(reset::forgot))
        .route(
            "/reset-password",
            get(reset::reset_page).post(reset::reset_password),
        )
        .route("/chat.js", get(chat::chat_script))
        .route("/api", get(system::welcome))
        .route("/api/health", get(system::health))
        .route("/metrics", get(observability::get_metrics))
        .nest_service("/public", ServeDir::new(static_path))
        .fallback(views::not_found)
        .layer(session_layer)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(observability::logging_middleware))
                .layer(middleware::from_fn(observability::security_headers_middleware))
                .layer(TraceLayer::new_for_http()),
        )
}

fn create_protected_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/new-comment", get(comments::new_comment_page))
        .route("/comment", post(comments::create_comment))
        .route("/profile", get(profile::profile_page))
        .route("/profile/update-password", post(profile::update_password))
        .route("/profile/update-email", post(profile::update_email))
        .route(
            "/profile/update-display-name",
            post(profile::update_display_name),
        )
        .route("/profile/update-color", post(profile::update_color))
        .route("/chat", get(chat::chat_page))
        .route("/chat/ws", get(chat::chat_socket))
        .route_layer(middleware::from_fn_with_state(state, auth::require_user))
}
