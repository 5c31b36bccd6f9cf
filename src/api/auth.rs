use axum::{
    Form,
    extract::{Query, Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tower_sessions::Session;

use super::client_addr::ClientAddr;
use super::views::{self, Notice, RegisterValues};
use super::{ApiError, AppState, session};
use crate::services::{AuthError, Registration};

// ============================================================================
// Request Types
// ============================================================================

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Deserialize, Default)]
pub struct LoginQuery {
    pub registered: Option<String>,
    pub password_changed: Option<String>,
    pub reset: Option<String>,
}

// ============================================================================
// Middleware
// ============================================================================

/// Guards signed-in routes. The resolved [`crate::models::user::CurrentUser`]
/// and its [`crate::models::user::SessionUser`] are placed in the request
/// extensions. Anonymous page requests are sent to
/// `/login`; websocket handshakes get a bare 401 before any upgrade happens.
pub async fn require_user(
    State(state): State<Arc<AppState>>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some((stored, user)) = session::current_session(&state, &session).await? {
        tracing::Span::current().record("user_id", user.id);
        request.extensions_mut().insert(stored);
        request.extensions_mut().insert(user);
        return Ok(next.run(request).await);
    }

    if is_websocket_upgrade(request.headers()) {
        return Ok((StatusCode::UNAUTHORIZED, "Unauthorized").into_response());
    }

    Ok(Redirect::to("/login").into_response())
}

fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /login
pub async fn login_page(
    State(state): State<Arc<AppState>>,
    session: Session,
    Query(query): Query<LoginQuery>,
) -> Result<Response, ApiError> {
    if session::current_user(&state, &session).await?.is_some() {
        return Ok(Redirect::to("/").into_response());
    }

    let notice = if query.registered.is_some() {
        Some(Notice::Success("Registration successful. You can log in now."))
    } else if query.password_changed.is_some() {
        Some(Notice::Success("Password changed. Please log in again."))
    } else if query.reset.is_some() {
        Some(Notice::Success("Password reset. Log in with your new password."))
    } else {
        None
    };

    Ok(views::login(notice, "").into_response())
}

/// POST /login
pub async fn login(
    State(state): State<Arc<AppState>>,
    session: Session,
    ClientAddr(ip): ClientAddr,
    Form(form): Form<LoginForm>,
) -> Result<Response, ApiError> {
    if form.username.trim().is_empty() || form.password.is_empty() {
        return Ok(views::login(
            Some(Notice::Error("Username and password are required")),
            &form.username,
        )
        .into_response());
    }

    match state.auth().login(&form.username, &form.password, &ip).await {
        Ok(user) => {
            session::sign_in(&session, &user).await?;
            Ok(Redirect::to("/").into_response())
        }
        Err(err @ (AuthError::InvalidCredentials | AuthError::AccountLocked)) => {
            let message = err.to_string();
            Ok(views::login(Some(Notice::Error(&message)), &form.username).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// POST /logout
pub async fn logout(session: Session) -> Result<Redirect, ApiError> {
    session::sign_out(&session).await?;
    Ok(Redirect::to("/login"))
}

/// GET /register
pub async fn register_page() -> Html<String> {
    views::register(None, RegisterValues::default())
}

/// POST /register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Form(form): Form<RegisterForm>,
) -> Result<Response, ApiError> {
    let values = RegisterValues {
        username: &form.username,
        email: &form.email,
        display_name: &form.display_name,
    };

    let registration = Registration {
        username: form.username.clone(),
        email: form.email.clone(),
        password: form.password.clone(),
        display_name: form.display_name.clone(),
    };

    match state.auth().register(registration).await {
        Ok(_) => Ok(Redirect::to("/login?registered=1").into_response()),
        Err(AuthError::Validation(message)) => {
            Ok(views::register(Some(Notice::Error(&message)), values).into_response())
        }
        Err(AuthError::AlreadyExists) => Ok(views::register(
            Some(Notice::Error("That username or email is already in use")),
            values,
        )
        .into_response()),
        Err(e) => Err(e.into()),
    }
}
