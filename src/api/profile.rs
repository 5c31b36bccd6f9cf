use axum::{
    Extension, Form,
    extract::State,
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tower_sessions::Session;

use super::views::{self, Notice};
use super::{ApiError, AppState, session};
use crate::models::user::CurrentUser;
use crate::services::AuthError;

#[derive(Deserialize)]
pub struct PasswordForm {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
}

#[derive(Deserialize)]
pub struct EmailForm {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Deserialize)]
pub struct DisplayNameForm {
    #[serde(default)]
    pub display_name: String,
}

#[derive(Deserialize)]
pub struct ColorForm {
    #[serde(default)]
    pub profile_color: String,
}

async fn render(
    state: &AppState,
    user_id: i32,
    notice: Option<Notice<'_>>,
) -> Result<Html<String>, ApiError> {
    let account = state.auth().get_user(user_id).await?;
    Ok(views::profile(&account, notice))
}

/// Renders the outcome of a profile edit. Rule violations are shown on the
/// form; anything else becomes an error page.
async fn respond(
    state: &AppState,
    user_id: i32,
    result: Result<(), AuthError>,
    success: &str,
) -> Result<Response, ApiError> {
    let html = match result {
        Ok(()) => render(state, user_id, Some(Notice::Success(success))).await?,
        Err(AuthError::Validation(message)) => {
            render(state, user_id, Some(Notice::Error(&message))).await?
        }
        Err(AuthError::AlreadyExists) => {
            render(
                state,
                user_id,
                Some(Notice::Error("That email is already in use")),
            )
            .await?
        }
        Err(e) => return Err(e.into()),
    };

    Ok(html.into_response())
}

/// GET /profile
pub async fn profile_page(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Html<String>, ApiError> {
    render(&state, user.id, None).await
}

/// POST /profile/update-password
///
/// Success ends every session of the user, this one included.
pub async fn update_password(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    session: Session,
    Form(form): Form<PasswordForm>,
) -> Result<Response, ApiError> {
    let result = state
        .auth()
        .change_password(user.id, &form.current_password, &form.new_password)
        .await;

    if result.is_ok() {
        state.chat().revoke_user(user.id);
        session::sign_out(&session).await?;
        return Ok(Redirect::to("/login?password_changed=1").into_response());
    }

    respond(&state, user.id, result, "").await
}

/// POST /profile/update-email
pub async fn update_email(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Form(form): Form<EmailForm>,
) -> Result<Response, ApiError> {
    let result = state
        .auth()
        .change_email(user.id, &form.current_password, &form.email)
        .await;

    respond(&state, user.id, result, "Email updated").await
}

/// POST /profile/update-display-name
pub async fn update_display_name(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Form(form): Form<DisplayNameForm>,
) -> Result<Response, ApiError> {
    let result = state
        .auth()
        .change_display_name(user.id, &form.display_name)
        .await;

    respond(&state, user.id, result, "Display name updated").await
}

/// POST /profile/update-color
pub async fn update_color(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Form(form): Form<ColorForm>,
) -> Result<Response, ApiError> {
    let result = state
        .auth()
        .change_color(user.id, &form.profile_color)
        .await;

    respond(&state, user.id, result, "Color updated").await
}
