use axum::{
    Form,
    extract::{Query, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tower_sessions::Session;

use super::views::{self, Notice};
use super::{ApiError, AppState, session};
use crate::services::{ResetError, policy};

/// Shown whether or not the address belongs to an account.
pub const FORGOT_CONFIRMATION: &str =
    "If an account exists for that email, a password reset link has been sent.";

#[derive(Deserialize)]
pub struct ForgotForm {
    #[serde(default)]
    pub email: String,
}

#[derive(Deserialize, Default)]
pub struct TokenQuery {
    #[serde(default)]
    pub token: String,
}

#[derive(Deserialize)]
pub struct ResetForm {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub password: String,
}

/// GET /forgot
pub async fn forgot_page(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Html<String>, ApiError> {
    let user = session::current_user(&state, &session).await?;
    Ok(views::forgot(user.as_ref(), None))
}

/// POST /forgot
pub async fn forgot(
    State(state): State<Arc<AppState>>,
    session: Session,
    Form(form): Form<ForgotForm>,
) -> Result<Html<String>, ApiError> {
    let user = session::current_user(&state, &session).await?;

    if let Err(message) = policy::email(form.email.trim()) {
        return Ok(views::forgot(user.as_ref(), Some(Notice::Error(&message))));
    }

    match state.resets().request_reset(&form.email).await {
        Ok(()) | Err(ResetError::NoSuchAccount) => Ok(views::forgot(
            user.as_ref(),
            Some(Notice::Success(FORGOT_CONFIRMATION)),
        )),
        Err(e) => Err(e.into()),
    }
}

/// GET /reset-password?token=...
pub async fn reset_page(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TokenQuery>,
) -> Result<Html<String>, ApiError> {
    if state.resets().is_token_valid(&query.token).await? {
        Ok(views::reset_form(&query.token, None))
    } else {
        Ok(views::reset_invalid())
    }
}

/// POST /reset-password
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Form(form): Form<ResetForm>,
) -> Result<Response, ApiError> {
    match state
        .resets()
        .consume_reset(&form.token, &form.password)
        .await
    {
        Ok(user_id) => {
            state.chat().revoke_user(user_id);
            Ok(Redirect::to("/login?reset=1").into_response())
        }
        Err(ResetError::WeakPassword(message)) => {
            Ok(views::reset_form(&form.token, Some(Notice::Error(&message))).into_response())
        }
        Err(ResetError::InvalidOrExpiredToken) => Ok(views::reset_invalid().into_response()),
        Err(e) => Err(e.into()),
    }
}
