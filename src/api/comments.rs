use axum::{
    Extension, Form,
    extract::{Path, Query, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tower_sessions::Session;

use super::validation::{parse_page, validate_user_id};
use super::views::{self, Notice};
use super::{ApiError, AppState, PageQuery, session};
use crate::models::user::CurrentUser;
use crate::services::CommentError;

const HOME_PREVIEW: usize = 5;

#[derive(Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub text: String,
}

/// GET /
pub async fn home(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Html<String>, ApiError> {
    let user = session::current_user(&state, &session).await?;
    let mut latest = state.comments().page(1).await?.comments;
    latest.truncate(HOME_PREVIEW);

    Ok(views::home(user.as_ref(), &latest))
}

/// GET /comments?page=N
pub async fn list_comments(
    State(state): State<Arc<AppState>>,
    session: Session,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, ApiError> {
    let user = session::current_user(&state, &session).await?;
    let page = state
        .comments()
        .page(parse_page(query.page.as_deref()))
        .await?;

    Ok(views::comments("Comments", user.as_ref(), &page, "/comments"))
}

/// GET /user/{id}/comments?page=N
pub async fn user_comments(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, ApiError> {
    let user_id = validate_user_id(&id)?;
    let author = state
        .store()
        .get_user(user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User", user_id))?;

    let viewer = session::current_user(&state, &session).await?;
    let page = state
        .comments()
        .page_for_user(user_id, parse_page(query.page.as_deref()))
        .await?;

    Ok(views::comments(
        &format!("Comments by {}", author.display_name),
        viewer.as_ref(),
        &page,
        &format!("/user/{user_id}/comments"),
    ))
}

/// GET /new-comment
pub async fn new_comment_page(Extension(user): Extension<CurrentUser>) -> Html<String> {
    views::new_comment(&user, None, "")
}

/// POST /comment
pub async fn create_comment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Form(form): Form<CommentForm>,
) -> Result<Response, ApiError> {
    match state.comments().post(user.id, &form.text).await {
        Ok(_) => Ok(Redirect::to("/comments").into_response()),
        Err(CommentError::Validation(message)) => Ok(views::new_comment(
            &user,
            Some(Notice::Error(&message)),
            &form.text,
        )
        .into_response()),
        Err(e) => Err(e.into()),
    }
}
