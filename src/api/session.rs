//! Session identity helpers.
//!
//! The cookie only carries a [`SessionUser`]. The displayed identity is looked
//! up on every request, and a session minted before the latest password
//! change is flushed on first use.

use tower_sessions::Session;

use super::{ApiError, AppState};
use crate::db::User;
use crate::models::user::{CurrentUser, SessionUser};

const USER_KEY: &str = "user";

pub async fn current_user(
    state: &AppState,
    session: &Session,
) -> Result<Option<CurrentUser>, ApiError> {
    Ok(current_session(state, session).await?.map(|(_, user)| user))
}

/// Like [`current_user`], also returning the cookie contents it was
/// resolved from.
pub async fn current_session(
    state: &AppState,
    session: &Session,
) -> Result<Option<(SessionUser, CurrentUser)>, ApiError> {
    let Some(stored) = session.get::<SessionUser>(USER_KEY).await? else {
        return Ok(None);
    };

    if let Some(user) = state.auth().resolve_session(stored).await? {
        return Ok(Some((stored, user)));
    }

    tracing::debug!(user_id = stored.id, "Discarding stale session");
    session.flush().await?;
    Ok(None)
}

/// Starts an authenticated session under a fresh session id.
pub async fn sign_in(session: &Session, user: &User) -> Result<(), ApiError> {
    session.cycle_id().await?;
    session.insert(USER_KEY, SessionUser::for_user(user)).await?;
    Ok(())
}

pub async fn sign_out(session: &Session) -> Result<(), ApiError> {
    session.flush().await?;
    Ok(())
}
