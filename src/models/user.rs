use serde::{Deserialize, Serialize};

use crate::db::User;

/// Public identity of the signed-in user, resolved from the store on every
/// request so profile edits show up without a fresh login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: i32,
    pub username: String,
    pub display_name: String,
    pub profile_color: String,
}

impl From<User> for CurrentUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            display_name: user.display_name,
            profile_color: user.profile_color,
        }
    }
}

/// What the session cookie actually carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: i32,
    pub session_version: i32,
}

impl SessionUser {
    #[must_use]
    pub const fn for_user(user: &User) -> Self {
        Self {
            id: user.id,
            session_version: user.session_version,
        }
    }
}
