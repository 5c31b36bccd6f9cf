//! Domain service for authentication and account management.
//!
//! Handles registration, login with lockout, session resolution and the
//! profile edits a signed-in user can make.

use thiserror::Error;

use crate::db::User;
use crate::models::user::{CurrentUser, SessionUser};

/// Errors specific to authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Account is temporarily locked. Try again later.")]
    AccountLocked,

    #[error("Username or email already in use")]
    AlreadyExists,

    #[error("User not found")]
    UserNotFound,

    #[error("{0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

impl From<crate::db::UserWriteError> for AuthError {
    fn from(err: crate::db::UserWriteError) -> Self {
        match err {
            crate::db::UserWriteError::AlreadyExists => Self::AlreadyExists,
            crate::db::UserWriteError::Other(e) => e.into(),
        }
    }
}

/// Registration form, exactly as submitted.
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub display_name: String,
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Validates the form and creates the account.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Validation`] for rule violations and
    /// [`AuthError::AlreadyExists`] when the username or email is taken.
    async fn register(&self, registration: Registration) -> Result<i32, AuthError>;

    /// Verifies credentials, recording the attempt from `ip_address`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::AccountLocked`] while the account is locked (or
    /// when this failure locks it) and [`AuthError::InvalidCredentials`] otherwise.
    async fn login(&self, username: &str, password: &str, ip_address: &str)
    -> Result<User, AuthError>;

    /// Resolves a session to the user's current identity. `None` when the
    /// user is gone or the session predates a password change.
    async fn resolve_session(&self, session: SessionUser)
    -> Result<Option<CurrentUser>, AuthError>;

    async fn get_user(&self, id: i32) -> Result<User, AuthError>;

    /// Re-verifies `current_password` and stores the new one. Every session of
    /// the user, including the caller's, stops being valid.
    async fn change_password(
        &self,
        user_id: i32,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError>;

    /// Re-verifies `current_password` before changing the email.
    async fn change_email(
        &self,
        user_id: i32,
        current_password: &str,
        email: &str,
    ) -> Result<(), AuthError>;

    async fn change_display_name(&self, user_id: i32, display_name: &str)
    -> Result<(), AuthError>;

    async fn change_color(&self, user_id: i32, profile_color: &str) -> Result<(), AuthError>;
}
