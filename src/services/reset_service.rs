use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info};

use crate::config::{ResetConfig, SecurityConfig};
use crate::db::repositories::user::hash_password_blocking;
use crate::db::{Store, generate_token};
use crate::services::notifier::ResetNotifier;
use crate::services::policy;

#[derive(Debug, Error)]
pub enum ResetError {
    #[error("No account is registered with that email")]
    NoSuchAccount,

    #[error("This reset link is invalid or has expired")]
    InvalidOrExpiredToken,

    #[error("{0}")]
    WeakPassword(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for ResetError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

impl From<sea_orm::DbErr> for ResetError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Issues and redeems single-use password reset tokens.
pub struct PasswordResetService {
    store: Store,
    security: SecurityConfig,
    config: ResetConfig,
    notifier: Arc<dyn ResetNotifier>,
}

impl PasswordResetService {
    #[must_use]
    pub fn new(
        store: Store,
        security: SecurityConfig,
        config: ResetConfig,
        notifier: Arc<dyn ResetNotifier>,
    ) -> Self {
        Self {
            store,
            security,
            config,
            notifier,
        }
    }

    fn ttl(&self) -> i64 {
        i64::try_from(self.config.token_ttl_seconds).unwrap_or(i64::MAX)
    }

    /// Stores a fresh token for the account behind `email` and hands it to
    /// the notifier in the background. Delivery failures are logged only.
    pub async fn request_reset(&self, email: &str) -> Result<(), ResetError> {
        let email = email.trim();

        let user = self
            .store
            .get_user_by_email(email)
            .await?
            .ok_or(ResetError::NoSuchAccount)?;

        let now = chrono::Utc::now().timestamp();
        let token = generate_token();
        self.store
            .create_reset_token(user.id, &token, now.saturating_add(self.ttl()), now)
            .await?;

        info!(event = "reset_requested", user_id = user.id, "Password reset token issued");

        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            if let Err(e) = notifier.deliver(&user.email, &token).await {
                error!(
                    event = "reset_delivery_failed",
                    user_id = user.id,
                    error = %e,
                    "Failed to deliver password reset link"
                );
            }
        });

        Ok(())
    }

    /// Whether `token` could currently be redeemed.
    pub async fn is_token_valid(&self, token: &str) -> Result<bool, ResetError> {
        if token.is_empty() {
            return Ok(false);
        }

        let now = chrono::Utc::now().timestamp();
        Ok(self.store.find_valid_reset_token(token, now).await?.is_some())
    }

    /// Redeems `token`, setting the account password to `new_password`, and
    /// returns the id of the account it belonged to.
    ///
    /// Password strength is checked before the token is touched, so a weak
    /// password leaves the token usable.
    pub async fn consume_reset(&self, token: &str, new_password: &str) -> Result<i32, ResetError> {
        policy::strong_password(new_password).map_err(ResetError::WeakPassword)?;

        if token.is_empty() {
            return Err(ResetError::InvalidOrExpiredToken);
        }

        let password_hash = hash_password_blocking(new_password, &self.security).await?;
        let now = chrono::Utc::now().timestamp();

        let user_id = self
            .store
            .consume_reset_token(token, password_hash, now)
            .await?
            .ok_or(ResetError::InvalidOrExpiredToken)?;

        info!(event = "password_reset", user_id, "Password reset via token");
        Ok(user_id)
    }

    /// Removes tokens that have been expired for longer than `retention_seconds`.
    pub async fn prune(&self, retention_seconds: i64) -> Result<u64, ResetError> {
        let cutoff = chrono::Utc::now()
            .timestamp()
            .saturating_sub(retention_seconds);
        Ok(self.store.prune_reset_tokens(cutoff).await?)
    }
}
