//! `SeaORM` implementation of the `AuthService` trait.

use crate::config::SecurityConfig;
use crate::db::repositories::user::{hash_password_blocking, verify_password_blocking};
use crate::db::{NewUser, Store, User};
use crate::models::user::{CurrentUser, SessionUser};
use crate::services::auth_service::{AuthError, AuthService, Registration};
use crate::services::login_throttle::LoginThrottle;
use crate::services::policy;
use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, info};

pub struct SeaOrmAuthService {
    store: Store,
    security: SecurityConfig,
    throttle: LoginThrottle,
    default_color: String,
    /// Verified against when the username is unknown, so both paths cost one
    /// Argon2 verification.
    dummy_hash: OnceCell<String>,
}

impl SeaOrmAuthService {
    #[must_use]
    pub fn new(store: Store, security: SecurityConfig, default_color: String) -> Self {
        let throttle = LoginThrottle::new(store.clone(), security.auth_throttle.clone());
        Self {
            store,
            security,
            throttle,
            default_color,
            dummy_hash: OnceCell::new(),
        }
    }

    async fn burn_verification(&self, password: &str) -> Result<(), AuthError> {
        let dummy_hash = self
            .dummy_hash
            .get_or_try_init(|| hash_password_blocking("agora-unknown-user", &self.security))
            .await?;

        verify_password_blocking(dummy_hash.clone(), password).await?;
        Ok(())
    }

    async fn require_password(&self, user_id: i32, password: &str) -> Result<(), AuthError> {
        let is_valid = self.store.verify_user_password(user_id, password).await?;

        if is_valid {
            Ok(())
        } else {
            Err(AuthError::Validation(
                "Current password is incorrect".to_string(),
            ))
        }
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn register(&self, registration: Registration) -> Result<i32, AuthError> {
        let Registration {
            username,
            email,
            password,
            display_name,
        } = registration;

        let username = username.trim();
        let email = email.trim();
        let display_name = display_name.trim();

        policy::username(username).map_err(AuthError::Validation)?;
        policy::email(email).map_err(AuthError::Validation)?;
        policy::required("Password", &password).map_err(AuthError::Validation)?;
        policy::strong_password(&password).map_err(AuthError::Validation)?;
        policy::display_name(username, display_name).map_err(AuthError::Validation)?;

        let id = self
            .store
            .create_user(
                NewUser {
                    username,
                    password: &password,
                    email,
                    display_name,
                    profile_color: &self.default_color,
                },
                &self.security,
            )
            .await?;

        info!(event = "user_registered", user_id = id, username = %username, "User registered");
        Ok(id)
    }

    async fn login(
        &self,
        username: &str,
        password: &str,
        ip_address: &str,
    ) -> Result<User, AuthError> {
        let now = now();

        let Some((user, password_hash)) = self.store.get_user_with_password(username).await?
        else {
            self.burn_verification(password).await?;
            self.throttle.record(username, ip_address, now, false).await?;
            metrics::counter!("auth_login_total", "outcome" => "invalid").increment(1);
            return Err(AuthError::InvalidCredentials);
        };

        if user.is_locked_at(now) {
            self.throttle.record(username, ip_address, now, false).await?;
            metrics::counter!("auth_login_total", "outcome" => "locked").increment(1);
            return Err(AuthError::AccountLocked);
        }

        let is_valid = verify_password_blocking(password_hash, password).await?;
        self.throttle
            .record(username, ip_address, now, is_valid)
            .await?;

        if !is_valid {
            if self.throttle.lock_if_exceeded(username, now).await? {
                metrics::counter!("auth_lockouts_total").increment(1);
                metrics::counter!("auth_login_total", "outcome" => "locked").increment(1);
                return Err(AuthError::AccountLocked);
            }
            let failures = self.throttle.failures_in_window(username, now).await?;
            debug!(user_id = user.id, failures, "Rejected login");
            metrics::counter!("auth_login_total", "outcome" => "invalid").increment(1);
            return Err(AuthError::InvalidCredentials);
        }

        if user.locked_until.is_some() {
            self.store.clear_lock(user.id).await?;
        }

        metrics::counter!("auth_login_total", "outcome" => "success").increment(1);
        info!(event = "login_succeeded", user_id = user.id, "User logged in");
        Ok(user)
    }

    async fn resolve_session(
        &self,
        session: SessionUser,
    ) -> Result<Option<CurrentUser>, AuthError> {
        let user = self.store.get_user(session.id).await?;

        Ok(user
            .filter(|u| u.session_version == session.session_version)
            .map(CurrentUser::from))
    }

    async fn get_user(&self, id: i32) -> Result<User, AuthError> {
        self.store
            .get_user(id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    async fn change_password(
        &self,
        user_id: i32,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        policy::required("New password", new_password).map_err(AuthError::Validation)?;
        policy::strong_password(new_password).map_err(AuthError::Validation)?;

        self.require_password(user_id, current_password).await?;

        let password_hash = hash_password_blocking(new_password, &self.security).await?;
        self.store
            .update_password_hash(user_id, password_hash)
            .await?;

        info!(event = "password_changed", user_id, "Password changed");
        Ok(())
    }

    async fn change_email(
        &self,
        user_id: i32,
        current_password: &str,
        email: &str,
    ) -> Result<(), AuthError> {
        let email = email.trim();
        policy::email(email).map_err(AuthError::Validation)?;

        self.require_password(user_id, current_password).await?;

        self.store.update_email(user_id, email).await?;
        Ok(())
    }

    async fn change_display_name(
        &self,
        user_id: i32,
        display_name: &str,
    ) -> Result<(), AuthError> {
        let user = self.get_user(user_id).await?;

        let display_name = display_name.trim();
        policy::display_name(&user.username, display_name).map_err(AuthError::Validation)?;

        self.store
            .update_display_name(user_id, display_name)
            .await?;
        Ok(())
    }

    async fn change_color(&self, user_id: i32, profile_color: &str) -> Result<(), AuthError> {
        let profile_color = profile_color.trim();
        policy::profile_color(profile_color).map_err(AuthError::Validation)?;

        self.store.update_color(user_id, profile_color).await?;
        Ok(())
    }
}
