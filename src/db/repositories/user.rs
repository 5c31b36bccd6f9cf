use anyhow::{Context, Result};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    Set, SqlErr, Value,
    sea_query::Expr,
};
use tokio::task;

use crate::config::SecurityConfig;
use crate::entities::users;

/// User data returned from repository (without sensitive password hash)
#[derive(Debug, Clone)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub profile_color: String,
    pub locked_until: Option<i64>,
    pub session_version: i32,
    pub created_at: i64,
}

impl User {
    #[must_use]
    pub fn is_locked_at(&self, now: i64) -> bool {
        self.locked_until.is_some_and(|until| until > now)
    }
}

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            email: model.email,
            display_name: model.display_name,
            profile_color: model.profile_color,
            locked_until: model.locked_until,
            session_version: model.session_version,
            created_at: model.created_at,
        }
    }
}

pub struct NewUser<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub email: &'a str,
    pub display_name: &'a str,
    pub profile_color: &'a str,
}

/// Write failures the caller has to tell apart. The unique index that fired
/// is deliberately not reported.
#[derive(Debug, thiserror::Error)]
pub enum UserWriteError {
    #[error("username or email already in use")]
    AlreadyExists,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl UserWriteError {
    fn from_db(err: DbErr, action: &'static str) -> Self {
        if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
            Self::AlreadyExists
        } else {
            Self::Other(anyhow::Error::new(err).context(action))
        }
    }
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Hashes the password and inserts the account.
    pub async fn create(
        &self,
        new_user: NewUser<'_>,
        security: &SecurityConfig,
    ) -> Result<i32, UserWriteError> {
        let password_hash = hash_password_blocking(new_user.password, security).await?;

        let active = users::ActiveModel {
            username: Set(new_user.username.to_string()),
            password_hash: Set(password_hash),
            email: Set(new_user.email.to_string()),
            display_name: Set(new_user.display_name.to_string()),
            profile_color: Set(new_user.profile_color.to_string()),
            locked_until: Set(None),
            session_version: Set(0),
            created_at: Set(chrono::Utc::now().timestamp()),
            ..Default::default()
        };

        let result = users::Entity::insert(active)
            .exec(&self.conn)
            .await
            .map_err(|e| UserWriteError::from_db(e, "Failed to insert user"))?;

        Ok(result.last_insert_id)
    }

    pub async fn get_by_id(&self, id: i32) -> Result<Option<User>> {
        let user = users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")?;

        Ok(user.map(User::from))
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user by username")?;

        Ok(user.map(User::from))
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.conn)
            .await
            .context("Failed to query user by email")?;

        Ok(user.map(User::from))
    }

    /// Get user by username together with the stored password hash
    pub async fn get_by_username_with_password(
        &self,
        username: &str,
    ) -> Result<Option<(User, String)>> {
        let user = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user by username")?;

        Ok(user.map(|u| {
            let password_hash = u.password_hash.clone();
            (User::from(u), password_hash)
        }))
    }

    /// Verify a password for a user id.
    /// Note: This uses `spawn_blocking` because Argon2 is CPU-intensive
    /// and would block the async runtime if run directly.
    pub async fn verify_password(&self, id: i32, password: &str) -> Result<bool> {
        let user = users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user for password verification")?;

        let Some(user) = user else {
            return Ok(false);
        };

        verify_password_blocking(user.password_hash, password).await
    }

    /// Stores a new hash and invalidates every existing session of the user.
    pub async fn update_password_hash(&self, id: i32, password_hash: String) -> Result<()> {
        users::Entity::update_many()
            .col_expr(users::Column::PasswordHash, Expr::value(password_hash))
            .col_expr(
                users::Column::SessionVersion,
                Expr::col(users::Column::SessionVersion).add(1),
            )
            .filter(users::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to update password hash")?;

        Ok(())
    }

    pub async fn update_email(&self, id: i32, email: &str) -> Result<(), UserWriteError> {
        let user = self.find_model(id).await?;

        let mut active: users::ActiveModel = user.into();
        active.email = Set(email.to_string());
        active
            .update(&self.conn)
            .await
            .map_err(|e| UserWriteError::from_db(e, "Failed to update email"))?;

        Ok(())
    }

    pub async fn update_display_name(&self, id: i32, display_name: &str) -> Result<()> {
        let user = self.find_model(id).await?;

        let mut active: users::ActiveModel = user.into();
        active.display_name = Set(display_name.to_string());
        active.update(&self.conn).await?;

        Ok(())
    }

    pub async fn update_color(&self, id: i32, profile_color: &str) -> Result<()> {
        let user = self.find_model(id).await?;

        let mut active: users::ActiveModel = user.into();
        active.profile_color = Set(profile_color.to_string());
        active.update(&self.conn).await?;

        Ok(())
    }

    /// Locks `username` until `locked_until` if it has at least `max_attempts`
    /// failures since `window_start` and is not already locked. Check and set
    /// run as one statement so concurrent failures cannot both slip past the
    /// threshold. Returns whether this call applied the lock.
    pub async fn lock_if_threshold_reached(
        &self,
        username: &str,
        now: i64,
        window_start: i64,
        max_attempts: u32,
        locked_until: i64,
    ) -> Result<bool> {
        let failures_reached = Expr::cust_with_values(
            "(SELECT COUNT(*) FROM login_attempts \
             WHERE login_attempts.username = ? \
             AND login_attempts.success = 0 \
             AND login_attempts.timestamp > ?) >= ?",
            [
                Value::from(username.to_string()),
                Value::from(window_start),
                Value::from(i64::from(max_attempts)),
            ],
        );

        let result = users::Entity::update_many()
            .col_expr(users::Column::LockedUntil, Expr::value(Some(locked_until)))
            .filter(users::Column::Username.eq(username))
            .filter(
                Condition::any()
                    .add(users::Column::LockedUntil.is_null())
                    .add(users::Column::LockedUntil.lte(now)),
            )
            .filter(failures_reached)
            .exec(&self.conn)
            .await
            .context("Failed to apply account lock")?;

        Ok(result.rows_affected > 0)
    }

    pub async fn clear_lock(&self, id: i32) -> Result<()> {
        users::Entity::update_many()
            .col_expr(users::Column::LockedUntil, Expr::value(Option::<i64>::None))
            .filter(users::Column::Id.eq(id))
            .filter(users::Column::LockedUntil.is_not_null())
            .exec(&self.conn)
            .await
            .context("Failed to clear account lock")?;

        Ok(())
    }

    async fn find_model(&self, id: i32) -> Result<users::Model> {
        users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user for update")?
            .ok_or_else(|| anyhow::anyhow!("User not found: {id}"))
    }
}

/// Hash a password using Argon2id with the configured cost parameters.
pub fn hash_password(password: &str, config: &SecurityConfig) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let params = Params::new(
        config.argon2_memory_cost_kib,
        config.argon2_time_cost,
        config.argon2_parallelism,
        None, // output length (use default)
    )
    .map_err(|e| anyhow::anyhow!("Invalid Argon2 params: {e}"))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;

    Ok(hash.to_string())
}

/// Checks `password` against a PHC hash string. The parameters are read
/// from the hash itself, so hashes made with older settings keep working.
pub fn verify_password_hash(password_hash: &str, password: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|e| anyhow::anyhow!("Invalid password hash format: {e}"))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

pub async fn hash_password_blocking(password: &str, config: &SecurityConfig) -> Result<String> {
    let password = password.to_string();
    let config = config.clone();

    task::spawn_blocking(move || hash_password(&password, &config))
        .await
        .context("Password hashing task panicked")?
}

pub async fn verify_password_blocking(password_hash: String, password: &str) -> Result<bool> {
    let password = password.to_string();

    task::spawn_blocking(move || verify_password_hash(&password_hash, &password))
        .await
        .context("Password verification task panicked")?
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap_params() -> SecurityConfig {
        SecurityConfig {
            argon2_memory_cost_kib: 1024,
            argon2_time_cost: 1,
            ..SecurityConfig::default()
        }
    }

    #[test]
    fn hash_is_salted_and_verifiable() {
        let config = cheap_params();
        let first = hash_password("Str0ng!Pass", &config).unwrap();
        let second = hash_password("Str0ng!Pass", &config).unwrap();

        assert_ne!(first, second);
        assert!(first.starts_with("$argon2id$"));
        assert!(verify_password_hash(&first, "Str0ng!Pass").unwrap());
        assert!(!verify_password_hash(&first, "str0ng!Pass").unwrap());
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(verify_password_hash("plaintext", "plaintext").is_err());
    }

    #[test]
    fn lock_state_compares_against_now() {
        let mut user = User {
            id: 1,
            username: "alice".into(),
            email: "alice@example.com".into(),
            display_name: "Alice A".into(),
            profile_color: "#000000".into(),
            locked_until: None,
            session_version: 0,
            created_at: 0,
        };
        assert!(!user.is_locked_at(100));

        user.locked_until = Some(150);
        assert!(user.is_locked_at(100));
        assert!(!user.is_locked_at(150));
        assert!(!user.is_locked_at(200));
    }
}
