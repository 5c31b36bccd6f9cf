use crate::config::SecurityConfig;
use crate::models::chat::ChatHistoryEntry;
use crate::models::comment::CommentView;
use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod migrator;
pub mod repositories;

pub use crate::entities::password_reset_tokens::Model as ResetToken;
pub use repositories::reset_token::generate_token;
pub use repositories::user::{NewUser, User, UserWriteError};

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:").trim_start_matches("//");
            let path_str = path_str.split('?').next().unwrap_or(path_str);
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    fn login_attempt_repo(&self) -> repositories::login_attempt::LoginAttemptRepository {
        repositories::login_attempt::LoginAttemptRepository::new(self.conn.clone())
    }

    fn reset_token_repo(&self) -> repositories::reset_token::ResetTokenRepository {
        repositories::reset_token::ResetTokenRepository::new(self.conn.clone())
    }

    fn comment_repo(&self) -> repositories::comment::CommentRepository {
        repositories::comment::CommentRepository::new(self.conn.clone())
    }

    fn chat_repo(&self) -> repositories::chat::ChatRepository {
        repositories::chat::ChatRepository::new(self.conn.clone())
    }

    // Users

    pub async fn create_user(
        &self,
        new_user: NewUser<'_>,
        security: &SecurityConfig,
    ) -> Result<i32, UserWriteError> {
        self.user_repo().create(new_user, security).await
    }

    pub async fn get_user(&self, id: i32) -> Result<Option<User>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.user_repo().get_by_username(username).await
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.user_repo().get_by_email(email).await
    }

    pub async fn get_user_with_password(&self, username: &str) -> Result<Option<(User, String)>> {
        self.user_repo().get_by_username_with_password(username).await
    }

    pub async fn verify_user_password(&self, id: i32, password: &str) -> Result<bool> {
        self.user_repo().verify_password(id, password).await
    }

    pub async fn update_password_hash(&self, id: i32, password_hash: String) -> Result<()> {
        self.user_repo().update_password_hash(id, password_hash).await
    }

    pub async fn update_email(&self, id: i32, email: &str) -> Result<(), UserWriteError> {
        self.user_repo().update_email(id, email).await
    }

    pub async fn update_display_name(&self, id: i32, display_name: &str) -> Result<()> {
        self.user_repo().update_display_name(id, display_name).await
    }

    pub async fn update_color(&self, id: i32, profile_color: &str) -> Result<()> {
        self.user_repo().update_color(id, profile_color).await
    }

    pub async fn lock_if_threshold_reached(
        &self,
        username: &str,
        now: i64,
        window_start: i64,
        max_attempts: u32,
        locked_until: i64,
    ) -> Result<bool> {
        self.user_repo()
            .lock_if_threshold_reached(username, now, window_start, max_attempts, locked_until)
            .await
    }

    pub async fn clear_lock(&self, id: i32) -> Result<()> {
        self.user_repo().clear_lock(id).await
    }

    // Login attempts

    pub async fn record_login_attempt(
        &self,
        username: &str,
        ip_address: &str,
        timestamp: i64,
        success: bool,
    ) -> Result<()> {
        self.login_attempt_repo()
            .record(username, ip_address, timestamp, success)
            .await
    }

    pub async fn count_login_failures_since(&self, username: &str, since: i64) -> Result<u64> {
        self.login_attempt_repo()
            .count_failures_since(username, since)
            .await
    }

    // Reset tokens

    pub async fn create_reset_token(
        &self,
        user_id: i32,
        token: &str,
        expires_at: i64,
        now: i64,
    ) -> Result<()> {
        self.reset_token_repo()
            .create(user_id, token, expires_at, now)
            .await
    }

    pub async fn find_valid_reset_token(&self, token: &str, now: i64) -> Result<Option<ResetToken>> {
        self.reset_token_repo().find_valid(token, now).await
    }

    pub async fn consume_reset_token(
        &self,
        token: &str,
        password_hash: String,
        now: i64,
    ) -> Result<Option<i32>> {
        self.reset_token_repo()
            .consume(token, password_hash, now)
            .await
    }

    pub async fn prune_reset_tokens(&self, expired_before: i64) -> Result<u64> {
        self.reset_token_repo().prune_expired(expired_before).await
    }

    // Comments

    pub async fn add_comment(&self, user_id: i32, text: &str, created_at: i64) -> Result<i32> {
        self.comment_repo().create(user_id, text, created_at).await
    }

    pub async fn comment_count(&self) -> Result<u64> {
        self.comment_repo().count().await
    }

    pub async fn comment_count_by_user(&self, user_id: i32) -> Result<u64> {
        self.comment_repo().count_by_user(user_id).await
    }

    pub async fn list_comments(&self, offset: u64, limit: u64) -> Result<Vec<CommentView>> {
        self.comment_repo().list(offset, limit).await
    }

    pub async fn list_comments_by_user(
        &self,
        user_id: i32,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<CommentView>> {
        self.comment_repo().list_by_user(user_id, offset, limit).await
    }

    // Chat

    pub async fn add_chat_message(&self, user_id: i32, text: &str, timestamp: i64) -> Result<i32> {
        self.chat_repo().insert(user_id, text, timestamp).await
    }

    pub async fn recent_chat_messages(&self, limit: u64) -> Result<Vec<ChatHistoryEntry>> {
        self.chat_repo().recent(limit).await
    }
}
