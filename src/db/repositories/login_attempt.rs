use crate::entities::{login_attempts, prelude::*};
use anyhow::{Context, Result};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, Set};

/// Append-only log of login POSTs. Rows are never updated or deleted.
pub struct LoginAttemptRepository {
    conn: DatabaseConnection,
}

impl LoginAttemptRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn record(
        &self,
        username: &str,
        ip_address: &str,
        timestamp: i64,
        success: bool,
    ) -> Result<()> {
        let active_model = login_attempts::ActiveModel {
            username: Set(username.to_string()),
            ip_address: Set(ip_address.to_string()),
            timestamp: Set(timestamp),
            success: Set(success),
            ..Default::default()
        };

        LoginAttempts::insert(active_model)
            .exec_without_returning(&self.conn)
            .await
            .context("Failed to record login attempt")?;

        Ok(())
    }

    /// Failed attempts for the literal `username` strictly after `since`.
    pub async fn count_failures_since(&self, username: &str, since: i64) -> Result<u64> {
        let count = LoginAttempts::find()
            .filter(login_attempts::Column::Username.eq(username))
            .filter(login_attempts::Column::Success.eq(false))
            .filter(login_attempts::Column::Timestamp.gt(since))
            .count(&self.conn)
            .await
            .context("Failed to count login failures")?;

        Ok(count)
    }
}
