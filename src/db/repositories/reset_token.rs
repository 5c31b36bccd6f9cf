use crate::entities::{password_reset_tokens, prelude::*, users};
use anyhow::{Context, Result};
use rand::Rng;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, TransactionTrait,
    sea_query::Expr,
};

pub struct ResetTokenRepository {
    conn: DatabaseConnection,
}

impl ResetTokenRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(&self, user_id: i32, token: &str, expires_at: i64, now: i64) -> Result<()> {
        let active_model = password_reset_tokens::ActiveModel {
            user_id: Set(user_id),
            token: Set(token.to_string()),
            expires_at: Set(expires_at),
            used: Set(false),
            created_at: Set(now),
            ..Default::default()
        };

        PasswordResetTokens::insert(active_model)
            .exec(&self.conn)
            .await
            .context("Failed to store reset token")?;

        Ok(())
    }

    /// Returns the token row only while it is unused and unexpired.
    pub async fn find_valid(
        &self,
        token: &str,
        now: i64,
    ) -> Result<Option<password_reset_tokens::Model>> {
        let row = PasswordResetTokens::find()
            .filter(password_reset_tokens::Column::Token.eq(token))
            .filter(password_reset_tokens::Column::Used.eq(false))
            .filter(password_reset_tokens::Column::ExpiresAt.gt(now))
            .one(&self.conn)
            .await
            .context("Failed to query reset token")?;

        Ok(row)
    }

    /// Claims the token and stores the new password hash in one transaction.
    ///
    /// The claim is a conditional update on `used = false AND expires_at > now`,
    /// so of several concurrent callers exactly one sees a claimed row. The
    /// owner's sessions are invalidated and any lockout is lifted.
    /// Returns the owning user id, or `None` when the token was not usable.
    pub async fn consume(&self, token: &str, password_hash: String, now: i64) -> Result<Option<i32>> {
        let txn = self.conn.begin().await?;

        let claimed = PasswordResetTokens::update_many()
            .col_expr(password_reset_tokens::Column::Used, Expr::value(true))
            .filter(password_reset_tokens::Column::Token.eq(token))
            .filter(password_reset_tokens::Column::Used.eq(false))
            .filter(password_reset_tokens::Column::ExpiresAt.gt(now))
            .exec(&txn)
            .await
            .context("Failed to claim reset token")?;

        if claimed.rows_affected != 1 {
            txn.rollback().await?;
            return Ok(None);
        }

        let row = PasswordResetTokens::find()
            .filter(password_reset_tokens::Column::Token.eq(token))
            .one(&txn)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Claimed reset token vanished"))?;

        Users::update_many()
            .col_expr(users::Column::PasswordHash, Expr::value(password_hash))
            .col_expr(
                users::Column::SessionVersion,
                Expr::col(users::Column::SessionVersion).add(1),
            )
            .col_expr(users::Column::LockedUntil, Expr::value(Option::<i64>::None))
            .filter(users::Column::Id.eq(row.user_id))
            .exec(&txn)
            .await
            .context("Failed to store new password")?;

        txn.commit().await?;

        Ok(Some(row.user_id))
    }

    /// Deletes tokens that expired before `expired_before`.
    pub async fn prune_expired(&self, expired_before: i64) -> Result<u64> {
        let result = PasswordResetTokens::delete_many()
            .filter(password_reset_tokens::Column::ExpiresAt.lt(expired_before))
            .exec(&self.conn)
            .await
            .context("Failed to prune reset tokens")?;

        Ok(result.rows_affected)
    }
}

/// 256 random bits, hex encoded.
#[must_use]
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
