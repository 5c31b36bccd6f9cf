use crate::entities::{chat_messages, comments, login_attempts, password_reset_tokens};
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Lockout counter: failures per username inside a time window
        manager
            .create_index(
                Index::create()
                    .name("idx_login_attempts_username_timestamp")
                    .table(login_attempts::Entity)
                    .col(login_attempts::Column::Username)
                    .col(login_attempts::Column::Timestamp)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_comments_user_id")
                    .table(comments::Entity)
                    .col(comments::Column::UserId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_comments_created_at")
                    .table(comments::Entity)
                    .col(comments::Column::CreatedAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_chat_messages_user_id")
                    .table(chat_messages::Entity)
                    .col(chat_messages::Column::UserId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_password_reset_tokens_expires_at")
                    .table(password_reset_tokens::Entity)
                    .col(password_reset_tokens::Column::ExpiresAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_password_reset_tokens_expires_at")
                    .table(password_reset_tokens::Entity)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_chat_messages_user_id")
                    .table(chat_messages::Entity)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_comments_created_at")
                    .table(comments::Entity)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_comments_user_id")
                    .table(comments::Entity)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_login_attempts_username_timestamp")
                    .table(login_attempts::Entity)
                    .to_owned(),
            )
            .await
    }
}
