use crate::entities::{chat_messages, prelude::*, users};
use crate::models::chat::ChatHistoryEntry;
use anyhow::{Context, Result};
use sea_orm::{
    DatabaseConnection, EntityTrait, JoinType, QueryOrder, QuerySelect, RelationTrait, Set,
};

pub struct ChatRepository {
    conn: DatabaseConnection,
}

impl ChatRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn insert(&self, user_id: i32, text: &str, timestamp: i64) -> Result<i32> {
        let active_model = chat_messages::ActiveModel {
            user_id: Set(user_id),
            text: Set(text.to_string()),
            timestamp: Set(timestamp),
            ..Default::default()
        };

        let result = ChatMessages::insert(active_model)
            .exec(&self.conn)
            .await
            .context("Failed to insert chat message")?;

        Ok(result.last_insert_id)
    }

    /// The latest `limit` messages, oldest first.
    pub async fn recent(&self, limit: u64) -> Result<Vec<ChatHistoryEntry>> {
        let mut rows = ChatMessages::find()
            .select_only()
            .column(chat_messages::Column::Text)
            .column(chat_messages::Column::Timestamp)
            .column_as(users::Column::DisplayName, "display_name")
            .column_as(users::Column::ProfileColor, "profile_color")
            .join(JoinType::InnerJoin, chat_messages::Relation::Users.def())
            .order_by_desc(chat_messages::Column::Id)
            .limit(limit)
            .into_model::<ChatHistoryEntry>()
            .all(&self.conn)
            .await
            .context("Failed to load chat history")?;

        rows.reverse();
        Ok(rows)
    }
}
