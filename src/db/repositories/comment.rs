use crate::entities::{comments, prelude::*, users};
use crate::models::comment::CommentView;
use anyhow::{Context, Result};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, JoinType, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, RelationTrait, Select, Set,
};

pub struct CommentRepository {
    conn: DatabaseConnection,
}

impl CommentRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(&self, user_id: i32, text: &str, created_at: i64) -> Result<i32> {
        let active_model = comments::ActiveModel {
            user_id: Set(user_id),
            text: Set(text.to_string()),
            created_at: Set(created_at),
            ..Default::default()
        };

        let result = Comments::insert(active_model)
            .exec(&self.conn)
            .await
            .context("Failed to insert comment")?;

        Ok(result.last_insert_id)
    }

    pub async fn count(&self) -> Result<u64> {
        Ok(Comments::find().count(&self.conn).await?)
    }

    pub async fn count_by_user(&self, user_id: i32) -> Result<u64> {
        let count = Comments::find()
            .filter(comments::Column::UserId.eq(user_id))
            .count(&self.conn)
            .await?;

        Ok(count)
    }

    /// Newest-first slice `[offset, offset + limit)` of all comments.
    pub async fn list(&self, offset: u64, limit: u64) -> Result<Vec<CommentView>> {
        Self::view_query()
            .offset(offset)
            .limit(limit)
            .into_model::<CommentView>()
            .all(&self.conn)
            .await
            .context("Failed to list comments")
    }

    pub async fn list_by_user(
        &self,
        user_id: i32,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<CommentView>> {
        Self::view_query()
            .filter(comments::Column::UserId.eq(user_id))
            .offset(offset)
            .limit(limit)
            .into_model::<CommentView>()
            .all(&self.conn)
            .await
            .context("Failed to list comments by user")
    }

    fn view_query() -> Select<Comments> {
        Comments::find()
            .select_only()
            .column(comments::Column::Id)
            .column(comments::Column::UserId)
            .column(comments::Column::Text)
            .column(comments::Column::CreatedAt)
            .column_as(users::Column::DisplayName, "display_name")
            .column_as(users::Column::ProfileColor, "profile_color")
            .join(JoinType::InnerJoin, comments::Relation::Users.def())
            .order_by_desc(comments::Column::CreatedAt)
            .order_by_desc(comments::Column::Id)
    }
}
