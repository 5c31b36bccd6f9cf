use anyhow::Result;
use thiserror::Error;
use tracing::info;

use crate::config::ForumConfig;
use crate::db::Store;
use crate::models::comment::{CommentPage, total_pages};

#[derive(Debug, Error)]
pub enum CommentError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub struct CommentService {
    store: Store,
    per_page: u64,
    max_length: usize,
}

impl CommentService {
    #[must_use]
    pub const fn new(store: Store, per_page: u64, max_length: usize) -> Self {
        Self {
            store,
            per_page,
            max_length,
        }
    }

    #[must_use]
    pub fn from_config(store: Store, config: &ForumConfig) -> Self {
        Self::new(store, config.comments_per_page, config.max_comment_length)
    }

    pub async fn post(&self, user_id: i32, text: &str) -> Result<i32, CommentError> {
        let text = text.trim();

        if text.is_empty() {
            return Err(CommentError::Validation("Comment cannot be empty".to_string()));
        }
        if text.chars().count() > self.max_length {
            return Err(CommentError::Validation(format!(
                "Comment must be at most {} characters",
                self.max_length
            )));
        }

        let now = chrono::Utc::now().timestamp();
        let id = self.store.add_comment(user_id, text, now).await?;

        info!(event = "comment_posted", comment_id = id, user_id, "Comment posted");
        Ok(id)
    }

    /// Page `page` (1-based) of every comment, newest first. Pages past the
    /// end come back empty without touching the comment table.
    pub async fn page(&self, page: u64) -> Result<CommentPage> {
        let page = page.max(1);
        let total = self.store.comment_count().await?;
        let pages = total_pages(total, self.per_page);

        let comments = if page > pages {
            Vec::new()
        } else {
            self.store
                .list_comments(self.offset(page), self.per_page)
                .await?
        };

        Ok(CommentPage {
            comments,
            page,
            total_pages: pages,
            total,
        })
    }

    /// Comments by one author, with the page clamped into `[1, total_pages]`.
    pub async fn page_for_user(&self, user_id: i32, page: u64) -> Result<CommentPage> {
        let total = self.store.comment_count_by_user(user_id).await?;
        let pages = total_pages(total, self.per_page);
        let page = page.clamp(1, pages);

        let comments = self
            .store
            .list_comments_by_user(user_id, self.offset(page), self.per_page)
            .await?;

        Ok(CommentPage {
            comments,
            page,
            total_pages: pages,
            total,
        })
    }

    /// SQLite binds offsets as `i64`.
    fn offset(&self, page: u64) -> u64 {
        (page - 1)
            .saturating_mul(self.per_page)
            .min(i64::MAX.unsigned_abs())
    }
}
