use sea_orm::FromQueryResult;
use serde::Serialize;

/// A comment joined with its author's current display attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromQueryResult)]
pub struct CommentView {
    pub id: i32,
    pub user_id: i32,
    pub text: String,
    pub created_at: i64,
    pub display_name: String,
    pub profile_color: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentPage {
    pub comments: Vec<CommentView>,
    pub page: u64,
    pub total_pages: u64,
    pub total: u64,
}

impl CommentPage {
    #[must_use]
    pub const fn has_previous(&self) -> bool {
        self.page > 1
    }

    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

/// Number of pages needed for `total` items. An empty listing still has one page.
#[must_use]
pub const fn total_pages(total: u64, per_page: u64) -> u64 {
    if total == 0 || per_page == 0 {
        1
    } else {
        total.div_ceil(per_page)
    }
}
