use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::posts::PostId;

pub type CommentId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub parent_id: Option<CommentId>,
    pub author_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewComment {
    pub post_id: PostId,
    #[serde(default)]
    pub parent_id: Option<CommentId>,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentEdge {
    pub cursor: String,
    pub node: Comment,
    pub has_sub_comments: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub start_cursor: String,
    pub end_cursor: String,
    pub has_next_page: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentsPage {
    pub edges: Vec<CommentEdge>,
    pub page_info: PageInfo,
}

impl CommentsPage {
    pub fn empty() -> Self {
        Self {
            edges: Vec::new(),
            page_info: PageInfo::default(),
        }
    }
}
