use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type PostId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Post {
    pub id: PostId,
    pub title: String,
    pub content: String,
    pub author_id: String,
    pub comments_enabled: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    #[serde(default = "default_comments_enabled")]
    pub comments_enabled: bool,
}

fn default_comments_enabled() -> bool {
    true
}
