pub mod comments_repo;
pub mod pool;
pub mod posts_repo;

use thiserror::Error;

pub use comments_repo::{
    find_comment_by_id, insert_comment, list_comments_by_parent_id, list_top_level_comments,
};
pub use pool::{DbPool, DbPoolError, connect_lazy, ping, run_migrations};
pub use posts_repo::{find_post_by_id, insert_post, list_posts};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}
