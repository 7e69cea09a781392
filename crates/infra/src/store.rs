use sqlx::error::ErrorKind;
use tracing::{debug, warn};

use agora_core::domain::comments::{Comment, CommentId, NewComment};
use agora_core::domain::posts::{NewPost, Post, PostId};
use agora_core::error::CoreError;
use agora_core::store::CommentStore;

use crate::db::{self, DbPool, RepoError};
use crate::memory::MemoryStore;

/// Postgres-backed store.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

/// Constraint violations are caller mistakes and are not retried. Everything
/// else is treated as the database being unavailable.
fn upstream(op: &'static str, err: RepoError) -> CoreError {
    if let RepoError::Sqlx(sqlx::Error::Database(db_err)) = &err {
        if let Some(mapped) = constraint_error(db_err.kind(), db_err.message()) {
            debug!(error = %err, op, "store call rejected by constraint");
            return mapped;
        }
    }
    warn!(error = %err, op, "store call failed");
    CoreError::UpstreamUnavailable(err.to_string())
}

fn constraint_error(kind: ErrorKind, message: &str) -> Option<CoreError> {
    match kind {
        ErrorKind::ForeignKeyViolation => Some(CoreError::NotFound(format!(
            "referenced row does not exist: {message}"
        ))),
        ErrorKind::UniqueViolation | ErrorKind::CheckViolation | ErrorKind::NotNullViolation => {
            Some(CoreError::ValidationFailed(message.to_string()))
        }
        _ => None,
    }
}

impl CommentStore for PgStore {
    async fn create_post(&self, params: &NewPost, author_id: &str) -> Result<PostId, CoreError> {
        db::insert_post(&self.pool, params, author_id)
            .await
            .map_err(|err| upstream("create_post", err))
    }

    async fn get_post_by_id(&self, id: PostId) -> Result<Post, CoreError> {
        db::find_post_by_id(&self.pool, id)
            .await
            .map_err(|err| upstream("get_post_by_id", err))?
            .ok_or_else(|| CoreError::NotFound(format!("post {id}")))
    }

    async fn list_posts(&self) -> Result<Vec<Post>, CoreError> {
        db::list_posts(&self.pool)
            .await
            .map_err(|err| upstream("list_posts", err))
    }

    async fn create_comment(
        &self,
        params: &NewComment,
        author_id: &str,
    ) -> Result<CommentId, CoreError> {
        db::insert_comment(&self.pool, params, author_id)
            .await
            .map_err(|err| upstream("create_comment", err))
    }

    async fn get_comment_by_id(&self, id: CommentId) -> Result<Comment, CoreError> {
        db::find_comment_by_id(&self.pool, id)
            .await
            .map_err(|err| upstream("get_comment_by_id", err))?
            .ok_or_else(|| CoreError::NotFound(format!("comment {id}")))
    }

    async fn get_comments_by_post_id(&self, post_id: PostId) -> Result<Vec<Comment>, CoreError> {
        db::list_top_level_comments(&self.pool, post_id)
            .await
            .map_err(|err| upstream("get_comments_by_post_id", err))
    }

    async fn get_comments_by_parent_id(
        &self,
        parent_id: CommentId,
    ) -> Result<Vec<Comment>, CoreError> {
        db::list_comments_by_parent_id(&self.pool, parent_id)
            .await
            .map_err(|err| upstream("get_comments_by_parent_id", err))
    }
}

/// Storage backend selected at startup.
#[derive(Debug)]
pub enum Store {
    Postgres(PgStore),
    Memory(MemoryStore),
}

impl Store {
    pub fn backend(&self) -> &'static str {
        match self {
            Store::Postgres(_) => "postgres",
            Store::Memory(_) => "memory",
        }
    }

    pub fn pool(&self) -> Option<&DbPool> {
        match self {
            Store::Postgres(store) => Some(store.pool()),
            Store::Memory(_) => None,
        }
    }
}

impl CommentStore for Store {
    async fn create_post(&self, params: &NewPost, author_id: &str) -> Result<PostId, CoreError> {
        match self {
            Store::Postgres(store) => store.create_post(params, author_id).await,
            Store::Memory(store) => store.create_post(params, author_id).await,
        }
    }

    async fn get_post_by_id(&self, id: PostId) -> Result<Post, CoreError> {
        match self {
            Store::Postgres(store) => store.get_post_by_id(id).await,
            Store::Memory(store) => store.get_post_by_id(id).await,
        }
    }

    async fn list_posts(&self) -> Result<Vec<Post>, CoreError> {
        match self {
            Store::Postgres(store) => store.list_posts().await,
            Store::Memory(store) => store.list_posts().await,
        }
    }

    async fn create_comment(
        &self,
        params: &NewComment,
        author_id: &str,
    ) -> Result<CommentId, CoreError> {
        match self {
            Store::Postgres(store) => store.create_comment(params, author_id).await,
            Store::Memory(store) => store.create_comment(params, author_id).await,
        }
    }

    async fn get_comment_by_id(&self, id: CommentId) -> Result<Comment, CoreError> {
        match self {
            Store::Postgres(store) => store.get_comment_by_id(id).await,
            Store::Memory(store) => store.get_comment_by_id(id).await,
        }
    }

    async fn get_comments_by_post_id(&self, post_id: PostId) -> Result<Vec<Comment>, CoreError> {
        match self {
            Store::Postgres(store) => store.get_comments_by_post_id(post_id).await,
            Store::Memory(store) => store.get_comments_by_post_id(post_id).await,
        }
    }

    async fn get_comments_by_parent_id(
        &self,
        parent_id: CommentId,
    ) -> Result<Vec<Comment>, CoreError> {
        match self {
            Store::Postgres(store) => store.get_comments_by_parent_id(parent_id).await,
            Store::Memory(store) => store.get_comments_by_parent_id(parent_id).await,
        }
    }
}
