use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;

use agora_core::domain::comments::{Comment, CommentId, NewComment};
use agora_core::domain::posts::{NewPost, Post, PostId};
use agora_core::error::CoreError;
use agora_core::store::CommentStore;

/// Process-local store used when no database is configured.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    posts: BTreeMap<PostId, Post>,
    comments: BTreeMap<CommentId, Comment>,
    last_post_id: PostId,
    last_comment_id: CommentId,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CommentStore for MemoryStore {
    async fn create_post(&self, params: &NewPost, author_id: &str) -> Result<PostId, CoreError> {
        let mut state = self.lock();
        state.last_post_id += 1;
        let id = state.last_post_id;
        state.posts.insert(
            id,
            Post {
                id,
                title: params.title.clone(),
                content: params.content.clone(),
                author_id: author_id.to_string(),
                comments_enabled: params.comments_enabled,
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    async fn get_post_by_id(&self, id: PostId) -> Result<Post, CoreError> {
        self.lock()
            .posts
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("post {id}")))
    }

    async fn list_posts(&self) -> Result<Vec<Post>, CoreError> {
        Ok(self.lock().posts.values().cloned().collect())
    }

    async fn create_comment(
        &self,
        params: &NewComment,
        author_id: &str,
    ) -> Result<CommentId, CoreError> {
        let mut state = self.lock();
        if !state.posts.contains_key(&params.post_id) {
            return Err(CoreError::NotFound(format!("post {}", params.post_id)));
        }
        if let Some(parent_id) = params.parent_id {
            if !state.comments.contains_key(&parent_id) {
                return Err(CoreError::NotFound(format!("comment {parent_id}")));
            }
        }
        state.last_comment_id += 1;
        let id = state.last_comment_id;
        state.comments.insert(
            id,
            Comment {
                id,
                post_id: params.post_id,
                parent_id: params.parent_id,
                author_id: author_id.to_string(),
                content: params.content.clone(),
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    async fn get_comment_by_id(&self, id: CommentId) -> Result<Comment, CoreError> {
        self.lock()
            .comments
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("comment {id}")))
    }

    async fn get_comments_by_post_id(&self, post_id: PostId) -> Result<Vec<Comment>, CoreError> {
        Ok(self
            .lock()
            .comments
            .values()
            .filter(|comment| comment.post_id == post_id && comment.is_top_level())
            .cloned()
            .collect())
    }

    async fn get_comments_by_parent_id(
        &self,
        parent_id: CommentId,
    ) -> Result<Vec<Comment>, CoreError> {
        Ok(self
            .lock()
            .comments
            .values()
            .filter(|comment| comment.parent_id == Some(parent_id))
            .cloned()
            .collect())
    }
}
