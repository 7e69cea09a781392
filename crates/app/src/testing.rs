//! In-process `CommentStore` for unit tests: fixed ids, call counters and
//! per-key failure injection.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{TimeZone, Utc};

use agora_core::domain::comments::{Comment, CommentId, NewComment};
use agora_core::domain::posts::{NewPost, Post, PostId};
use agora_core::error::CoreError;
use agora_core::store::CommentStore;

pub fn comment(id: CommentId, post_id: PostId, parent_id: Option<CommentId>) -> Comment {
    Comment {
        id,
        post_id,
        parent_id,
        author_id: "author".to_string(),
        content: format!("comment {id}"),
        created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    }
}

pub fn post(id: PostId, comments_enabled: bool) -> Post {
    Post {
        id,
        title: format!("post {id}"),
        content: "body".to_string(),
        author_id: "author".to_string(),
        comments_enabled,
        created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Calls {
    pub by_post_id: usize,
    pub by_parent_id: usize,
    pub by_id: usize,
    pub writes: usize,
}

#[derive(Default)]
pub struct FixtureStore {
    posts: Mutex<BTreeMap<PostId, Post>>,
    comments: Mutex<BTreeMap<CommentId, Comment>>,
    failing_parents: Mutex<HashSet<CommentId>>,
    by_post_id: AtomicUsize,
    by_parent_id: AtomicUsize,
    by_id: AtomicUsize,
    writes: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FixtureStore {
    /// Seeds the comments plus an open post for every post id they mention.
    pub fn with_comments(comments: Vec<Comment>) -> Self {
        let store = Self::default();
        for comment in comments {
            lock(&store.posts)
                .entry(comment.post_id)
                .or_insert_with(|| post(comment.post_id, true));
            lock(&store.comments).insert(comment.id, comment);
        }
        store
    }

    pub fn insert_post(&self, post: Post) {
        lock(&self.posts).insert(post.id, post);
    }

    pub fn fail_parent(&self, parent_id: CommentId) {
        lock(&self.failing_parents).insert(parent_id);
    }

    pub fn heal_parent(&self, parent_id: CommentId) {
        lock(&self.failing_parents).remove(&parent_id);
    }

    pub fn calls(&self) -> Calls {
        Calls {
            by_post_id: self.by_post_id.load(Ordering::SeqCst),
            by_parent_id: self.by_parent_id.load(Ordering::SeqCst),
            by_id: self.by_id.load(Ordering::SeqCst),
            writes: self.writes.load(Ordering::SeqCst),
        }
    }
}

impl CommentStore for FixtureStore {
    async fn create_post(&self, params: &NewPost, author_id: &str) -> Result<PostId, CoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut posts = lock(&self.posts);
        let id = posts.keys().next_back().copied().unwrap_or(0) + 1;
        posts.insert(
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
        lock(&self.posts)
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("post {id}")))
    }

    async fn list_posts(&self) -> Result<Vec<Post>, CoreError> {
        Ok(lock(&self.posts).values().cloned().collect())
    }

    async fn create_comment(
        &self,
        params: &NewComment,
        author_id: &str,
    ) -> Result<CommentId, CoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut comments = lock(&self.comments);
        let id = comments.keys().next_back().copied().unwrap_or(0) + 1;
        comments.insert(
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
        self.by_id.fetch_add(1, Ordering::SeqCst);
        lock(&self.comments)
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("comment {id}")))
    }

    async fn get_comments_by_post_id(&self, post_id: PostId) -> Result<Vec<Comment>, CoreError> {
        self.by_post_id.fetch_add(1, Ordering::SeqCst);
        Ok(lock(&self.comments)
            .values()
            .filter(|comment| comment.post_id == post_id && comment.is_top_level())
            .cloned()
            .collect())
    }

    async fn get_comments_by_parent_id(
        &self,
        parent_id: CommentId,
    ) -> Result<Vec<Comment>, CoreError> {
        self.by_parent_id.fetch_add(1, Ordering::SeqCst);
        if lock(&self.failing_parents).contains(&parent_id) {
            return Err(CoreError::UpstreamUnavailable(format!(
                "children of {parent_id} unavailable"
            )));
        }
        Ok(lock(&self.comments)
            .values()
            .filter(|comment| comment.parent_id == Some(parent_id))
            .cloned()
            .collect())
    }
}
