use std::future::Future;

use crate::domain::comments::{Comment, CommentId, NewComment};
use crate::domain::posts::{NewPost, Post, PostId};
use crate::error::CoreError;

/// Storage contract the comment core depends on.
///
/// List operations return rows ascending by id. `get_comments_by_post_id`
/// returns top-level comments only; `get_comments_by_parent_id` returns direct
/// children only. Single-row lookups fail with `CoreError::NotFound`.
pub trait CommentStore: Send + Sync + 'static {
    fn create_post(
        &self,
        params: &NewPost,
        author_id: &str,
    ) -> impl Future<Output = Result<PostId, CoreError>> + Send;

    fn get_post_by_id(&self, id: PostId) -> impl Future<Output = Result<Post, CoreError>> + Send;

    fn list_posts(&self) -> impl Future<Output = Result<Vec<Post>, CoreError>> + Send;

    fn create_comment(
        &self,
        params: &NewComment,
        author_id: &str,
    ) -> impl Future<Output = Result<CommentId, CoreError>> + Send;

    fn get_comment_by_id(
        &self,
        id: CommentId,
    ) -> impl Future<Output = Result<Comment, CoreError>> + Send;

    fn get_comments_by_post_id(
        &self,
        post_id: PostId,
    ) -> impl Future<Output = Result<Vec<Comment>, CoreError>> + Send;

    fn get_comments_by_parent_id(
        &self,
        parent_id: CommentId,
    ) -> impl Future<Output = Result<Vec<Comment>, CoreError>> + Send;
}
