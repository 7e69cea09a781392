use tracing::info;

use agora_core::domain::comments::{Comment, NewComment};
use agora_core::domain::posts::{NewPost, Post};
use agora_core::error::CoreError;
use agora_core::store::CommentStore;

use crate::live::Notifier;

pub const DEFAULT_MAX_CONTENT_LEN: usize = 2000;

pub async fn create_post<S: CommentStore>(
    store: &S,
    params: &NewPost,
    author_id: &str,
    max_content_len: usize,
) -> Result<Post, CoreError> {
    if params.title.trim().is_empty() {
        return Err(CoreError::ValidationFailed("title must not be empty".to_string()));
    }
    validate_content(&params.content, max_content_len)?;
    let id = store.create_post(params, author_id).await?;
    let post = store.get_post_by_id(id).await?;
    info!(post_id = post.id, author_id, "post created");
    Ok(post)
}

/// Validates, persists and broadcasts a new comment. Nothing is written
/// unless every check passes.
pub async fn create_comment<S: CommentStore>(
    store: &S,
    notifier: &Notifier,
    params: &NewComment,
    author_id: &str,
    max_content_len: usize,
) -> Result<Comment, CoreError> {
    validate_content(&params.content, max_content_len)?;

    let post = store.get_post_by_id(params.post_id).await?;
    if !post.comments_enabled {
        return Err(CoreError::ValidationFailed(format!(
            "comments are disabled for post {}",
            post.id
        )));
    }
    if let Some(parent_id) = params.parent_id {
        let parent = store.get_comment_by_id(parent_id).await?;
        if parent.post_id != post.id {
            return Err(CoreError::ValidationFailed(format!(
                "parent comment {parent_id} belongs to another post"
            )));
        }
    }

    let _sequence = notifier.sequence().await;
    let id = store.create_comment(params, author_id).await?;
    let comment = store.get_comment_by_id(id).await?;
    info!(
        comment_id = comment.id,
        post_id = comment.post_id,
        author_id,
        "comment created"
    );
    notifier.broadcast(&comment);
    Ok(comment)
}

fn validate_content(content: &str, max_len: usize) -> Result<(), CoreError> {
    if content.trim().is_empty() {
        return Err(CoreError::ValidationFailed(
            "content must not be empty".to_string(),
        ));
    }
    let len = content.chars().count();
    if len > max_len {
        return Err(CoreError::ValidationFailed(format!(
            "content is {len} characters, limit is {max_len}"
        )));
    }
    Ok(())
}
