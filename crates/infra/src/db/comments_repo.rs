use sqlx::{PgPool, Row};

use agora_core::domain::comments::{Comment, CommentId, NewComment};
use agora_core::domain::posts::PostId;

use super::RepoError;

pub async fn insert_comment(
    pool: &PgPool,
    params: &NewComment,
    author_id: &str,
) -> Result<CommentId, RepoError> {
    let id: CommentId = sqlx::query_scalar(
        r#"
        INSERT INTO comments (post_id, parent_id, author_id, content)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(params.post_id)
    .bind(params.parent_id)
    .bind(author_id)
    .bind(&params.content)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

pub async fn find_comment_by_id(
    pool: &PgPool,
    id: CommentId,
) -> Result<Option<Comment>, RepoError> {
    let row = sqlx::query(
        r#"
        SELECT id, post_id, parent_id, author_id, content, created_at
        FROM comments
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    row.map(map_comment).transpose()
}

pub async fn list_top_level_comments(
    pool: &PgPool,
    post_id: PostId,
) -> Result<Vec<Comment>, RepoError> {
    let rows = sqlx::query(
        r#"
        SELECT id, post_id, parent_id, author_id, content, created_at
        FROM comments
        WHERE post_id = $1 AND parent_id IS NULL
        ORDER BY id ASC
        "#,
    )
    .bind(post_id)
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(map_comment).collect()
}

pub async fn list_comments_by_parent_id(
    pool: &PgPool,
    parent_id: CommentId,
) -> Result<Vec<Comment>, RepoError> {
    let rows = sqlx::query(
        r#"
        SELECT id, post_id, parent_id, author_id, content, created_at
        FROM comments
        WHERE parent_id = $1
        ORDER BY id ASC
        "#,
    )
    .bind(parent_id)
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(map_comment).collect()
}

fn map_comment(row: sqlx::postgres::PgRow) -> Result<Comment, RepoError> {
    Ok(Comment {
        id: row.try_get("id")?,
        post_id: row.try_get("post_id")?,
        parent_id: row.try_get("parent_id")?,
        author_id: row.try_get("author_id")?,
        content: row.try_get("content")?,
        created_at: row.try_get("created_at")?,
    })
}
