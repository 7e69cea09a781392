use sqlx::{PgPool, Row};

use agora_core::domain::posts::{NewPost, Post, PostId};

use super::RepoError;

pub async fn insert_post(
    pool: &PgPool,
    params: &NewPost,
    author_id: &str,
) -> Result<PostId, RepoError> {
    let id: PostId = sqlx::query_scalar(
        r#"
        INSERT INTO posts (title, content, comments_enabled, author_id)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(&params.title)
    .bind(&params.content)
    .bind(params.comments_enabled)
    .bind(author_id)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

pub async fn find_post_by_id(pool: &PgPool, id: PostId) -> Result<Option<Post>, RepoError> {
    let row = sqlx::query(
        r#"
        SELECT id, title, content, comments_enabled, author_id, created_at
        FROM posts
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    row.map(map_post).transpose()
}

pub async fn list_posts(pool: &PgPool) -> Result<Vec<Post>, RepoError> {
    let rows = sqlx::query(
        r#"
        SELECT id, title, content, comments_enabled, author_id, created_at
        FROM posts
        ORDER BY id ASC
        "#,
    )
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(map_post).collect()
}

fn map_post(row: sqlx::postgres::PgRow) -> Result<Post, RepoError> {
    Ok(Post {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        comments_enabled: row.try_get("comments_enabled")?,
        author_id: row.try_get("author_id")?,
        created_at: row.try_get("created_at")?,
    })
}
