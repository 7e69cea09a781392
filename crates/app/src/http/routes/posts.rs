use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};

use agora_core::domain::posts::{NewPost, Post, PostId};
use agora_core::store::CommentStore;

use crate::http::error::ApiError;
use crate::http::middleware::author_auth::Author;
use crate::service;
use crate::state::AppState;

pub async fn list_posts(State(state): State<AppState>) -> Result<Json<Vec<Post>>, ApiError> {
    let posts = state.store.list_posts().await?;
    Ok(Json(posts))
}

pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<PostId>,
) -> Result<Json<Post>, ApiError> {
    let post = state.store.get_post_by_id(id).await?;
    Ok(Json(post))
}

pub async fn create_post(
    State(state): State<AppState>,
    Extension(author): Extension<Author>,
    Json(params): Json<NewPost>,
) -> Result<(StatusCode, Json<Post>), ApiError> {
    let post = service::create_post(
        state.store.as_ref(),
        &params,
        &author.0,
        state.config.max_content_len,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(post)))
}
