use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;

use agora_core::domain::comments::{Comment, CommentsPage, NewComment};
use agora_core::domain::posts::PostId;
use agora_core::store::CommentStore;

use crate::http::error::ApiError;
use crate::http::middleware::author_auth::Author;
use crate::loader::CommentLoader;
use crate::paginate::{self, PageRequest};
use crate::service;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CommentsParams {
    pub first: Option<usize>,
    pub cursor: Option<String>,
    #[serde(default)]
    pub deep: bool,
}

pub async fn list_comments(
    State(state): State<AppState>,
    Path(post_id): Path<PostId>,
    Query(params): Query<CommentsParams>,
) -> Result<Json<CommentsPage>, ApiError> {
    let first = state
        .config
        .page_size(params.first)
        .map_err(ApiError::BadRequest)?;
    state.store.get_post_by_id(post_id).await?;

    let loader = CommentLoader::new(Arc::clone(&state.store), state.config.loader);
    let request = PageRequest {
        first,
        cursor: params.cursor,
        deep: params.deep,
    };
    let page = paginate::page(state.store.as_ref(), &loader, post_id, &request).await?;
    Ok(Json(page))
}

pub async fn create_comment(
    State(state): State<AppState>,
    Extension(author): Extension<Author>,
    Json(params): Json<NewComment>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    let comment = service::create_comment(
        state.store.as_ref(),
        &state.notifier,
        &params,
        &author.0,
        state.config.max_content_len,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}
