use std::convert::Infallible;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;

use agora_core::domain::comments::Comment;
use agora_core::domain::posts::PostId;
use agora_core::error::CoreError;
use agora_core::store::CommentStore;

use crate::http::error::ApiError;
use crate::live::client::ClientGone;
use crate::live::{ClientControl, ClientId, SubscriptionClient};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StreamParams {
    pub posts: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubscribeBody {
    pub post_id: PostId,
}

#[derive(Debug, Serialize)]
struct Ready {
    client_id: ClientId,
    posts: Vec<PostId>,
}

impl From<ClientGone> for ApiError {
    fn from(err: ClientGone) -> Self {
        ApiError::Core(CoreError::NotFound(err.to_string()))
    }
}

/// Opens a live stream. The first event is `ready` with the client id used by
/// the control endpoints; every later event is a `comment`.
pub async fn open_stream(
    State(state): State<AppState>,
    Query(params): Query<StreamParams>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let posts = resolve_posts(&*state.store, params.posts.as_deref()).await?;

    let (client, control, events) =
        SubscriptionClient::register(&state.registry, state.config.notify_buffer);
    for post_id in &posts {
        state.registry.subscribe(control.id(), *post_id);
    }
    tokio::spawn(client.listen(Arc::clone(&state.registry), state.shutdown.clone()));

    let ready = Event::default()
        .event("ready")
        .json_data(Ready {
            client_id: control.id(),
            posts,
        })
        .unwrap_or_else(|_| Event::default().event("ready").data(control.id().to_string()));
    let comments = ReceiverStream::new(events).filter_map(|comment| async move { comment_event(&comment) });
    let stream = stream::once(async move { ready }).chain(comments).map(Ok);
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn comment_event(comment: &Comment) -> Option<Event> {
    match Event::default()
        .event("comment")
        .id(comment.id.to_string())
        .json_data(comment)
    {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(comment_id = comment.id, error = %err, "failed to encode comment event");
            None
        }
    }
}

pub async fn subscribe(
    State(state): State<AppState>,
    Path(client_id): Path<u64>,
    Json(body): Json<SubscribeBody>,
) -> Result<StatusCode, ApiError> {
    let control = find_client(&state, client_id)?;
    state.store.get_post_by_id(body.post_id).await?;
    control.subscribe(body.post_id).await?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn unsubscribe(
    State(state): State<AppState>,
    Path((client_id, post_id)): Path<(u64, PostId)>,
) -> Result<StatusCode, ApiError> {
    let control = find_client(&state, client_id)?;
    control.unsubscribe(post_id).await?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn terminate(
    State(state): State<AppState>,
    Path(client_id): Path<u64>,
) -> Result<StatusCode, ApiError> {
    let control = find_client(&state, client_id)?;
    control.terminate().await?;
    Ok(StatusCode::NO_CONTENT)
}

fn find_client(state: &AppState, client_id: u64) -> Result<ClientControl, ApiError> {
    let id = ClientId::from(client_id);
    state
        .registry
        .control(id)
        .ok_or_else(|| ApiError::Core(CoreError::NotFound(format!("live client {id}"))))
}

/// Parses `?posts=` and checks that every listed post exists, so a stream is
/// never opened for a post the subscribe endpoint would reject.
async fn resolve_posts<S: CommentStore>(store: &S, raw: Option<&str>) -> Result<Vec<PostId>, ApiError> {
    let posts = parse_posts(raw).map_err(ApiError::BadRequest)?;
    for post_id in &posts {
        store.get_post_by_id(*post_id).await?;
    }
    Ok(posts)
}

fn parse_posts(raw: Option<&str>) -> Result<Vec<PostId>, String> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    let mut posts = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        let id: PostId = part
            .parse()
            .map_err(|_| format!("invalid post id in posts: {part}"))?;
        if !posts.contains(&id) {
            posts.push(id);
        }
    }
    Ok(posts)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    use super::{parse_posts, resolve_posts};
    use crate::http::error::ApiError;
    use crate::testing::{FixtureStore, post};
    use agora_core::error::CoreError;

    #[test]
    fn parse_posts_accepts_lists_and_blanks() {
        assert_eq!(parse_posts(None), Ok(Vec::new()));
        assert_eq!(parse_posts(Some("")), Ok(Vec::new()));
        assert_eq!(parse_posts(Some("1, 2,,2 ,3")), Ok(vec![1, 2, 3]));
    }

    #[test]
    fn parse_posts_rejects_garbage() {
        assert!(parse_posts(Some("1,abc")).is_err());
    }

    #[tokio::test]
    async fn stream_posts_must_exist() {
        let store = FixtureStore::default();
        store.insert_post(post(1, true));
        store.insert_post(post(2, false));

        assert_eq!(resolve_posts(&store, Some("1,2")).await.unwrap(), vec![1, 2]);
        assert!(resolve_posts(&store, None).await.unwrap().is_empty());

        let err = resolve_posts(&store, Some("1,99")).await.unwrap_err();
        assert!(matches!(err, ApiError::Core(CoreError::NotFound(_))));
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_stream_posts_are_bad_requests() {
        let store = FixtureStore::default();
        let err = resolve_posts(&store, Some("abc")).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
