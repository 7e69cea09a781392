use axum::Router;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::middleware;
use axum::routing::{delete, get, post};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::http::middleware::author_auth;
use crate::http::routes::{comments, health, notifications, posts};
use crate::state::AppState;

pub fn build(state: AppState) -> Router {
    let cors = build_cors(&state);
    let mut router = Router::new()
        .route("/health", get(health::health))
        .route("/v2/posts", get(posts::list_posts).post(posts::create_post))
        .route("/v2/posts/{id}", get(posts::get_post))
        .route("/v2/posts/{id}/comments", get(comments::list_comments))
        .route("/v2/comments", post(comments::create_comment))
        .route("/v2/notifications", get(notifications::open_stream))
        .route("/v2/notifications/{client_id}", delete(notifications::terminate))
        .route(
            "/v2/notifications/{client_id}/subscriptions",
            post(notifications::subscribe),
        )
        .route(
            "/v2/notifications/{client_id}/subscriptions/{post_id}",
            delete(notifications::unsubscribe),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            author_auth::require_author,
        ))
        .with_state(state);
    if let Some(cors) = cors {
        router = router.layer(cors);
    }
    router
}

#[derive(Debug, PartialEq)]
enum CorsPolicy {
    Disabled,
    AnyOrigin,
    Origins(Vec<HeaderValue>),
}

fn cors_policy(configured: &[String]) -> CorsPolicy {
    if configured.iter().any(|origin| origin.trim() == "*") {
        return CorsPolicy::AnyOrigin;
    }
    let origins: Vec<HeaderValue> = configured
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "invalid CORS origin ignored");
                None
            }
        })
        .collect();
    if origins.is_empty() {
        CorsPolicy::Disabled
    } else {
        CorsPolicy::Origins(origins)
    }
}

fn build_cors(state: &AppState) -> Option<CorsLayer> {
    let cors = CorsLayer::new().allow_methods([
        Method::GET,
        Method::POST,
        Method::DELETE,
        Method::OPTIONS,
    ]);
    match cors_policy(&state.config.cors_allow_origins) {
        CorsPolicy::Disabled => None,
        CorsPolicy::AnyOrigin => Some(cors.allow_origin(Any).allow_headers(Any)),
        CorsPolicy::Origins(origins) => Some(
            cors.allow_origin(AllowOrigin::list(origins))
                .allow_credentials(true)
                .allow_headers([CONTENT_TYPE, AUTHORIZATION]),
        ),
    }
}
