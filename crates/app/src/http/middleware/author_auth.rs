use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{Method, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::http::error::ErrorBody;
use crate::state::AppState;

/// Verified author of a write request, attached as a request extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author(pub String);

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("author auth not configured")]
    MissingConfig,
    #[error("author token required")]
    MissingToken,
    #[error("author token invalid")]
    InvalidToken,
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenPayload {
    sub: String,
    exp: i64,
}

pub async fn require_author(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    if !requires_author(request.method(), request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let secret = state
        .config
        .auth_secret
        .as_deref()
        .filter(|value| !value.is_empty())
        .ok_or(AuthError::MissingConfig)?;
    let token = extract_bearer_token(&request).ok_or(AuthError::MissingToken)?;
    let author = verify_token(secret, &token).ok_or(AuthError::InvalidToken)?;
    request.extensions_mut().insert(author);
    Ok(next.run(request).await)
}

/// Writes to posts and comments need a verified author. Live subscription
/// control is keyed by the client id handed out on the event stream.
pub fn requires_author(method: &Method, path: &str) -> bool {
    if matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS) {
        return false;
    }
    path.starts_with("/v2/posts") || path.starts_with("/v2/comments")
}

fn verify_token(secret: &str, token: &str) -> Option<Author> {
    let (payload_b64, sig_b64) = token.split_once('.')?;
    if payload_b64.is_empty() || sig_b64.is_empty() {
        return None;
    }
    let sig = URL_SAFE_NO_PAD.decode(sig_b64.as_bytes()).ok()?;
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(payload_b64.as_bytes());
    mac.verify_slice(&sig).ok()?;

    let bytes = URL_SAFE_NO_PAD.decode(payload_b64.as_bytes()).ok()?;
    let payload: TokenPayload = serde_json::from_slice(&bytes).ok()?;
    let sub = payload.sub.trim();
    if sub.is_empty() || payload.exp <= Utc::now().timestamp() {
        return None;
    }
    Some(Author(sub.to_string()))
}

fn extract_bearer_token<B>(request: &Request<B>) -> Option<String> {
    let header = request.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let value = header.trim().strip_prefix("Bearer ")?.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self {
            AuthError::MissingConfig => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::MissingToken | AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
        };
        let body = Json(ErrorBody::new(self.to_string(), "unauthorized", false));
        (status, body).into_response()
    }
}
