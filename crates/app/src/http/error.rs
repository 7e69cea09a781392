use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use agora_core::error::CoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("{0}")]
    BadRequest(String),
}

/// JSON body shared by every error response.
#[derive(Debug, Serialize)]
pub(crate) struct ErrorBody {
    error: String,
    kind: &'static str,
    retryable: bool,
}

impl ErrorBody {
    pub(crate) fn new(error: String, kind: &'static str, retryable: bool) -> Self {
        Self {
            error,
            kind,
            retryable,
        }
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Core(CoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Core(CoreError::InvalidCursor(_)) | ApiError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Core(CoreError::ValidationFailed(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Core(CoreError::UpstreamUnavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::Core(err) => err.kind(),
            ApiError::BadRequest(_) => "bad_request",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, ApiError::Core(err) if err.is_retryable())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(error = %self, "request failed");
        }
        let body = Json(ErrorBody::new(self.to_string(), self.kind(), self.retryable()));
        (status, body).into_response()
    }
}
