use thiserror::Error;

/// Errors surfaced by the comment core to its callers.
///
/// `UpstreamUnavailable` is the only kind worth retrying; the others describe
/// input the caller has to change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),
    #[error("validation failed: {0}")]
    ValidationFailed(String),
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
}

impl CoreError {
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::NotFound(_) => "not_found",
            CoreError::InvalidCursor(_) => "invalid_cursor",
            CoreError::ValidationFailed(_) => "validation_failed",
            CoreError::UpstreamUnavailable(_) => "upstream_unavailable",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::UpstreamUnavailable(_))
    }
}
