use axum::Json;
use axum::extract::State;
use serde::Serialize;
use tracing::warn;

use crate::state::AppState;
use agora_infra::db::ping;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub storage: StorageStatus,
    pub live: LiveStatus,
}

#[derive(Debug, Serialize)]
pub struct StorageStatus {
    pub backend: &'static str,
    pub durable: bool,
    /// `None` for the in-memory backend.
    pub reachable: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct LiveStatus {
    pub clients: usize,
    pub shutting_down: bool,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let reachable = match state.store.pool() {
        Some(pool) => Some(match ping(pool).await {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "database ping failed");
                false
            }
        }),
        None => None,
    };
    let status = if reachable == Some(false) { "degraded" } else { "ok" };
    Json(HealthResponse {
        status,
        storage: StorageStatus {
            backend: state.store.backend(),
            durable: reachable.is_some(),
            reachable,
        },
        live: LiveStatus {
            clients: state.registry.client_count(),
            shutting_down: state.shutdown.is_cancelled(),
        },
    })
}
