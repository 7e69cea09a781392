use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::live::{Notifier, SubscriptionRegistry};
use crate::state::AppState;
use agora_infra::db::{DbPoolError, connect_lazy};
use agora_infra::{MemoryStore, PgStore, Store};

#[derive(Debug, Error)]
pub enum WiringError {
    #[error("db pool error: {0}")]
    DbPool(#[from] DbPoolError),
}

pub fn build_state(config: AppConfig) -> Result<AppState, WiringError> {
    let store = match config.database_url.as_deref() {
        Some(url) => {
            let pool = connect_lazy(url, config.db_max_connections)?;
            info!(max_connections = config.db_max_connections, "using postgres store");
            Store::Postgres(PgStore::new(pool))
        }
        None => {
            warn!("AGORA_DATABASE_URL not set; comments are kept in memory only");
            Store::Memory(MemoryStore::new())
        }
    };
    let registry = Arc::new(SubscriptionRegistry::new());
    let notifier = Arc::new(Notifier::new(Arc::clone(&registry)));
    Ok(AppState {
        config: Arc::new(config),
        store: Arc::new(store),
        registry,
        notifier,
        shutdown: CancellationToken::new(),
    })
}
