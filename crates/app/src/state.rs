use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::live::{Notifier, SubscriptionRegistry};
use agora_infra::Store;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<Store>,
    pub registry: Arc<SubscriptionRegistry>,
    pub notifier: Arc<Notifier>,
    pub shutdown: CancellationToken,
}
