use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};
use tracing::{debug, warn};

use agora_core::domain::comments::Comment;

use crate::live::registry::SubscriptionRegistry;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub dropped: usize,
    pub closed: usize,
}

/// Fans freshly created comments out to the clients following their post.
///
/// The registry lock is held only while the subscriber snapshot is taken.
/// Sends never wait: a full client buffer drops the comment for that client.
///
/// Writers that want delivery in creation order hold [`Notifier::sequence`]
/// from the store write until their broadcast returns.
pub struct Notifier {
    registry: Arc<SubscriptionRegistry>,
    sequence: AsyncMutex<()>,
    // Serializes broadcasts so every client sees one post's comments in order.
    order: Mutex<()>,
}

impl Notifier {
    pub fn new(registry: Arc<SubscriptionRegistry>) -> Self {
        Self {
            registry,
            sequence: AsyncMutex::new(()),
            order: Mutex::new(()),
        }
    }

    /// Held across "persist, re-read, broadcast" so the order in which
    /// creations complete is the order in which they are delivered.
    pub async fn sequence(&self) -> AsyncMutexGuard<'_, ()> {
        self.sequence.lock().await
    }

    pub fn broadcast(&self, comment: &Comment) -> DeliveryReport {
        let _order = self.order.lock().unwrap_or_else(PoisonError::into_inner);
        let targets = self.registry.subscribers(comment.post_id);
        let payload = Arc::new(comment.clone());
        let mut report = DeliveryReport::default();
        for (client_id, events) in targets {
            match events.try_send(Arc::clone(&payload)) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(
                        %client_id,
                        post_id = comment.post_id,
                        comment_id = comment.id,
                        "client buffer full; notification dropped"
                    );
                    report.dropped += 1;
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(%client_id, comment_id = comment.id, "client gone; skipping");
                    report.closed += 1;
                }
            }
        }
        debug!(
            post_id = comment.post_id,
            comment_id = comment.id,
            delivered = report.delivered,
            dropped = report.dropped,
            "comment broadcast"
        );
        report
    }
}
