//! Process-wide map of live subscription clients and the posts they follow.
//!
//! Every read and write goes through one exclusive lock that is held only for
//! the map operation itself, never across a send or an await.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::mpsc;

use agora_core::domain::comments::Comment;
use agora_core::domain::posts::PostId;

use crate::live::client::ClientControl;

pub type Delivery = mpsc::Sender<Arc<Comment>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ClientId(u64);

impl From<u64> for ClientId {
    fn from(value: u64) -> Self {
        ClientId(value)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct ClientEntry {
    control: ClientControl,
    events: Delivery,
    topics: HashSet<PostId>,
}

#[derive(Default)]
pub struct SubscriptionRegistry {
    clients: Mutex<HashMap<ClientId, ClientEntry>>,
    last_id: AtomicU64,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ClientId, ClientEntry>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn next_client_id(&self) -> ClientId {
        ClientId(self.last_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Registers a client with an empty subscription set. Returns `false`
    /// and leaves the existing entry untouched if the id is already known.
    pub fn add_client(&self, control: ClientControl, events: Delivery) -> bool {
        let mut clients = self.lock();
        if clients.contains_key(&control.id()) {
            return false;
        }
        clients.insert(
            control.id(),
            ClientEntry {
                control,
                events,
                topics: HashSet::new(),
            },
        );
        true
    }

    /// Drops the client and its subscriptions. Removing an unknown client is
    /// a no-op.
    pub fn remove_client(&self, id: ClientId) -> bool {
        self.lock().remove(&id).is_some()
    }

    pub fn subscribe(&self, id: ClientId, post_id: PostId) -> bool {
        match self.lock().get_mut(&id) {
            Some(entry) => {
                entry.topics.insert(post_id);
                true
            }
            None => false,
        }
    }

    pub fn unsubscribe(&self, id: ClientId, post_id: PostId) -> bool {
        match self.lock().get_mut(&id) {
            Some(entry) => {
                entry.topics.remove(&post_id);
                true
            }
            None => false,
        }
    }

    /// Point-in-time snapshot of the delivery channels of every client
    /// following `post_id`.
    pub fn subscribers(&self, post_id: PostId) -> Vec<(ClientId, Delivery)> {
        self.lock()
            .iter()
            .filter(|(_, entry)| entry.topics.contains(&post_id))
            .map(|(id, entry)| (*id, entry.events.clone()))
            .collect()
    }

    pub fn topics(&self, id: ClientId) -> Option<HashSet<PostId>> {
        self.lock().get(&id).map(|entry| entry.topics.clone())
    }

    pub fn control(&self, id: ClientId) -> Option<ClientControl> {
        self.lock().get(&id).map(|entry| entry.control.clone())
    }

    pub fn client_count(&self) -> usize {
        self.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::SubscriptionRegistry;
    use crate::live::client::SubscriptionClient;

    #[test]
    fn subscribe_and_unsubscribe_apply_in_call_order() {
        let registry = SubscriptionRegistry::new();
        let (_client, control, _events) = SubscriptionClient::register(&registry, 4);
        let id = control.id();

        assert!(registry.subscribe(id, 1));
        assert!(registry.subscribe(id, 2));
        assert!(registry.unsubscribe(id, 1));
        assert!(registry.subscribe(id, 3));
        assert!(registry.subscribe(id, 1));
        assert!(registry.unsubscribe(id, 2));
        assert!(registry.unsubscribe(id, 9));

        assert_eq!(registry.topics(id), Some(HashSet::from([1, 3])));
    }

    #[test]
    fn adding_a_known_client_is_idempotent() {
        let registry = SubscriptionRegistry::new();
        let (_client, control, _events) = SubscriptionClient::register(&registry, 4);
        registry.subscribe(control.id(), 5);

        let (sender, _receiver) = tokio::sync::mpsc::channel(1);
        assert!(!registry.add_client(control.clone(), sender));
        assert_eq!(registry.client_count(), 1);
        assert_eq!(registry.topics(control.id()), Some(HashSet::from([5])));
    }

    #[test]
    fn removing_twice_leaves_other_clients_intact() {
        let registry = SubscriptionRegistry::new();
        let (_a, first, _first_events) = SubscriptionClient::register(&registry, 4);
        let (_b, second, _second_events) = SubscriptionClient::register(&registry, 4);
        registry.subscribe(second.id(), 7);

        assert!(registry.remove_client(first.id()));
        assert!(!registry.remove_client(first.id()));
        assert!(!registry.subscribe(first.id(), 7));

        assert_eq!(registry.client_count(), 1);
        assert_eq!(registry.subscribers(7).len(), 1);
        assert_eq!(registry.subscribers(7)[0].0, second.id());
    }

    #[test]
    fn subscribers_only_include_followers_of_the_post() {
        let registry = SubscriptionRegistry::new();
        let (_a, first, _first_events) = SubscriptionClient::register(&registry, 4);
        let (_b, second, _second_events) = SubscriptionClient::register(&registry, 4);
        registry.subscribe(first.id(), 1);
        registry.subscribe(second.id(), 2);

        let ids: Vec<_> = registry.subscribers(1).into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![first.id()]);
        assert!(registry.subscribers(3).is_empty());
    }

    #[test]
    fn concurrent_updates_are_not_lost() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let (_client, control, _events) = SubscriptionClient::register(&registry, 4);
        let id = control.id();

        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for post in 0..100 {
                        let post_id = worker * 1_000 + post;
                        registry.subscribe(id, post_id);
                        if post % 2 == 1 {
                            registry.unsubscribe(id, post_id);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let topics = registry.topics(id).unwrap();
        assert_eq!(topics.len(), 8 * 50);
        assert!(topics.iter().all(|post_id| post_id % 2 == 0));
    }
}
