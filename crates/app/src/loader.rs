//! Request-scoped batching of comment lookups.
//!
//! A `CommentLoader` is built for one inbound request and dropped with it.
//! Keys requested while a batch is open are collected until either
//! `max_batch` distinct keys are pending or `wait` passes without a new key,
//! then each distinct key is fetched exactly once and every waiter receives
//! the shared result. Successful results are cached for the rest of the
//! request; failures are handed to the waiters and not cached.

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::oneshot;
use tokio::time::{Instant, sleep_until};
use tracing::debug;

use agora_core::domain::comments::{Comment, CommentId};
use agora_core::domain::posts::PostId;
use agora_core::error::CoreError;
use agora_core::store::CommentStore;

pub type CommentBatch = Arc<Vec<Comment>>;

type LoadResult = Result<CommentBatch, CoreError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderConfig {
    pub max_batch: usize,
    pub wait: Duration,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_batch: 100,
            wait: Duration::from_micros(500),
        }
    }
}

/// One gateway lookup per key.
pub trait BatchFetch: Send + Sync + 'static {
    type Key: Copy + Eq + Hash + Debug + Send + Sync + 'static;

    const NAME: &'static str;

    fn fetch(&self, key: Self::Key) -> impl Future<Output = Result<Vec<Comment>, CoreError>> + Send;
}

/// Top-level comments of a post.
pub struct PostComments<S>(Arc<S>);

impl<S: CommentStore> BatchFetch for PostComments<S> {
    type Key = PostId;

    const NAME: &'static str = "post_comments";

    fn fetch(&self, key: PostId) -> impl Future<Output = Result<Vec<Comment>, CoreError>> + Send {
        self.0.get_comments_by_post_id(key)
    }
}

/// Direct children of a comment.
pub struct ChildComments<S>(Arc<S>);

impl<S: CommentStore> BatchFetch for ChildComments<S> {
    type Key = CommentId;

    const NAME: &'static str = "child_comments";

    fn fetch(&self, key: CommentId) -> impl Future<Output = Result<Vec<Comment>, CoreError>> + Send {
        self.0.get_comments_by_parent_id(key)
    }
}

pub struct BatchLoader<F: BatchFetch> {
    inner: Arc<Inner<F>>,
}

impl<F: BatchFetch> Clone for BatchLoader<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<F: BatchFetch> {
    fetcher: F,
    config: LoaderConfig,
    state: Mutex<LoaderState<F::Key>>,
}

struct LoaderState<K> {
    cache: HashMap<K, CommentBatch>,
    // Waiters for every key that is pending or in flight.
    waiters: HashMap<K, Vec<oneshot::Sender<LoadResult>>>,
    batch: Vec<K>,
    batch_seq: u64,
    last_arrival: Option<Instant>,
}

impl<K> LoaderState<K> {
    fn take_batch(&mut self) -> Vec<K> {
        self.batch_seq += 1;
        self.last_arrival = None;
        std::mem::take(&mut self.batch)
    }
}

enum Tick<K> {
    Idle,
    Wait(Instant),
    Fire(Vec<K>),
}

impl<F: BatchFetch> Inner<F> {
    fn lock(&self) -> MutexGuard<'_, LoaderState<F::Key>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<F: BatchFetch> BatchLoader<F> {
    pub fn new(fetcher: F, config: LoaderConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                fetcher,
                config: LoaderConfig {
                    max_batch: config.max_batch.max(1),
                    wait: config.wait,
                },
                state: Mutex::new(LoaderState {
                    cache: HashMap::new(),
                    waiters: HashMap::new(),
                    batch: Vec::new(),
                    batch_seq: 0,
                    last_arrival: None,
                }),
            }),
        }
    }

    pub async fn load(&self, key: F::Key) -> LoadResult {
        let receiver = {
            let mut state = self.inner.lock();
            if let Some(hit) = state.cache.get(&key) {
                return Ok(Arc::clone(hit));
            }
            let (sender, receiver) = oneshot::channel();
            if let Some(waiting) = state.waiters.get_mut(&key) {
                waiting.push(sender);
            } else {
                state.waiters.insert(key, vec![sender]);
                state.batch.push(key);
                state.last_arrival = Some(Instant::now());
                if state.batch.len() >= self.inner.config.max_batch {
                    let keys = state.take_batch();
                    tokio::spawn(Dispatch::new(Arc::clone(&self.inner), keys).run());
                } else if state.batch.len() == 1 {
                    tokio::spawn(wait_window(Arc::clone(&self.inner), state.batch_seq));
                }
            }
            receiver
        };
        receiver.await.unwrap_or_else(|_| {
            Err(CoreError::UpstreamUnavailable(format!(
                "{} batch was abandoned",
                F::NAME
            )))
        })
    }

    #[cfg(test)]
    fn cached(&self, key: F::Key) -> bool {
        self.inner.lock().cache.contains_key(&key)
    }
}

async fn wait_window<F: BatchFetch>(inner: Arc<Inner<F>>, seq: u64) {
    loop {
        let tick = {
            let mut state = inner.lock();
            if state.batch_seq != seq || state.batch.is_empty() {
                Tick::Idle
            } else {
                let now = Instant::now();
                let deadline = state
                    .last_arrival
                    .map_or(now, |arrival| arrival + inner.config.wait);
                if deadline <= now {
                    Tick::Fire(state.take_batch())
                } else {
                    Tick::Wait(deadline)
                }
            }
        };
        match tick {
            Tick::Idle => return,
            Tick::Wait(deadline) => sleep_until(deadline).await,
            Tick::Fire(keys) => {
                Dispatch::new(inner, keys).run().await;
                return;
            }
        }
    }
}

/// A taken batch. Dropping it before `run` completes releases the waiters,
/// which then observe an abandoned batch instead of hanging.
struct Dispatch<F: BatchFetch> {
    inner: Arc<Inner<F>>,
    keys: Vec<F::Key>,
}

impl<F: BatchFetch> Dispatch<F> {
    fn new(inner: Arc<Inner<F>>, keys: Vec<F::Key>) -> Self {
        Self { inner, keys }
    }

    async fn run(mut self) {
        debug!(loader = F::NAME, keys = self.keys.len(), "dispatching batch");
        let results = join_all(self.keys.iter().map(|key| self.inner.fetcher.fetch(*key))).await;

        let deliveries: Vec<_> = {
            let mut state = self.inner.lock();
            self.keys
                .drain(..)
                .zip(results)
                .map(|(key, result)| {
                    let result = result.map(Arc::new);
                    if let Ok(batch) = &result {
                        state.cache.insert(key, Arc::clone(batch));
                    }
                    (state.waiters.remove(&key).unwrap_or_default(), result)
                })
                .collect()
        };

        for (waiters, result) in deliveries {
            for waiter in waiters {
                let _ = waiter.send(result.clone());
            }
        }
    }
}

impl<F: BatchFetch> Drop for Dispatch<F> {
    fn drop(&mut self) {
        if self.keys.is_empty() {
            return;
        }
        let mut state = self.inner.lock();
        for key in &self.keys {
            state.waiters.remove(key);
        }
    }
}

/// The two keyed loaders a comment listing needs within one request.
pub struct CommentLoader<S: CommentStore> {
    pub by_post: BatchLoader<PostComments<S>>,
    pub by_parent: BatchLoader<ChildComments<S>>,
}

impl<S: CommentStore> CommentLoader<S> {
    pub fn new(store: Arc<S>, config: LoaderConfig) -> Self {
        Self {
            by_post: BatchLoader::new(PostComments(Arc::clone(&store)), config),
            by_parent: BatchLoader::new(ChildComments(store), config),
        }
    }
}

impl<S: CommentStore> Clone for CommentLoader<S> {
    fn clone(&self) -> Self {
        Self {
            by_post: self.by_post.clone(),
            by_parent: self.by_parent.clone(),
        }
    }
}
