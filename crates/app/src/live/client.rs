//! One listener task per live connection.
//!
//! Commands travel over a single ordered channel so a subscribe followed by
//! an unsubscribe of the same post is applied in that order. The listener
//! exits on `Terminate`, on process shutdown, or once the connection drops
//! the receiving end of its delivery channel, and always deregisters first.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use agora_core::domain::comments::Comment;
use agora_core::domain::posts::PostId;

use crate::live::registry::{ClientId, Delivery, SubscriptionRegistry};

const COMMAND_BUFFER: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCommand {
    Subscribe(PostId),
    Unsubscribe(PostId),
    Terminate,
}

#[derive(Debug, Error)]
#[error("subscription client {0} is gone")]
pub struct ClientGone(pub ClientId);

#[derive(Debug, Clone)]
pub struct ClientControl {
    id: ClientId,
    commands: mpsc::Sender<ClientCommand>,
}

impl ClientControl {
    pub fn id(&self) -> ClientId {
        self.id
    }

    pub async fn subscribe(&self, post_id: PostId) -> Result<(), ClientGone> {
        self.send(ClientCommand::Subscribe(post_id)).await
    }

    pub async fn unsubscribe(&self, post_id: PostId) -> Result<(), ClientGone> {
        self.send(ClientCommand::Unsubscribe(post_id)).await
    }

    pub async fn terminate(&self) -> Result<(), ClientGone> {
        self.send(ClientCommand::Terminate).await
    }

    async fn send(&self, command: ClientCommand) -> Result<(), ClientGone> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ClientGone(self.id))
    }
}

pub struct SubscriptionClient {
    id: ClientId,
    commands: mpsc::Receiver<ClientCommand>,
    events: Delivery,
}

impl SubscriptionClient {
    /// Creates a client, registers it with an empty subscription set and
    /// hands back its listener, its control handle and the receiving end of
    /// its delivery channel.
    pub fn register(
        registry: &SubscriptionRegistry,
        buffer: usize,
    ) -> (Self, ClientControl, mpsc::Receiver<Arc<Comment>>) {
        let id = registry.next_client_id();
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (event_tx, event_rx) = mpsc::channel(buffer.max(1));
        let control = ClientControl {
            id,
            commands: command_tx,
        };
        registry.add_client(control.clone(), event_tx.clone());
        let client = Self {
            id,
            commands: command_rx,
            events: event_tx,
        };
        (client, control, event_rx)
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub async fn listen(mut self, registry: Arc<SubscriptionRegistry>, shutdown: CancellationToken) {
        info!(client_id = %self.id, "subscription client listening");
        let reason = loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break "shutdown",
                _ = self.events.closed() => break "connection closed",
                command = self.commands.recv() => match command {
                    Some(ClientCommand::Subscribe(post_id)) => {
                        registry.subscribe(self.id, post_id);
                        debug!(client_id = %self.id, post_id, "subscribed");
                    }
                    Some(ClientCommand::Unsubscribe(post_id)) => {
                        registry.unsubscribe(self.id, post_id);
                        debug!(client_id = %self.id, post_id, "unsubscribed");
                    }
                    Some(ClientCommand::Terminate) => break "terminated",
                    None => break "deregistered",
                },
            }
        };
        registry.remove_client(self.id);
        info!(client_id = %self.id, reason, "subscription client stopped");
    }
}
