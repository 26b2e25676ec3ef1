//! Hub actor and its handle

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::subscriber::Subscriber;

/// Identifier of one registered connection
pub type ConnectionId = Uuid;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HubError {
    #[error("Hub event loop has stopped")]
    Stopped,
}

/// Hub tuning
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Deadline for a single subscriber write
    pub write_timeout: Duration,
    /// Depth of the command queue between handles and the event loop
    pub queue_depth: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            write_timeout: Duration::from_secs(10),
            queue_depth: 256,
        }
    }
}

enum Command {
    Register {
        group: String,
        id: ConnectionId,
        subscriber: Box<dyn Subscriber>,
    },
    Unregister {
        group: String,
        id: ConnectionId,
    },
    Broadcast {
        group: String,
        payload: Arc<str>,
    },
    Snapshot {
        reply: oneshot::Sender<BTreeMap<String, usize>>,
    },
}

/// Cloneable entry point to a running hub.
///
/// Every method returns once the event loop has accepted the command, not
/// when the command has been carried out.
#[derive(Clone)]
pub struct HubHandle {
    tx: mpsc::Sender<Command>,
}

impl HubHandle {
    /// Add `subscriber` to `group`, creating the group on first member
    pub async fn register(
        &self,
        group: impl Into<String>,
        subscriber: Box<dyn Subscriber>,
    ) -> Result<ConnectionId, HubError> {
        let id = Uuid::new_v4();
        self.send(Command::Register {
            group: group.into(),
            id,
            subscriber,
        })
        .await?;
        Ok(id)
    }

    /// Remove and close a connection. Unknown ids are ignored.
    pub async fn unregister(&self, group: impl Into<String>, id: ConnectionId) -> Result<(), HubError> {
        self.send(Command::Unregister {
            group: group.into(),
            id,
        })
        .await
    }

    /// Best-effort delivery of `payload` to the current members of `group`
    pub async fn broadcast(
        &self,
        group: impl Into<String>,
        payload: impl Into<String>,
    ) -> Result<(), HubError> {
        let payload: String = payload.into();
        self.send(Command::Broadcast {
            group: group.into(),
            payload: Arc::from(payload),
        })
        .await
    }

    /// Member count per live group
    pub async fn group_sizes(&self) -> Result<BTreeMap<String, usize>, HubError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot { reply }).await?;
        rx.await.map_err(|_| HubError::Stopped)
    }

    async fn send(&self, command: Command) -> Result<(), HubError> {
        self.tx.send(command).await.map_err(|_| HubError::Stopped)
    }
}

/// The hub event loop state
pub struct Hub {
    config: HubConfig,
    rx: mpsc::Receiver<Command>,
    groups: HashMap<String, HashMap<ConnectionId, Box<dyn Subscriber>>>,
}

impl Hub {
    /// Start the event loop. It runs until every [`HubHandle`] is dropped.
    pub fn spawn(config: HubConfig) -> (HubHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.queue_depth.max(1));
        let hub = Hub {
            config,
            rx,
            groups: HashMap::new(),
        };
        let handle = tokio::spawn(hub.run());
        (HubHandle { tx }, handle)
    }

    async fn run(mut self) {
        info!("Broadcast hub started");
        while let Some(command) = self.rx.recv().await {
            match command {
                Command::Register {
                    group,
                    id,
                    subscriber,
                } => self.register(group, id, subscriber),
                Command::Unregister { group, id } => self.unregister(&group, id).await,
                Command::Broadcast { group, payload } => self.broadcast(&group, &payload).await,
                Command::Snapshot { reply } => {
                    let _ = reply.send(self.snapshot());
                }
            }
        }
        self.shutdown().await;
    }

    fn register(&mut self, group: String, id: ConnectionId, subscriber: Box<dyn Subscriber>) {
        let members = self.groups.entry(group.clone()).or_default();
        members.insert(id, subscriber);
        debug!(%group, %id, members = members.len(), "Subscriber registered");
    }

    async fn unregister(&mut self, group: &str, id: ConnectionId) {
        let Some(members) = self.groups.get_mut(group) else {
            return;
        };
        if let Some(subscriber) = members.remove(&id) {
            close_within(self.config.write_timeout, subscriber, group, id).await;
            debug!(%group, %id, "Subscriber unregistered");
        }
        if members.is_empty() {
            self.groups.remove(group);
        }
    }

    async fn broadcast(&mut self, group: &str, payload: &str) {
        let Some(members) = self.groups.get_mut(group) else {
            debug!(%group, "Broadcast to empty group dropped");
            return;
        };

        let mut failed = Vec::new();
        for (id, subscriber) in members.iter_mut() {
            match tokio::time::timeout(self.config.write_timeout, subscriber.send_text(payload)).await
            {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(%group, %id, error = %e, "Subscriber write failed, dropping");
                    failed.push(*id);
                }
                Err(_) => {
                    warn!(%group, %id, "Subscriber write timed out, dropping");
                    failed.push(*id);
                }
            }
        }

        for id in failed {
            if let Some(subscriber) = members.remove(&id) {
                close_within(self.config.write_timeout, subscriber, group, id).await;
            }
        }
        if members.is_empty() {
            self.groups.remove(group);
        }
    }

    fn snapshot(&self) -> BTreeMap<String, usize> {
        self.groups
            .iter()
            .map(|(group, members)| (group.clone(), members.len()))
            .collect()
    }

    async fn shutdown(&mut self) {
        let count: usize = self.groups.values().map(HashMap::len).sum();
        let deadline = self.config.write_timeout;
        for (group, members) in self.groups.drain() {
            for (id, subscriber) in members {
                close_within(deadline, subscriber, &group, id).await;
            }
        }
        info!(closed = count, "Broadcast hub stopped");
    }
}

/// Close a subscriber, giving up after `deadline`. The subscriber is dropped either way.
async fn close_within(
    deadline: Duration,
    mut subscriber: Box<dyn Subscriber>,
    group: &str,
    id: ConnectionId,
) {
    if tokio::time::timeout(deadline, subscriber.close()).await.is_err() {
        warn!(%group, %id, "Subscriber close timed out");
    }
}
