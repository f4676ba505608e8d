//! Connection registry.
//!
//! One registry per logical channel. Handles hold the sending half of a
//! bounded queue; the stream task on the gateway side owns the receiving
//! half. A registry never blocks on a slow client: a full queue drops the
//! frame, a closed queue marks the client dead.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{mpsc, RwLock};
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use super::protocol::OutboundMessage;

/// A connected client as seen by the registry.
#[derive(Debug)]
pub struct ClientHandle {
    pub id: Uuid,
    pub sender: mpsc::Sender<OutboundMessage>,
    pub connected_at: chrono::DateTime<chrono::Utc>,
    pub last_seen: Instant,
}

/// Result of a non-blocking send attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Frame queued for the client.
    Sent,
    /// Client queue full; frame dropped, connection kept.
    Full,
    /// Client missing or its stream ended; caller should treat it as gone.
    Gone,
}

/// Keyed set of live client connections.
pub struct ClientRegistry {
    name: &'static str,
    clients: RwLock<HashMap<String, ClientHandle>>,
}

impl ClientRegistry {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Register a connection under `key`, replacing any earlier connection
    /// for the same key. Reconnects land here with the same session id.
    pub async fn register(&self, key: &str, sender: mpsc::Sender<OutboundMessage>) -> Uuid {
        let handle = ClientHandle {
            id: Uuid::new_v4(),
            sender,
            connected_at: chrono::Utc::now(),
            last_seen: Instant::now(),
        };
        let id = handle.id;
        let replaced = self
            .clients
            .write()
            .await
            .insert(key.to_string(), handle)
            .is_some();
        info!(
            channel = self.name,
            key,
            client_id = %id,
            replaced,
            "client connected"
        );
        id
    }

    /// Drop a connection. Returns false if the key was not registered or is
    /// already owned by a newer connection.
    pub async fn unregister(&self, key: &str, id: Uuid) -> bool {
        let mut clients = self.clients.write().await;
        match clients.get(key) {
            Some(handle) if handle.id == id => {
                clients.remove(key);
                info!(channel = self.name, key, client_id = %id, "client disconnected");
                true
            }
            _ => false,
        }
    }

    /// Send one frame to one client without blocking.
    pub async fn try_send(&self, key: &str, message: OutboundMessage) -> SendOutcome {
        let outcome = {
            let clients = self.clients.read().await;
            match clients.get(key) {
                None => SendOutcome::Gone,
                Some(handle) => match handle.sender.try_send(message) {
                    Ok(()) => SendOutcome::Sent,
                    Err(mpsc::error::TrySendError::Full(_)) => SendOutcome::Full,
                    Err(mpsc::error::TrySendError::Closed(_)) => SendOutcome::Gone,
                },
            }
        };
        match outcome {
            SendOutcome::Full => {
                debug!(channel = self.name, key, "client queue full, frame dropped");
            }
            SendOutcome::Gone => {
                if self.clients.write().await.remove(key).is_some() {
                    info!(channel = self.name, key, "pruned dead client");
                }
            }
            SendOutcome::Sent => {}
        }
        outcome
    }

    /// Send one frame to every client. Dead clients found along the way are
    /// pruned; the broadcast itself never fails.
    pub async fn broadcast(&self, message: &OutboundMessage) -> (usize, usize) {
        let mut dead = Vec::new();
        let mut delivered = 0usize;
        {
            let clients = self.clients.read().await;
            for (key, handle) in clients.iter() {
                match handle.sender.try_send(message.clone()) {
                    Ok(()) => delivered += 1,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        debug!(channel = self.name, key, "client queue full, frame dropped");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => dead.push(key.clone()),
                }
            }
        }
        let pruned = dead.len();
        if !dead.is_empty() {
            let mut clients = self.clients.write().await;
            for key in dead {
                if clients.remove(&key).is_some() {
                    info!(channel = self.name, key, "pruned dead client");
                }
            }
        }
        (delivered, pruned)
    }

    /// Refresh the liveness clock for `key`. Inbound traffic counts as proof
    /// of life.
    pub async fn mark_seen(&self, key: &str) -> bool {
        let mut clients = self.clients.write().await;
        match clients.get_mut(key) {
            Some(handle) => {
                handle.last_seen = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Remove every client silent for longer than `timeout`.
    pub async fn prune_idle(&self, timeout: Duration) -> usize {
        let mut clients = self.clients.write().await;
        let before = clients.len();
        clients.retain(|key, handle| {
            let keep = handle.last_seen.elapsed() <= timeout;
            if !keep {
                info!(channel = self.name, key, "pruned idle client");
            }
            keep
        });
        before - clients.len()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.clients.read().await.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.read().await.is_empty()
    }
}
