//! The hosting environment as seen by the engine.
//!
//! The engine never talks to application pages directly. It asks the host to
//! claim open clients, to register background tasks, and to deliver
//! fire-and-forget messages.

use serde::{Deserialize, Serialize};
use stash_core::Error;
use std::sync::Mutex;
use tokio::sync::broadcast;

/// Message delivered to every in-scope client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    SyncNotes,
    BackupNotes,
}

/// Capabilities the engine needs from whatever hosts it.
#[async_trait::async_trait]
pub trait Host: Send + Sync {
    /// Take control of already-open clients after activation.
    async fn claim_clients(&self) -> Result<(), Error>;

    /// Register a named background resync task.
    async fn register_sync(&self, tag: &str) -> Result<(), Error>;

    /// Deliver a message to every in-scope client; returns how many received it.
    async fn broadcast(&self, message: ClientMessage) -> Result<usize, Error>;
}

/// Host backed by a tokio broadcast channel.
///
/// Clients subscribe to receive messages; registered sync tags and claim
/// calls are recorded for inspection.
pub struct ChannelHost {
    sender: broadcast::Sender<ClientMessage>,
    sync_tags: Mutex<Vec<String>>,
    claims: Mutex<usize>,
}

impl ChannelHost {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, sync_tags: Mutex::new(Vec::new()), claims: Mutex::new(0) }
    }

    /// Attach a client.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientMessage> {
        self.sender.subscribe()
    }

    /// Sync tags registered so far, oldest first.
    pub fn sync_tags(&self) -> Vec<String> {
        self.sync_tags.lock().map(|tags| tags.clone()).unwrap_or_default()
    }

    /// Number of times clients were claimed.
    pub fn claims(&self) -> usize {
        self.claims.lock().map(|c| *c).unwrap_or(0)
    }
}

impl Default for ChannelHost {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait::async_trait]
impl Host for ChannelHost {
    async fn claim_clients(&self) -> Result<(), Error> {
        let mut claims = self
            .claims
            .lock()
            .map_err(|_| Error::InvalidState("host state poisoned".into()))?;
        *claims += 1;
        Ok(())
    }

    async fn register_sync(&self, tag: &str) -> Result<(), Error> {
        let mut tags = self
            .sync_tags
            .lock()
            .map_err(|_| Error::InvalidState("host state poisoned".into()))?;
        tags.push(tag.to_string());
        Ok(())
    }

    async fn broadcast(&self, message: ClientMessage) -> Result<usize, Error> {
        // No subscribers is not an error: there is simply nobody to notify.
        Ok(self.sender.send(message).unwrap_or(0))
    }
}
