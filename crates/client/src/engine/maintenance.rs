//! Timed eviction and connectivity-driven notifications.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use stash_core::{AppConfig, Error};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::host::{ClientMessage, Host};
use super::partitions::PartitionManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkStatus {
    Online,
    Offline,
}

pub struct MaintenanceScheduler {
    partitions: Arc<PartitionManager>,
    host: Arc<dyn Host>,
    interval: Duration,
    resync_tag: String,
}

impl MaintenanceScheduler {
    pub fn new(config: &AppConfig, partitions: Arc<PartitionManager>, host: Arc<dyn Host>) -> Self {
        Self { partitions, host, interval: config.eviction_interval(), resync_tag: config.resync_tag.clone() }
    }

    /// One eviction pass; returns the number of entries removed.
    pub async fn sweep(&self) -> Result<usize, Error> {
        self.partitions.evict().await
    }

    /// Run [`sweep`](Self::sweep) every interval until the handle is aborted.
    ///
    /// The first sweep happens one full interval after spawning.
    pub fn spawn_sweeps(self: &Arc<Self>) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(scheduler.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                match scheduler.sweep().await {
                    Ok(removed) => tracing::debug!(removed, "periodic sweep"),
                    Err(err) => tracing::warn!(error = %err, "periodic sweep failed"),
                }
            }
        })
    }

    /// Reconnect registers the resync task with the host; disconnect is only logged.
    pub async fn network_status_changed(&self, status: NetworkStatus) -> Result<(), Error> {
        match status {
            NetworkStatus::Online => {
                self.host.register_sync(&self.resync_tag).await?;
                tracing::info!(tag = %self.resync_tag, "back online; resync registered");
            }
            NetworkStatus::Offline => tracing::info!("network offline"),
        }
        Ok(())
    }

    /// A registered background task fired. Only the resync tag is handled.
    pub async fn background_sync(&self, tag: &str) -> Result<usize, Error> {
        if tag != self.resync_tag {
            tracing::debug!(tag, "ignoring background sync");
            return Ok(0);
        }
        self.notify(ClientMessage::SyncNotes).await
    }

    /// Push delivery: forward the message to clients, fire-and-forget.
    pub async fn push(&self, message: ClientMessage) -> Result<usize, Error> {
        self.notify(message).await
    }

    async fn notify(&self, message: ClientMessage) -> Result<usize, Error> {
        let delivered = self.host.broadcast(message).await?;
        tracing::debug!(?message, delivered, "notified clients");
        Ok(delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::host::ChannelHost;
    use crate::engine::testing::{FakeNetwork, get};
    use stash_core::{CacheStore, CachedResponse, MemoryStore, Response};

    fn scheduler(config: &AppConfig, store: &MemoryStore, host: &Arc<ChannelHost>) -> Arc<MaintenanceScheduler> {
        let partitions = Arc::new(
            PartitionManager::new(config, Arc::new(store.clone()), Arc::new(FakeNetwork::new()), host.clone())
                .unwrap(),
        );
        Arc::new(MaintenanceScheduler::new(config, partitions, host.clone()))
    }

    async fn fill(store: &MemoryStore, count: usize) {
        for i in 0..count {
            store
                .put("dynamic-v1", &get(&format!("/api/{i}")).key(), CachedResponse::from_response(&Response::new(200, "x")))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_sweep_evicts() {
        let store = MemoryStore::new();
        let host = Arc::new(ChannelHost::default());
        fill(&store, 101).await;

        let scheduler = scheduler(&AppConfig::default(), &store, &host);
        assert_eq!(scheduler.sweep().await.unwrap(), 1);
        assert_eq!(store.len("dynamic-v1").await, 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_sweep_runs_on_interval() {
        let store = MemoryStore::new();
        let host = Arc::new(ChannelHost::default());
        fill(&store, 105).await;

        let config = AppConfig { eviction_interval_ms: 60_000, ..Default::default() };
        let handle = scheduler(&config, &store, &host).spawn_sweeps();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(store.len("dynamic-v1").await, 105);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(store.len("dynamic-v1").await, 100);

        fill(&store, 103).await;
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(store.len("dynamic-v1").await, 100);

        handle.abort();
    }

    #[tokio::test]
    async fn test_reconnect_registers_resync() {
        let store = MemoryStore::new();
        let host = Arc::new(ChannelHost::default());
        let scheduler = scheduler(&AppConfig::default(), &store, &host);

        scheduler.network_status_changed(NetworkStatus::Offline).await.unwrap();
        assert!(host.sync_tags().is_empty());

        scheduler.network_status_changed(NetworkStatus::Online).await.unwrap();
        assert_eq!(host.sync_tags(), vec!["background-sync"]);
    }

    #[tokio::test]
    async fn test_background_sync_notifies_only_for_resync_tag() {
        let store = MemoryStore::new();
        let host = Arc::new(ChannelHost::default());
        let mut client = host.subscribe();
        let scheduler = scheduler(&AppConfig::default(), &store, &host);

        assert_eq!(scheduler.background_sync("other-task").await.unwrap(), 0);
        assert_eq!(scheduler.background_sync("background-sync").await.unwrap(), 1);
        assert_eq!(client.recv().await.unwrap(), ClientMessage::SyncNotes);
        assert!(client.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_push_forwards_message() {
        let store = MemoryStore::new();
        let host = Arc::new(ChannelHost::default());
        let mut client = host.subscribe();
        let scheduler = scheduler(&AppConfig::default(), &store, &host);

        assert_eq!(scheduler.push(ClientMessage::BackupNotes).await.unwrap(), 1);
        assert_eq!(client.recv().await.unwrap(), ClientMessage::BackupNotes);
    }

    #[tokio::test]
    async fn test_push_without_clients_is_not_an_error() {
        let store = MemoryStore::new();
        let host = Arc::new(ChannelHost::default());
        let scheduler = scheduler(&AppConfig::default(), &store, &host);
        assert_eq!(scheduler.push(ClientMessage::SyncNotes).await.unwrap(), 0);
    }
}
