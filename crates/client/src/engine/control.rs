//! Control protocol: out-of-band commands with an optional reply port.
//!
//! | type           | data              | reply                                   |
//! |----------------|-------------------|-----------------------------------------|
//! | `SKIP_WAITING` | none              | none                                    |
//! | `GET_VERSION`  | none              | `{type:"VERSION", version}`             |
//! | `CLEAR_CACHE`  | none              | `{type:"CACHE_CLEARED", success}`       |
//! | `PREFETCH`     | `{urls: string[]}`| none                                    |
//!
//! Malformed or unknown messages are logged and dropped; the reply port is
//! dropped unanswered, so callers waiting on it see the channel close.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use stash_core::{Error, PartitionRole, Request};
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use url::Url;

use super::partitions::PartitionManager;
use super::strategy::CacheStrategyEngine;
use crate::fetch::canonicalize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    SkipWaiting,
    GetVersion,
    ClearCache,
    Prefetch(PrefetchData),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefetchData {
    pub urls: Vec<String>,
}

impl ControlMessage {
    pub fn decode(raw: Value) -> Result<Self, Error> {
        serde_json::from_value(raw).map_err(|e| Error::ProtocolError(e.to_string()))
    }
}

/// Typed reply, one variant per message type that answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlReply {
    Version { version: String },
    CacheCleared { success: bool },
}

pub type ReplyPort = oneshot::Sender<ControlReply>;

/// Per-batch prefetch tally. Which URLs failed is only logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrefetchReport {
    pub stored: usize,
    pub failed: usize,
}

pub struct ControlChannel {
    partitions: Arc<PartitionManager>,
    strategies: CacheStrategyEngine,
    origin: Url,
}

impl ControlChannel {
    pub fn new(partitions: Arc<PartitionManager>, strategies: CacheStrategyEngine, origin: Url) -> Self {
        Self { partitions, strategies, origin }
    }

    /// Decode and handle a raw envelope. Never fails: protocol errors are logged.
    pub async fn dispatch(&self, raw: Value, reply: Option<ReplyPort>) {
        match ControlMessage::decode(raw) {
            Ok(message) => self.handle(message, reply).await,
            Err(err) => tracing::warn!(error = %err, "dropping control message"),
        }
    }

    pub async fn handle(&self, message: ControlMessage, reply: Option<ReplyPort>) {
        tracing::debug!(?message, has_reply = reply.is_some(), "control message");

        match message {
            ControlMessage::SkipWaiting => {
                if let Err(err) = self.partitions.skip_waiting().await {
                    tracing::warn!(error = %err, "skip waiting failed");
                }
            }
            ControlMessage::GetVersion => {
                let version = self.partitions.partition_for(PartitionRole::Static).await;
                send(reply, ControlReply::Version { version });
            }
            ControlMessage::ClearCache => {
                let success = match self.partitions.clear_all().await {
                    Ok(_) => true,
                    Err(err) => {
                        tracing::warn!(error = %err, "clear cache failed");
                        false
                    }
                };
                send(reply, ControlReply::CacheCleared { success });
            }
            ControlMessage::Prefetch(data) => {
                self.prefetch(&data.urls).await;
            }
        }
    }

    /// Fetch and store each URL into the dynamic partition, independently and concurrently.
    pub async fn prefetch(&self, urls: &[String]) -> PrefetchReport {
        let partition = self.partitions.partition_for(PartitionRole::Dynamic).await;
        let mut report = PrefetchReport::default();
        let mut tasks = JoinSet::new();

        for raw in urls {
            let url = match canonicalize(raw, &self.origin) {
                Ok(url) => url,
                Err(err) => {
                    tracing::warn!(url = %raw, error = %err, "skipping prefetch url");
                    report.failed += 1;
                    continue;
                }
            };

            let strategies = self.strategies.clone();
            let partition = partition.clone();
            tasks.spawn(async move {
                let request = Request::get(url);
                match strategies.network().fetch(&request).await {
                    Ok(response) => {
                        let stored = strategies.store_if_eligible(&partition, &request.key(), &response).await;
                        if !stored {
                            tracing::warn!(url = %request.url, status = response.status, "prefetch response not stored");
                        }
                        stored
                    }
                    Err(err) => {
                        tracing::warn!(url = %request.url, error = %err, "prefetch failed");
                        false
                    }
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(true) => report.stored += 1,
                Ok(false) => report.failed += 1,
                Err(err) => {
                    tracing::warn!(error = %err, "prefetch task aborted");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(%partition, stored = report.stored, failed = report.failed, "prefetch done");
        report
    }
}

fn send(reply: Option<ReplyPort>, message: ControlReply) {
    match reply {
        Some(port) => {
            if port.send(message).is_err() {
                tracing::debug!("reply port closed before reply");
            }
        }
        None => tracing::debug!(?message, "no reply port"),
    }
}
