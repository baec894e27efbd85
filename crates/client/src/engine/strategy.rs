//! The three fetch/cache algorithms.
//!
//! ### Cache-first
//! Serve a stored entry immediately and refresh it in the background; on a miss,
//! fetch, store and return.
//!
//! ### Network-first
//! Fetch (bounded by the configured timeout); on a 2xx, store and return the live
//! response. On rejection, timeout or a non-ok status, serve the stored entry if
//! there is one, else surface the original failure.
//!
//! ### Stale-while-revalidate
//! Serve a stored entry immediately while a detached task refetches it; on a miss,
//! wait for that task's result.
//!
//! Background writers are not coordinated with foreground writes to the same key:
//! the last `put` wins.

use std::sync::Arc;
use std::time::Duration;

use stash_core::{CacheStore, CachedResponse, Error, Request, RequestKey, Response};

use super::classify::Strategy;
use crate::fetch::Network;

/// Runs strategies against an injected store and network.
#[derive(Clone)]
pub struct CacheStrategyEngine {
    store: Arc<dyn CacheStore>,
    network: Arc<dyn Network>,
    network_timeout: Duration,
}

impl CacheStrategyEngine {
    pub fn new(store: Arc<dyn CacheStore>, network: Arc<dyn Network>, network_timeout: Duration) -> Self {
        Self { store, network, network_timeout }
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub fn network(&self) -> &Arc<dyn Network> {
        &self.network
    }

    pub async fn execute(&self, strategy: Strategy, partition: &str, request: &Request) -> Result<Response, Error> {
        match strategy {
            Strategy::CacheFirst => self.cache_first(partition, request).await,
            Strategy::NetworkFirst => self.network_first(partition, request).await,
            Strategy::StaleWhileRevalidate => self.stale_while_revalidate(partition, request).await,
        }
    }

    pub async fn cache_first(&self, partition: &str, request: &Request) -> Result<Response, Error> {
        let key = request.key();

        if let Some(entry) = self.store.match_entry(partition, &key).await? {
            tracing::debug!(%key, partition, "cache-first hit");
            self.spawn_refresh(partition, request);
            return Ok(entry.into());
        }

        tracing::debug!(%key, partition, "cache-first miss");
        self.fetch_and_store(partition, request).await
    }

    pub async fn network_first(&self, partition: &str, request: &Request) -> Result<Response, Error> {
        let key = request.key();

        let failure = match tokio::time::timeout(self.network_timeout, self.network.fetch(request)).await {
            Ok(Ok(response)) if response.is_ok() => {
                self.store_if_eligible(partition, &key, &response).await;
                return Ok(response);
            }
            Ok(Ok(response)) => Error::NetworkFailure(format!("status {} for {}", response.status, request.url)),
            Ok(Err(err)) => err,
            Err(_) => Error::NetworkFailure(format!(
                "no response for {} within {}ms",
                request.url,
                self.network_timeout.as_millis()
            )),
        };

        match self.store.match_entry(partition, &key).await? {
            Some(entry) => {
                tracing::debug!(%key, partition, error = %failure, "network-first fell back to cache");
                Ok(entry.into())
            }
            None => Err(failure),
        }
    }

    pub async fn stale_while_revalidate(&self, partition: &str, request: &Request) -> Result<Response, Error> {
        let key = request.key();
        let cached = self.store.match_entry(partition, &key).await?;

        let engine = self.clone();
        let owned_partition = partition.to_string();
        let owned_request = request.clone();
        let update = tokio::spawn(async move {
            let result = engine.fetch_and_store(&owned_partition, &owned_request).await;
            if let Err(err) = &result {
                tracing::debug!(url = %owned_request.url, error = %err, "revalidation failed");
            }
            result
        });

        match cached {
            Some(entry) => {
                tracing::debug!(%key, partition, "stale-while-revalidate hit");
                Ok(entry.into())
            }
            None => update
                .await
                .map_err(|e| Error::NetworkFailure(format!("revalidation task aborted: {e}")))?,
        }
    }

    /// Write an eligible response; returns whether it was stored.
    ///
    /// Store failures are logged, not raised: the caller still gets the response.
    pub async fn store_if_eligible(&self, partition: &str, key: &RequestKey, response: &Response) -> bool {
        if !response.is_cacheable() {
            tracing::debug!(%key, status = response.status, kind = ?response.response_type, "not storing response");
            return false;
        }

        match self.store.put(partition, key, CachedResponse::from_response(response)).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(%key, partition, error = %err, "failed to store response");
                false
            }
        }
    }

    async fn fetch_and_store(&self, partition: &str, request: &Request) -> Result<Response, Error> {
        let response = self.network.fetch(request).await?;
        self.store_if_eligible(partition, &request.key(), &response).await;
        Ok(response)
    }

    fn spawn_refresh(&self, partition: &str, request: &Request) {
        let engine = self.clone();
        let partition = partition.to_string();
        let request = request.clone();

        tokio::spawn(async move {
            match engine.fetch_and_store(&partition, &request).await {
                Ok(response) => tracing::debug!(url = %request.url, status = response.status, "background refresh done"),
                Err(err) => tracing::debug!(url = %request.url, error = %err, "background refresh failed"),
            }
        });
    }
}
