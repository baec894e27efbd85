//! The caching engine: an explicit dispatcher over a closed set of events.
//!
//! ### Events
//! - `Install` / `Activate`: partition lifecycle
//! - `Fetch`: classify, run the chosen strategy, degrade on failure
//! - `Message`: control protocol
//! - `PeriodicSweep`, `NetworkStatusChange`, `BackgroundSync`, `Push`: maintenance
//!
//! ### Failure boundary
//! When a strategy fails, navigations get the static partition's offline
//! document (or `503 Offline`) and everything else gets `503 Network error`.
//! Bypassed requests go straight to the network, unclassified and unstored.

pub mod classify;
pub mod control;
pub mod host;
pub mod maintenance;
pub mod partitions;
pub mod strategy;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use stash_core::{AppConfig, CacheStore, Error, PartitionRole, Request, RequestKey, Response};

pub use classify::{Classification, ClassificationRule, Matcher, RequestClassifier, Strategy};
pub use control::{ControlChannel, ControlMessage, ControlReply, PrefetchData, PrefetchReport, ReplyPort};
pub use host::{ChannelHost, ClientMessage, Host};
pub use maintenance::{MaintenanceScheduler, NetworkStatus};
pub use partitions::{ActivateOutcome, InstallOutcome, PartitionManager, Phase};
pub use strategy::CacheStrategyEngine;

use crate::fetch::Network;

/// Everything the engine reacts to.
#[derive(Debug)]
pub enum Event {
    Install,
    Activate,
    Fetch(Request),
    Message { message: Value, reply: Option<ReplyPort> },
    PeriodicSweep,
    NetworkStatusChange(NetworkStatus),
    BackgroundSync { tag: String },
    Push(ClientMessage),
}

/// Result of handling one [`Event`].
#[derive(Debug)]
pub enum Outcome {
    Installed(InstallOutcome),
    Activated(ActivateOutcome),
    Response(FetchOutcome),
    Swept(usize),
    Notified(usize),
    Handled,
}

/// Which path produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Passthrough,
    CacheFirst,
    NetworkFirst,
    StaleWhileRevalidate,
    OfflineDocument,
    Synthesized,
}

impl From<Strategy> for ResponseSource {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::CacheFirst => ResponseSource::CacheFirst,
            Strategy::NetworkFirst => ResponseSource::NetworkFirst,
            Strategy::StaleWhileRevalidate => ResponseSource::StaleWhileRevalidate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub response: Response,
    pub source: ResponseSource,
}

pub struct Engine {
    config: AppConfig,
    classifier: RequestClassifier,
    strategies: CacheStrategyEngine,
    partitions: Arc<PartitionManager>,
    control: ControlChannel,
    maintenance: Arc<MaintenanceScheduler>,
    offline_document: RequestKey,
}

impl Engine {
    pub fn new(
        config: AppConfig, store: Arc<dyn CacheStore>, network: Arc<dyn Network>, host: Arc<dyn Host>,
    ) -> Result<Self, Error> {
        let origin = config.origin_url().map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let offline_url = origin
            .join(&config.offline_document)
            .map_err(|e| Error::InvalidUrl(format!("{}: {e}", config.offline_document)))?;

        let strategies = CacheStrategyEngine::new(store.clone(), network.clone(), config.network_timeout());
        let partitions = Arc::new(PartitionManager::new(&config, store, network, host.clone())?);
        let control = ControlChannel::new(partitions.clone(), strategies.clone(), origin);
        let maintenance = Arc::new(MaintenanceScheduler::new(&config, partitions.clone(), host));

        Ok(Self {
            classifier: RequestClassifier::from_config(&config),
            strategies,
            partitions,
            control,
            maintenance,
            offline_document: RequestKey::get(&offline_url),
            config,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn classifier(&self) -> &RequestClassifier {
        &self.classifier
    }

    pub fn partitions(&self) -> &Arc<PartitionManager> {
        &self.partitions
    }

    pub fn control(&self) -> &ControlChannel {
        &self.control
    }

    pub fn maintenance(&self) -> &Arc<MaintenanceScheduler> {
        &self.maintenance
    }

    pub async fn dispatch(&self, event: Event) -> Result<Outcome, Error> {
        match event {
            Event::Install => self.partitions.install().await.map(Outcome::Installed),
            Event::Activate => self.partitions.activate().await.map(Outcome::Activated),
            Event::Fetch(request) => self.handle_fetch(&request).await.map(Outcome::Response),
            Event::Message { message, reply } => {
                self.control.dispatch(message, reply).await;
                Ok(Outcome::Handled)
            }
            Event::PeriodicSweep => self.maintenance.sweep().await.map(Outcome::Swept),
            Event::NetworkStatusChange(status) => {
                self.maintenance.network_status_changed(status).await?;
                Ok(Outcome::Handled)
            }
            Event::BackgroundSync { tag } => self.maintenance.background_sync(&tag).await.map(Outcome::Notified),
            Event::Push(message) => self.maintenance.push(message).await.map(Outcome::Notified),
        }
    }

    /// Resume persisted partitions; install and activate if this version is not live yet.
    ///
    /// A failed install is logged and leaves the adopted partitions serving.
    pub async fn start(&self) -> Result<Phase, Error> {
        if self.partitions.resume().await? == Phase::Active {
            return Ok(Phase::Active);
        }

        match self.dispatch(Event::Install).await {
            Ok(Outcome::Installed(outcome))
                if outcome.skip_waiting && self.partitions.phase().await == Phase::Installed =>
            {
                self.dispatch(Event::Activate).await?;
            }
            Ok(_) => {}
            Err(err) => tracing::warn!(error = %err, "install failed; serving previous partitions"),
        }

        Ok(self.partitions.phase().await)
    }

    /// Errors only for bypassed requests, whose network failure is not intercepted.
    pub async fn handle_fetch(&self, request: &Request) -> Result<FetchOutcome, Error> {
        let Some(classification) = self.classifier.classify(request) else {
            tracing::debug!(method = %request.method, url = %request.url, "bypass");
            let response = self.strategies.network().fetch(request).await?;
            return Ok(FetchOutcome { response, source: ResponseSource::Passthrough });
        };

        let partition = self.partitions.partition_for(classification.role).await;
        match self.strategies.execute(classification.strategy, &partition, request).await {
            Ok(response) => Ok(FetchOutcome { response, source: classification.strategy.into() }),
            Err(err) => {
                tracing::warn!(url = %request.url, strategy = ?classification.strategy, error = %err, "request failed");
                Ok(self.degrade(request).await)
            }
        }
    }

    async fn degrade(&self, request: &Request) -> FetchOutcome {
        if !request.is_navigation() {
            return FetchOutcome { response: Response::synthesized(503, "Network error"), source: ResponseSource::Synthesized };
        }

        let partition = self.partitions.partition_for(PartitionRole::Static).await;
        match self.strategies.store().match_entry(&partition, &self.offline_document).await {
            Ok(Some(entry)) => {
                return FetchOutcome { response: entry.into(), source: ResponseSource::OfflineDocument };
            }
            Ok(None) => tracing::debug!(%partition, "no offline document"),
            Err(err) => tracing::warn!(%partition, error = %err, "offline document lookup failed"),
        }

        FetchOutcome { response: Response::synthesized(503, "Offline"), source: ResponseSource::Synthesized }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stash_core::MemoryStore;
    use super::testing::{FakeNetwork, get, url};
    use tokio::sync::oneshot;

    struct Fixture {
        store: MemoryStore,
        network: Arc<FakeNetwork>,
        host: Arc<ChannelHost>,
        engine: Engine,
    }

    fn fixture(config: AppConfig) -> Fixture {
        let store = MemoryStore::new();
        let network = Arc::new(FakeNetwork::new());
        let host = Arc::new(ChannelHost::default());
        for path in &config.manifest {
            network.serve(path, "asset");
        }
        network.serve("/", "<html>offline shell</html>");
        let engine = Engine::new(config, Arc::new(store.clone()), network.clone(), host.clone()).unwrap();
        Fixture { store, network, host, engine }
    }

    async fn fetch(engine: &Engine, request: Request) -> FetchOutcome {
        match engine.dispatch(Event::Fetch(request)).await.unwrap() {
            Outcome::Response(outcome) => outcome,
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_start_installs_and_activates() {
        let f = fixture(AppConfig::default());
        assert_eq!(f.engine.start().await.unwrap(), Phase::Active);
        assert_eq!(f.store.len("static-v1").await, 5);
        assert_eq!(f.host.claims(), 1);

        assert_eq!(f.engine.start().await.unwrap(), Phase::Active);
        assert_eq!(f.host.claims(), 1);
    }

    #[tokio::test]
    async fn test_start_finishes_interrupted_upgrade() {
        let f = fixture(AppConfig::default());
        f.engine.start().await.unwrap();

        let upgrade = AppConfig { static_version: 2, dynamic_version: 2, ..Default::default() };
        let interrupted =
            Engine::new(upgrade.clone(), Arc::new(f.store.clone()), f.network.clone(), f.host.clone()).unwrap();
        interrupted.partitions().resume().await.unwrap();
        interrupted.dispatch(Event::Install).await.unwrap();
        assert_eq!(f.store.partitions().await.unwrap().len(), 4);

        let restarted = Engine::new(upgrade, Arc::new(f.store.clone()), f.network.clone(), f.host.clone()).unwrap();
        assert_eq!(restarted.start().await.unwrap(), Phase::Active);
        assert_eq!(f.store.partitions().await.unwrap(), vec!["static-v2", "dynamic-v2"]);
    }

    #[tokio::test]
    async fn test_start_survives_install_failure() {
        let f = fixture(AppConfig::default());
        f.network.reject("/style.css");
        assert_eq!(f.engine.start().await.unwrap(), Phase::Redundant);
        assert!(f.store.partitions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_manifest_served_from_cache_when_offline() {
        let f = fixture(AppConfig::default());
        f.engine.start().await.unwrap();
        f.network.set_online(false);

        let outcome = fetch(&f.engine, get("/index.html")).await;
        assert_eq!(outcome.source, ResponseSource::CacheFirst);
        assert_eq!(outcome.response.text(), "asset");
    }

    #[tokio::test]
    async fn test_offline_navigation_gets_offline_document() {
        let f = fixture(AppConfig::default());
        f.engine.start().await.unwrap();
        f.network.set_online(false);

        let outcome = fetch(&f.engine, Request::navigate(url("/notes/today"))).await;
        assert_eq!(outcome.source, ResponseSource::OfflineDocument);
        assert_eq!(outcome.response.text(), "<html>offline shell</html>");
    }

    #[tokio::test]
    async fn test_offline_navigation_without_document_is_503() {
        let f = fixture(AppConfig::default());
        f.network.set_online(false);

        let outcome = fetch(&f.engine, Request::navigate(url("/notes/today"))).await;
        assert_eq!(outcome.source, ResponseSource::Synthesized);
        assert_eq!(outcome.response.status, 503);
        assert_eq!(outcome.response.text(), "Offline");
    }

    #[tokio::test]
    async fn test_offline_subresource_is_network_error() {
        let f = fixture(AppConfig::default());
        f.engine.start().await.unwrap();
        f.network.set_online(false);

        let outcome = fetch(&f.engine, get("/api/notes")).await;
        assert_eq!(outcome.response.status, 503);
        assert_eq!(outcome.response.text(), "Network error");
        assert_eq!(outcome.response.header("content-type"), Some("text/plain"));
    }

    #[tokio::test]
    async fn test_bypass_goes_straight_to_network() {
        let f = fixture(AppConfig::default());
        f.network.serve("/api/notes", "created");

        let outcome = fetch(&f.engine, get("/api/notes").with_method("POST")).await;
        assert_eq!(outcome.source, ResponseSource::Passthrough);
        assert_eq!(f.network.total_calls(), 1);
        assert!(f.store.partitions().await.unwrap().is_empty());

        f.network.set_online(false);
        let result = f.engine.dispatch(Event::Fetch(get("/api/notes").with_method("POST"))).await;
        assert!(matches!(result, Err(Error::NetworkFailure(_))));
    }

    #[tokio::test]
    async fn test_dynamic_writes_go_to_current_partition() {
        let f = fixture(AppConfig { dynamic_version: 3, ..Default::default() });
        f.engine.start().await.unwrap();
        f.network.serve("/api/notes", "[]");

        let outcome = fetch(&f.engine, get("/api/notes")).await;
        assert_eq!(outcome.source, ResponseSource::NetworkFirst);
        assert_eq!(f.store.len("dynamic-v3").await, 1);
    }

    #[tokio::test]
    async fn test_message_event_replies() {
        let f = fixture(AppConfig { static_version: 2, ..Default::default() });
        f.engine.start().await.unwrap();

        let (tx, rx) = oneshot::channel();
        let outcome = f
            .engine
            .dispatch(Event::Message { message: json!({"type": "GET_VERSION"}), reply: Some(tx) })
            .await
            .unwrap();
        assert!(matches!(outcome, Outcome::Handled));
        assert_eq!(rx.await.unwrap(), ControlReply::Version { version: "static-v2".into() });
    }

    #[tokio::test]
    async fn test_maintenance_events() {
        let f = fixture(AppConfig::default());
        let mut client = f.host.subscribe();

        f.engine.dispatch(Event::NetworkStatusChange(NetworkStatus::Online)).await.unwrap();
        assert_eq!(f.host.sync_tags(), vec!["background-sync"]);

        let outcome = f.engine.dispatch(Event::BackgroundSync { tag: "background-sync".into() }).await.unwrap();
        assert!(matches!(outcome, Outcome::Notified(1)));
        assert_eq!(client.recv().await.unwrap(), ClientMessage::SyncNotes);

        let outcome = f.engine.dispatch(Event::Push(ClientMessage::BackupNotes)).await.unwrap();
        assert!(matches!(outcome, Outcome::Notified(1)));

        let outcome = f.engine.dispatch(Event::PeriodicSweep).await.unwrap();
        assert!(matches!(outcome, Outcome::Swept(0)));
    }

    #[test]
    fn test_rejects_bad_origin() {
        let config = AppConfig { origin: "not a url".into(), ..Default::default() };
        let result = Engine::new(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(FakeNetwork::new()),
            Arc::new(ChannelHost::default()),
        );
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }
}
