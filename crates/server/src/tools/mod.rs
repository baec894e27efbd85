//! MCP tool implementations.
//!
//! This module contains all tools exposed by the stash server.

pub mod control;
pub mod fetch;
pub mod network;
pub mod sweep;

pub use control::{CacheControlParams, control_impl};
pub use fetch::{CacheFetchParams, fetch_impl};
pub use network::{NetworkStatusParams, network_status_impl};
pub use sweep::{CacheSweepParams, sweep_impl};

#[cfg(test)]
pub(crate) mod test_support {
    use rmcp::model::CallToolResult;
    use stash_client::{ChannelHost, Engine, Network};
    use stash_core::{AppConfig, Error, MemoryStore, Request, Response};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Answers every request with its own path, or fails while offline.
    pub(crate) struct EchoNetwork {
        online: AtomicBool,
    }

    impl EchoNetwork {
        pub(crate) fn new() -> Self {
            Self { online: AtomicBool::new(true) }
        }

        pub(crate) fn set_online(&self, online: bool) {
            self.online.store(online, Ordering::SeqCst);
        }
    }

    #[async_trait::async_trait]
    impl Network for EchoNetwork {
        async fn fetch(&self, request: &Request) -> Result<Response, Error> {
            if !self.online.load(Ordering::SeqCst) {
                return Err(Error::NetworkFailure("offline".into()));
            }
            Ok(Response::new(200, request.url.path().to_string()))
        }
    }

    pub(crate) fn engine(network: Arc<EchoNetwork>) -> Engine {
        Engine::new(AppConfig::default(), Arc::new(MemoryStore::new()), network, Arc::new(ChannelHost::default()))
            .unwrap()
    }

    pub(crate) fn output_json(result: &CallToolResult) -> serde_json::Value {
        let content_val = serde_json::to_value(&result.content[0]).unwrap();
        let text = content_val
            .get("text")
            .and_then(|v| v.as_str())
            .expect("Expected text field in content");
        serde_json::from_str(text).unwrap()
    }
}
