//! network_status tool implementation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use stash_client::{Engine, Event, NetworkStatus};

use crate::error::json_result;

/// Parameters for the network_status tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NetworkStatusParams {
    /// Whether connectivity was restored (true) or lost (false).
    pub online: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkStatusOutput {
    pub status: NetworkStatus,
}

/// Implementation of the network_status tool.
pub async fn network_status_impl(engine: &Engine, params: NetworkStatusParams) -> Result<CallToolResult, McpError> {
    let status = if params.online { NetworkStatus::Online } else { NetworkStatus::Offline };
    engine.dispatch(Event::NetworkStatusChange(status)).await?;
    json_result(&NetworkStatusOutput { status })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{EchoNetwork, engine, output_json};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_network_status() {
        let engine = engine(Arc::new(EchoNetwork::new()));

        let output = output_json(&network_status_impl(&engine, NetworkStatusParams { online: true }).await.unwrap());
        assert_eq!(output["status"], "online");

        let output = output_json(&network_status_impl(&engine, NetworkStatusParams { online: false }).await.unwrap());
        assert_eq!(output["status"], "offline");
    }
}
