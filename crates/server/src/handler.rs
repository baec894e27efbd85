//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the engine.
use std::sync::Arc;

use crate::tools::{
    CacheControlParams, CacheFetchParams, CacheSweepParams, NetworkStatusParams, control_impl, fetch_impl,
    network_status_impl, sweep_impl,
};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use stash_client::Engine;

/// The main MCP server handler for stash.
#[derive(Clone)]
pub struct StashServer {
    engine: Arc<Engine>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl StashServer {
    /// Create a new server handler around a started engine.
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine, tool_router: Self::tool_router() }
    }

    #[tool(
        description = "Request a URL through the caching engine. Applies cache-first, network-first or stale-while-revalidate depending on the URL, and degrades to an offline page or 503 when both cache and network fail."
    )]
    async fn cache_fetch(&self, params: Parameters<CacheFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.engine, params.0).await
    }

    /// Send a control message (SKIP_WAITING, GET_VERSION, CLEAR_CACHE, PREFETCH).
    #[tool(
        description = "Send a control message {type, data?}: SKIP_WAITING, GET_VERSION, CLEAR_CACHE or PREFETCH {urls}. Returns the reply, or null for messages that do not reply."
    )]
    async fn cache_control(&self, params: Parameters<CacheControlParams>) -> Result<CallToolResult, McpError> {
        control_impl(&self.engine, params.0).await
    }

    #[tool(description = "Report a connectivity change. Reconnecting registers the background resync task.")]
    async fn network_status(&self, params: Parameters<NetworkStatusParams>) -> Result<CallToolResult, McpError> {
        network_status_impl(&self.engine, params.0).await
    }

    #[tool(description = "Run an eviction sweep now. Returns the number of dynamic entries removed.")]
    async fn cache_sweep(&self, params: Parameters<CacheSweepParams>) -> Result<CallToolResult, McpError> {
        sweep_impl(&self.engine, params.0).await
    }
}

impl ServerHandler for StashServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "stash".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{EchoNetwork, engine};

    #[test]
    fn test_lists_all_tools() {
        let server = StashServer::new(Arc::new(engine(Arc::new(EchoNetwork::new()))));
        let mut names: Vec<String> = server.tool_router.list_all().into_iter().map(|t| t.name.to_string()).collect();
        names.sort();
        assert_eq!(names, vec!["cache_control", "cache_fetch", "cache_sweep", "network_status"]);
    }

    #[test]
    fn test_server_info() {
        let server = StashServer::new(Arc::new(engine(Arc::new(EchoNetwork::new()))));
        assert_eq!(server.get_info().server_info.name, "stash");
    }
}
