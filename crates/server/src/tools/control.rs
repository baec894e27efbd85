//! cache_control tool implementation.
//!
//! Sends one control envelope with a reply port and reports whatever came back.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use stash_client::{ControlReply, Engine, Event};
use tokio::sync::oneshot;

use crate::error::json_result;

/// Parameters for the cache_control tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheControlParams {
    /// Control envelope, e.g. `{"type": "GET_VERSION"}` or
    /// `{"type": "PREFETCH", "data": {"urls": ["/notes/1"]}}`.
    pub message: serde_json::Value,
}

/// Output from the cache_control tool. `reply` is null for messages that do not answer.
#[derive(Debug, Clone, Serialize)]
pub struct CacheControlOutput {
    pub reply: Option<ControlReply>,
}

/// Implementation of the cache_control tool.
pub async fn control_impl(engine: &Engine, params: CacheControlParams) -> Result<CallToolResult, McpError> {
    let (tx, rx) = oneshot::channel();
    engine
        .dispatch(Event::Message { message: params.message, reply: Some(tx) })
        .await?;

    json_result(&CacheControlOutput { reply: rx.await.ok() })
}
