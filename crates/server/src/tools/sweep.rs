//! cache_sweep tool implementation.
//!
//! Runs one eviction pass now instead of waiting for the timer.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use stash_client::Engine;

use crate::error::json_result;

/// Parameters for the cache_sweep tool (none).
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheSweepParams {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSweepOutput {
    /// Entries evicted from the dynamic partition.
    pub removed: usize,
}

/// Implementation of the cache_sweep tool.
pub async fn sweep_impl(engine: &Engine, _params: CacheSweepParams) -> Result<CallToolResult, McpError> {
    let removed = engine.maintenance().sweep().await?;
    json_result(&CacheSweepOutput { removed })
}
