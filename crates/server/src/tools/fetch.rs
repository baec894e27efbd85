//! cache_fetch tool implementation.
//!
//! Routes one request through the engine exactly as an intercepted
//! application request would be.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use stash_client::{Engine, ResponseSource, fetch::canonicalize};
use stash_core::{Destination, Request, ResponseType};

use crate::error::{ToolError, json_result};

/// Input parameters for cache_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheFetchParams {
    /// URL to request; relative paths resolve against the configured origin.
    pub url: String,

    /// HTTP method (default: GET). Non-GET requests bypass the cache.
    #[serde(default = "default_method")]
    pub method: String,

    /// What the response is for, e.g. "image" or "document".
    #[serde(default)]
    pub destination: Option<Destination>,

    /// Treat the request as a top-level page navigation.
    #[serde(default)]
    pub navigate: bool,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for cache_fetch tool.
#[derive(Debug, Clone, Serialize)]
pub struct CacheFetchOutput {
    /// Canonical request URL.
    pub url: String,
    pub status: u16,
    pub response_type: ResponseType,
    pub headers: Vec<(String, String)>,
    /// Body decoded as UTF-8 (lossy).
    pub body: String,
    /// Path that produced the response.
    pub source: ResponseSource,
}

/// Implementation of the cache_fetch tool.
pub async fn fetch_impl(engine: &Engine, params: CacheFetchParams) -> Result<CallToolResult, McpError> {
    let origin = engine
        .config()
        .origin_url()
        .map_err(|e| ToolError::InvalidInput(e.to_string()))?;
    let url = canonicalize(&params.url, &origin).map_err(|e| ToolError::InvalidInput(e.to_string()))?;

    let mut request = if params.navigate { Request::navigate(url) } else { Request::get(url) };
    request = request.with_method(params.method);
    if let Some(destination) = params.destination {
        request = request.with_destination(destination);
    }

    let outcome = engine.handle_fetch(&request).await?;
    let response = outcome.response;

    json_result(&CacheFetchOutput {
        url: request.url.to_string(),
        status: response.status,
        response_type: response.response_type,
        body: response.text(),
        headers: response.headers,
        source: outcome.source,
    })
}
