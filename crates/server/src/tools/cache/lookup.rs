//! cache_match tool implementation.
//!
//! Answers a page-shell request the way the offline worker would: bypass
//! rules first, then the active generation, then the configured miss policy.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use vidrec_client::resolve;
use vidrec_core::cache::{CachedResponse, FetchedAsset};
use vidrec_core::{AssetRequest, CacheOutcome, Error, MissPolicy};

use crate::error::{ToolError, json_result};
use crate::state::WorkerState;

fn default_method() -> String {
    "GET".into()
}

/// Parameters for the cache_match tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheMatchParams {
    /// Request URL, absolute or relative to the origin.
    pub url: String,

    /// Request method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,
}

/// Where a cache_match response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
    /// Served from the active generation.
    Cache,
    /// Fetched on a miss; not stored.
    Network,
    /// Not answered here; the caller should send the request itself.
    Bypass,
}

/// Output from the cache_match tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheMatchOutput {
    pub source: MatchSource,
    pub url: String,
    pub method: String,
    /// Generation the response was served from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    /// SHA-256 of the stored body (cache hits only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    /// Base64-encoded response body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_base64: Option<String>,
}

impl CacheMatchOutput {
    fn bypass(request: &AssetRequest) -> Self {
        Self {
            source: MatchSource::Bypass,
            url: request.url.to_string(),
            method: request.method.clone(),
            generation: None,
            status: None,
            content_type: None,
            headers: Vec::new(),
            digest: None,
            body_base64: None,
        }
    }

    fn from_cache(response: CachedResponse) -> Self {
        Self {
            source: MatchSource::Cache,
            url: response.url,
            method: response.method,
            generation: Some(response.generation),
            status: Some(response.status),
            content_type: response.content_type,
            headers: response.headers,
            digest: Some(response.digest),
            body_base64: Some(STANDARD.encode(&response.body)),
        }
    }

    fn from_network(request: &AssetRequest, asset: FetchedAsset) -> Self {
        Self {
            source: MatchSource::Network,
            url: request.url.to_string(),
            method: request.method.clone(),
            generation: None,
            status: Some(asset.status),
            content_type: asset.content_type,
            headers: asset.headers,
            digest: None,
            body_base64: Some(STANDARD.encode(&asset.body)),
        }
    }
}

/// Implementation of the cache_match tool.
///
/// Without durable storage there is no cache and every request is a miss.
pub async fn match_impl(state: &WorkerState, params: CacheMatchParams) -> Result<CallToolResult, McpError> {
    let url = resolve(&state.origin, &params.url).map_err(|e| ToolError::InvalidInput(e.to_string()))?;
    let request = AssetRequest::new(&params.method, url);

    let outcome = match &state.cache {
        Some(cache) => cache.handle(&request).await?,
        None => CacheOutcome::Miss,
    };

    let output = match outcome {
        CacheOutcome::Hit(response) => CacheMatchOutput::from_cache(response),
        CacheOutcome::Bypass => CacheMatchOutput::bypass(&request),
        CacheOutcome::Miss => match state.config.miss_policy {
            MissPolicy::FailClosed => {
                return Err(Error::CacheMiss(format!("{} {}", request.method, request.url)).into());
            }
            // The fetcher only issues GETs; other methods go back to the caller untouched.
            MissPolicy::Network if request.method != "GET" => {
                tracing::debug!(url = %request.url, method = %request.method, "cache miss, passing request through");
                CacheMatchOutput::bypass(&request)
            }
            MissPolicy::Network => {
                tracing::debug!(url = %request.url, "cache miss, falling through to network");
                let asset = state.fetcher.fetch_asset(&request.url).await?;
                CacheMatchOutput::from_network(&request, asset)
            }
        },
    };

    json_result(&output)
}
