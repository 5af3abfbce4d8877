//! cache_install tool implementation.
//!
//! Fetches a manifest into a new, inactive generation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use vidrec_client::resolve_manifest;
use vidrec_core::cache::InstallReport;

use crate::error::{ToolError, json_result};
use crate::state::WorkerState;

/// Parameters for the cache_install tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheInstallParams {
    /// Generation name (default: the configured cache version).
    #[serde(default)]
    pub version: Option<String>,

    /// Asset URLs, absolute or relative to the origin (default: the configured manifest).
    #[serde(default)]
    pub manifest: Option<Vec<String>>,
}

/// Output from the cache_install tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheInstallOutput {
    pub report: InstallReport,
}

/// Implementation of the cache_install tool.
///
/// Installing does not activate; call cache_activate afterwards.
pub async fn install_impl(state: &WorkerState, params: CacheInstallParams) -> Result<CallToolResult, McpError> {
    let cache = state.cache()?;
    let version = params.version.unwrap_or_else(|| state.config.cache_version.clone());
    let entries = params.manifest.unwrap_or_else(|| state.config.manifest.clone());

    let manifest =
        resolve_manifest(&state.origin, &entries).map_err(|e| ToolError::InvalidInput(e.to_string()))?;

    let report = cache.install(&version, &manifest, state.fetcher.as_ref()).await?;
    json_result(&CacheInstallOutput { report })
}
