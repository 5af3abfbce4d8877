//! cache_activate tool implementation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use vidrec_core::cache::ActivationReport;

use crate::error::json_result;
use crate::state::WorkerState;

/// Parameters for the cache_activate tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheActivateParams {
    /// Generation to activate (default: the configured cache version).
    #[serde(default)]
    pub version: Option<String>,

    /// Generations kept alive besides `version` (default: the configured retain list).
    #[serde(default)]
    pub retain: Option<Vec<String>>,
}

/// Output from the cache_activate tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheActivateOutput {
    pub report: ActivationReport,
}

/// Implementation of the cache_activate tool.
///
/// Every generation outside `retain ∪ {version}` is deleted.
pub async fn activate_impl(state: &WorkerState, params: CacheActivateParams) -> Result<CallToolResult, McpError> {
    let cache = state.cache()?;
    let version = params.version.unwrap_or_else(|| state.config.cache_version.clone());
    let retain = params.retain.unwrap_or_else(|| state.config.retain_generations.clone());

    let report = cache.activate(&version, &retain).await?;
    json_result(&CacheActivateOutput { report })
}
