//! cache_keys and cache_delete tool implementations.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use vidrec_core::cache::CacheGeneration;

use crate::error::json_result;
use crate::state::WorkerState;

/// Output from the cache_keys tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheKeysOutput {
    /// The generation currently serving requests.
    pub active: Option<String>,
    pub generations: Vec<CacheGeneration>,
}

/// Parameters for the cache_delete tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheDeleteParams {
    /// Name of an inactive generation.
    pub name: String,
}

/// Output from the cache_delete tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheDeleteOutput {
    pub name: String,
    /// False when no generation had that name.
    pub deleted: bool,
}

/// Implementation of the cache_keys tool.
pub async fn keys_impl(state: &WorkerState) -> Result<CallToolResult, McpError> {
    let cache = state.cache()?;
    let generations = cache.keys().await?;
    let active = cache.active().await?;

    json_result(&CacheKeysOutput { active, generations })
}

/// Implementation of the cache_delete tool.
///
/// The active generation cannot be deleted; activate another one first.
pub async fn delete_impl(state: &WorkerState, params: CacheDeleteParams) -> Result<CallToolResult, McpError> {
    let deleted = state.cache()?.delete(&params.name).await?;
    json_result(&CacheDeleteOutput { name: params.name, deleted })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::install_configured;
    use crate::state::testing::*;
    use crate::tools::cache::install::{CacheInstallParams, install_impl};
    use vidrec_core::cache::GenerationState;

    #[tokio::test]
    async fn test_keys_empty() {
        let state = state().await;
        let output: CacheKeysOutput = output(&keys_impl(&state).await.unwrap());
        assert!(output.active.is_none());
        assert!(output.generations.is_empty());
    }

    #[tokio::test]
    async fn test_keys_and_delete() {
        let state = state().await;
        install_configured(&state).await.unwrap();
        let params = CacheInstallParams { version: Some("staging".into()), manifest: None };
        install_impl(&state, params).await.unwrap();

        let output: CacheKeysOutput = output(&keys_impl(&state).await.unwrap());
        assert_eq!(output.active.as_deref(), Some("video-recorder-cache-v1"));
        assert_eq!(output.generations.len(), 2);
        let staging = output.generations.iter().find(|g| g.name == "staging").unwrap();
        assert_eq!(staging.state, GenerationState::Installed);
        assert_eq!(staging.entry_count, 2);

        let deleted: CacheDeleteOutput =
            crate::state::testing::output(&delete_impl(&state, CacheDeleteParams { name: "staging".into() }).await.unwrap());
        assert!(deleted.deleted);

        let again: CacheDeleteOutput =
            crate::state::testing::output(&delete_impl(&state, CacheDeleteParams { name: "staging".into() }).await.unwrap());
        assert!(!again.deleted);
    }

    #[tokio::test]
    async fn test_delete_refuses_active() {
        let state = state().await;
        install_configured(&state).await.unwrap();

        let params = CacheDeleteParams { name: "video-recorder-cache-v1".into() };
        let err = delete_impl(&state, params).await.unwrap_err();
        assert_eq!(err.code.0, -32602);
        assert_eq!(state.cache().unwrap().active().await.unwrap().as_deref(), Some("video-recorder-cache-v1"));
    }
}
