//! sync_register and sync_run tool implementations.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use vidrec_core::sync::{SyncReport, run_tag};

use crate::error::json_result;
use crate::state::WorkerState;

fn default_tag() -> String {
    vidrec_core::COUNTER_SYNC_TAG.into()
}

/// Parameters shared by the sync tools.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SyncParams {
    /// Sync tag (default: "counter-sync").
    #[serde(default = "default_tag")]
    pub tag: String,
}

/// Output from the sync_register tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SyncRegisterOutput {
    pub tag: String,
    pub registered: bool,
    /// Most recent completed background run.
    #[serde(default)]
    pub last_run: Option<SyncReport>,
}

/// Output from the sync_run tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SyncRunOutput {
    pub tag: String,
    /// `None` when no handler exists for the tag.
    pub report: Option<SyncReport>,
}

/// Implementation of the sync_register tool.
///
/// Unsupported scheduling is reported as `registered: false`, never as an error.
pub async fn register_impl(state: &WorkerState, params: SyncParams) -> Result<CallToolResult, McpError> {
    let registered = state.sync.schedule_best_effort(&params.tag);
    json_result(&SyncRegisterOutput { tag: params.tag, registered, last_run: state.sync.last_report() })
}

/// Implementation of the sync_run tool: fire the tag once, now.
pub async fn run_impl(state: &WorkerState, params: SyncParams) -> Result<CallToolResult, McpError> {
    let report = run_tag(&params.tag, &state.counter).await?;
    json_result(&SyncRunOutput { tag: params.tag, report })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::*;
    use crate::tools::counter::increment_impl;

    #[tokio::test]
    async fn test_register_unsupported() {
        let state = state().await;
        let output: SyncRegisterOutput = output(&register_impl(&state, SyncParams { tag: default_tag() }).await.unwrap());
        assert_eq!(output.tag, "counter-sync");
        assert!(!output.registered);
        assert!(output.last_run.is_none());
    }

    #[tokio::test]
    async fn test_run_reports_without_mutating() {
        let state = state().await;
        increment_impl(&state).await.unwrap();
        increment_impl(&state).await.unwrap();

        for _ in 0..3 {
            let output: SyncRunOutput = output(&run_impl(&state, SyncParams { tag: default_tag() }).await.unwrap());
            assert_eq!(output.report.unwrap().count, Some(2));
        }
        assert_eq!(state.counter.read().await.unwrap().unwrap().count, 2);
    }

    #[tokio::test]
    async fn test_run_unknown_tag() {
        let state = state().await;
        let output: SyncRunOutput =
            output(&run_impl(&state, SyncParams { tag: "gallery-sync".into() }).await.unwrap());
        assert!(output.report.is_none());
    }

    #[test]
    fn test_params_default_tag() {
        let params: SyncParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params.tag, "counter-sync");
    }
}
