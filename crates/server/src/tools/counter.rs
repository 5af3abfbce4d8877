//! counter_read and counter_increment tool implementations.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use vidrec_core::COUNTER_SYNC_TAG;

use crate::error::json_result;
use crate::state::WorkerState;

/// Output from the counter tools.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CounterOutput {
    /// Number of recordings saved so far.
    pub count: u64,
    /// Whether the value survives a restart.
    pub durable: bool,
    /// Whether a `counter-sync` run was registered (increment only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_registered: Option<bool>,
}

/// Implementation of the counter_read tool.
///
/// Initialises the record to zero on first use.
pub async fn read_impl(state: &WorkerState) -> Result<CallToolResult, McpError> {
    let record = state.counter.read_or_init().await?;
    json_result(&CounterOutput { count: record.count, durable: state.counter.is_durable(), sync_registered: None })
}

/// Implementation of the counter_increment tool.
///
/// Called after each saved recording. The increment is reported even when
/// background sync cannot be registered.
pub async fn increment_impl(state: &WorkerState) -> Result<CallToolResult, McpError> {
    let count = state.counter.increment().await?;
    let sync_registered = state.sync.schedule_best_effort(COUNTER_SYNC_TAG);

    json_result(&CounterOutput { count, durable: state.counter.is_durable(), sync_registered: Some(sync_registered) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::*;
    use vidrec_core::{SyncManager, StoreDb};

    #[tokio::test]
    async fn test_read_fresh_store() {
        let state = state().await;
        let output: CounterOutput = output(&read_impl(&state).await.unwrap());
        assert_eq!(output.count, 0);
        assert!(output.durable);
        assert!(output.sync_registered.is_none());
    }

    #[tokio::test]
    async fn test_increment_then_read() {
        let state = state().await;
        for expected in 1..=3 {
            let output: CounterOutput = output(&increment_impl(&state).await.unwrap());
            assert_eq!(output.count, expected);
            assert_eq!(output.sync_registered, Some(false));
        }

        let output: CounterOutput = output(&read_impl(&state).await.unwrap());
        assert_eq!(output.count, 3);
    }

    #[tokio::test]
    async fn test_increment_registers_sync_when_supported() {
        let db = StoreDb::open_in_memory().await.unwrap();
        let mut state =
            crate::state::WorkerState::new(small_config(), Some(db), manifest_fetcher(), SyncManager::unsupported())
                .unwrap();
        let (sync, _worker) = SyncManager::spawn(state.counter.clone(), Default::default());
        state.sync = sync;

        let output: CounterOutput = output(&increment_impl(&state).await.unwrap());
        assert_eq!(output.count, 1);
        assert_eq!(output.sync_registered, Some(true));
    }

    #[tokio::test]
    async fn test_volatile_counter_still_counts() {
        let state = crate::state::WorkerState::new(small_config(), None, manifest_fetcher(), SyncManager::unsupported())
            .unwrap();
        let output: CounterOutput = output(&increment_impl(&state).await.unwrap());
        assert_eq!(output.count, 1);
        assert!(!output.durable);
    }
}
