//! The counter reconciliation handler.

use chrono::Utc;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::Error;
use crate::counter::VideoCounter;

/// Tag identifying the counter reconciliation task.
pub const COUNTER_SYNC_TAG: &str = "counter-sync";

/// What one reconciliation pass observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SyncReport {
    pub tag: String,
    /// Counter value read from the store; `None` when nothing has been recorded yet.
    pub count: Option<u64>,
    pub durable: bool,
    pub synced_at: String,
}

/// Re-read the counter through the store and log it.
///
/// Read-only: running it any number of times leaves the counter unchanged.
pub async fn reconcile_counter(counter: &VideoCounter) -> Result<SyncReport, Error> {
    tracing::info!(tag = COUNTER_SYNC_TAG, "syncing video counter locally");

    let count = counter.read().await?.map(|record| record.count);
    match count {
        Some(count) => tracing::info!(tag = COUNTER_SYNC_TAG, count, "synced counter"),
        None => tracing::debug!(tag = COUNTER_SYNC_TAG, "no counter recorded yet"),
    }

    Ok(SyncReport {
        tag: COUNTER_SYNC_TAG.to_string(),
        count,
        durable: counter.is_durable(),
        synced_at: Utc::now().to_rfc3339(),
    })
}

/// Dispatch a sync event by tag. Unknown tags are ignored.
pub async fn run_tag(tag: &str, counter: &VideoCounter) -> Result<Option<SyncReport>, Error> {
    match tag {
        COUNTER_SYNC_TAG => reconcile_counter(counter).await.map(Some),
        other => {
            tracing::debug!(tag = other, "no handler for sync tag");
            Ok(None)
        }
    }
}
