//! Durable counter store.
//!
//! The recording counter is owned here and reached only through
//! [`VideoCounter`]. Two backends implement [`CounterStore`]: the SQLite
//! [`StoreDb`] and a volatile in-memory map used when durable storage is
//! unavailable for the session.

pub mod durable;
pub mod volatile;

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::Error;
use crate::store::StoreDb;

pub use volatile::VolatileCounters;

/// Logical key of the singleton recording counter.
pub const VIDEO_COUNTER: &str = "videoCounter";

/// A persisted counter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CounterRecord {
    pub id: String,
    pub count: u64,
}

/// Keyed counter storage with read/upsert/increment semantics.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Read a record. Absence is `Ok(None)`, never an error.
    async fn read(&self, key: &str) -> Result<Option<CounterRecord>, Error>;

    /// Write the full record, replacing any prior value.
    async fn upsert(&self, key: &str, count: u64) -> Result<(), Error>;

    /// Create the record at zero unless it exists, returning the stored value.
    ///
    /// Never overwrites a concurrent increment.
    async fn init(&self, key: &str) -> Result<CounterRecord, Error>;

    /// Add one to the record (starting from 0 when absent) and return the new count.
    async fn increment(&self, key: &str) -> Result<u64, Error>;

    /// Whether values survive a process restart.
    fn is_durable(&self) -> bool;
}

/// Handle to the singleton video counter.
#[derive(Clone)]
pub struct VideoCounter {
    store: Arc<dyn CounterStore>,
}

impl std::fmt::Debug for VideoCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoCounter").field("durable", &self.store.is_durable()).finish()
    }
}

impl VideoCounter {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    /// Counter backed by the durable store when one is open, otherwise by memory.
    pub fn from_store(db: Option<StoreDb>) -> Self {
        match db {
            Some(db) => Self::new(Arc::new(db)),
            None => {
                tracing::warn!("durable storage unavailable; video counter is volatile for this session");
                Self::new(Arc::new(VolatileCounters::default()))
            }
        }
    }

    pub fn is_durable(&self) -> bool {
        self.store.is_durable()
    }

    pub async fn read(&self) -> Result<Option<CounterRecord>, Error> {
        self.store.read(VIDEO_COUNTER).await.inspect_err(|e| {
            tracing::warn!(error = %e, "failed to read video counter");
        })
    }

    /// Read the counter, writing a zero record first if none exists.
    pub async fn read_or_init(&self) -> Result<CounterRecord, Error> {
        self.store.init(VIDEO_COUNTER).await.inspect_err(|e| {
            tracing::warn!(error = %e, "failed to initialise video counter");
        })
    }

    /// Record one more saved video.
    ///
    /// A failure leaves the previous durable value in place and is reported,
    /// not raised as a panic.
    pub async fn increment(&self) -> Result<u64, Error> {
        let count = self.store.increment(VIDEO_COUNTER).await.inspect_err(|e| {
            tracing::error!(error = %e, "failed to persist video counter increment");
        })?;
        tracing::info!(count, durable = self.is_durable(), "video counter incremented");
        Ok(count)
    }
}
