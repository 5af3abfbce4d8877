//! Core types and shared functionality for vidrec.
//!
//! This crate provides:
//! - Durable counter store with SQLite backend and a volatile fallback
//! - Versioned offline asset cache
//! - Background sync scheduling and counter reconciliation
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod counter;
pub mod error;
pub mod store;
pub mod sync;

pub use cache::{AssetFetcher, AssetRequest, CacheOutcome, OfflineCache};
pub use config::{AppConfig, MissPolicy};
pub use counter::{CounterRecord, CounterStore, VIDEO_COUNTER, VideoCounter};
pub use error::Error;
pub use store::StoreDb;
pub use sync::{COUNTER_SYNC_TAG, SyncManager};
