//! Versioned offline asset cache.
//!
//! Generations are stored in the same SQLite store as the counter. It
//! supports:
//!
//! - All-or-nothing installs from a fixed manifest
//! - "Keep current, delete all else" eviction on activation
//! - Cache-first lookup by exact URL + method, with bypass patterns

pub mod fetcher;
pub mod generations;
pub mod hash;
pub mod lookup;
pub mod offline;

pub use fetcher::{AssetFetcher, FetchedAsset};
pub use generations::{ActivationReport, CacheGeneration, GenerationState, InstallReport};
pub use lookup::{AssetRequest, BypassRules, CacheOutcome, CachedResponse, request_key};
pub use offline::OfflineCache;
