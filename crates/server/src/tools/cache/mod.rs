//! Cache-related MCP tools.
//!
//! Install, activate, lookup and housekeeping for offline cache generations.

pub mod activate;
pub mod install;
pub mod keys;
pub mod lookup;

pub use activate::{CacheActivateParams, activate_impl};
pub use install::{CacheInstallParams, install_impl};
pub use keys::{CacheDeleteParams, delete_impl, keys_impl};
pub use lookup::{CacheMatchParams, match_impl};
