//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (VIDREC_*)
//! 2. TOML config file (if VIDREC_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// What the worker does when a request is not in the active generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MissPolicy {
    /// Fetch the request from the network and return that response uncached.
    #[default]
    Network,
    /// Produce no response at all.
    FailClosed,
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (VIDREC_*)
/// 2. TOML config file (if VIDREC_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite store holding counters and cache generations.
    ///
    /// Set via VIDREC_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Whether durable storage should be used at all.
    ///
    /// When false the counter lives in memory for the session.
    #[serde(default = "default_true")]
    pub durable_storage: bool,

    /// Origin that relative manifest entries and requests resolve against.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Name of the cache generation this deployment installs.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Asset URLs fetched into every new generation.
    #[serde(default = "default_manifest")]
    pub manifest: Vec<String>,

    /// Extra generation names kept alive on activation.
    #[serde(default)]
    pub retain_generations: Vec<String>,

    /// Regexes matched against request paths that are never intercepted.
    #[serde(default = "default_bypass_patterns")]
    pub bypass_patterns: Vec<String>,

    /// Behaviour on a cache miss.
    #[serde(default)]
    pub miss_policy: MissPolicy,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per asset.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Whether background sync scheduling is supported.
    #[serde(default = "default_true")]
    pub background_sync: bool,

    /// Delay before a scheduled sync tag fires, in milliseconds.
    #[serde(default = "default_sync_delay_ms")]
    pub sync_delay_ms: u64,

    /// Attempts per scheduled tag before the runtime gives up.
    #[serde(default = "default_sync_max_attempts")]
    pub sync_max_attempts: u32,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./video-recorder.sqlite")
}

fn default_origin() -> String {
    "http://localhost:3000/".into()
}

fn default_cache_version() -> String {
    "video-recorder-cache-v1".into()
}

fn default_manifest() -> Vec<String> {
    [
        "/",
        "/index.html",
        "/assets/styles/main.css",
        "/assets/scripts/main.js",
        "/assets/icons/icon-512x512.png",
        "/service-worker.js",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_bypass_patterns() -> Vec<String> {
    vec![r"browser-sync-client\.js".into()]
}

fn default_user_agent() -> String {
    "vidrec/0.1".into()
}

fn default_max_bytes() -> usize {
    10_485_760 // 10MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_sync_delay_ms() -> u64 {
    1_000
}

fn default_sync_max_attempts() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            durable_storage: true,
            origin: default_origin(),
            cache_version: default_cache_version(),
            manifest: default_manifest(),
            retain_generations: Vec::new(),
            bypass_patterns: default_bypass_patterns(),
            miss_policy: MissPolicy::default(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            background_sync: true,
            sync_delay_ms: default_sync_delay_ms(),
            sync_max_attempts: default_sync_max_attempts(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Sync delay as Duration.
    pub fn sync_delay(&self) -> Duration {
        Duration::from_millis(self.sync_delay_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `VIDREC_`
    /// 2. TOML file from `VIDREC_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file or environment cannot be parsed,
    /// or if validation fails after loading.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("VIDREC_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("VIDREC_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Generation names kept alive when the configured version activates.
    pub fn retain_set(&self) -> Vec<String> {
        let mut retain = self.retain_generations.clone();
        if !retain.contains(&self.cache_version) {
            retain.push(self.cache_version.clone());
        }
        retain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.db_path, PathBuf::from("./video-recorder.sqlite"));
        assert_eq!(config.cache_version, "video-recorder-cache-v1");
        assert_eq!(config.manifest.len(), 6);
        assert_eq!(config.manifest[0], "/");
        assert_eq!(config.miss_policy, MissPolicy::Network);
        assert!(config.durable_storage);
        assert!(config.background_sync);
        assert_eq!(config.sync_max_attempts, 3);
    }

    #[test]
    fn test_durations() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
        assert_eq!(config.sync_delay(), Duration::from_millis(1_000));
    }

    #[test]
    fn test_retain_set_includes_current_version_once() {
        let config = AppConfig {
            retain_generations: vec!["video-recorder-cache-v1".into(), "pinned".into()],
            ..Default::default()
        };
        let retain = config.retain_set();
        assert_eq!(retain, vec!["video-recorder-cache-v1".to_string(), "pinned".to_string()]);
    }

    #[test]
    fn test_load_from_toml_and_env() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "vidrec.toml",
                r#"
                cache_version = "video-recorder-cache-v2"
                miss_policy = "fail_closed"
                "#,
            )?;
            jail.set_env("VIDREC_CONFIG_FILE", "vidrec.toml");
            jail.set_env("VIDREC_SYNC_MAX_ATTEMPTS", "5");

            let config = AppConfig::load().expect("config should load");
            assert_eq!(config.cache_version, "video-recorder-cache-v2");
            assert_eq!(config.miss_policy, MissPolicy::FailClosed);
            assert_eq!(config.sync_max_attempts, 5);
            Ok(())
        });
    }
}
