//! Shared state handed to every tool call.

use std::sync::Arc;

use url::Url;
use vidrec_client::parse_origin;
use vidrec_core::cache::BypassRules;
use vidrec_core::{AppConfig, AssetFetcher, Error, OfflineCache, StoreDb, SyncManager, VideoCounter};

/// Everything the worker owns for its lifetime.
#[derive(Clone)]
pub struct WorkerState {
    pub config: Arc<AppConfig>,
    pub origin: Url,
    pub counter: VideoCounter,
    /// `None` when durable storage is unavailable; offline support is off for the session.
    pub cache: Option<OfflineCache>,
    pub fetcher: Arc<dyn AssetFetcher>,
    pub sync: SyncManager,
}

impl WorkerState {
    pub fn new(
        config: AppConfig, db: Option<StoreDb>, fetcher: Arc<dyn AssetFetcher>, sync: SyncManager,
    ) -> Result<Self, Error> {
        let origin = parse_origin(&config.origin).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let bypass = BypassRules::from_patterns(&config.bypass_patterns)?;
        let cache = db.clone().map(|db| OfflineCache::new(db, bypass));
        let counter = VideoCounter::from_store(db);

        Ok(Self { config: Arc::new(config), origin, counter, cache, fetcher, sync })
    }

    /// The offline cache, or `StorageUnavailable` when the session has none.
    pub fn cache(&self) -> Result<&OfflineCache, Error> {
        self.cache
            .as_ref()
            .ok_or_else(|| Error::StorageUnavailable("offline cache requires durable storage".into()))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use vidrec_core::cache::FetchedAsset;

    /// Serves fixed bodies by URL; anything else is unreachable.
    #[derive(Default)]
    pub struct MapFetcher {
        assets: Mutex<HashMap<String, &'static str>>,
    }

    impl MapFetcher {
        pub fn set(&self, url: &str, body: &'static str) {
            self.assets.lock().unwrap().insert(url.to_string(), body);
        }
    }

    #[async_trait]
    impl AssetFetcher for MapFetcher {
        async fn fetch_asset(&self, url: &Url) -> Result<FetchedAsset, Error> {
            let body = self.assets.lock().unwrap().get(url.as_str()).copied();
            match body {
                Some(body) => Ok(FetchedAsset {
                    status: 200,
                    content_type: Some("text/plain".into()),
                    headers: vec![("content-type".into(), "text/plain".into())],
                    body: Bytes::from_static(body.as_bytes()),
                }),
                None => Err(Error::HttpError(format!("network error: {url} unreachable"))),
            }
        }
    }

    pub fn small_config() -> AppConfig {
        AppConfig {
            manifest: vec!["/".into(), "/assets/scripts/main.js".into()],
            ..Default::default()
        }
    }

    /// Fetcher pre-loaded with every entry of `small_config().manifest`.
    pub fn manifest_fetcher() -> Arc<MapFetcher> {
        let fetcher = MapFetcher::default();
        fetcher.set("http://localhost:3000/", "<html>recorder</html>");
        fetcher.set("http://localhost:3000/assets/scripts/main.js", "let mediaRecorder;");
        Arc::new(fetcher)
    }

    pub async fn state_with(config: AppConfig, fetcher: Arc<MapFetcher>) -> WorkerState {
        let db = StoreDb::open_in_memory().await.unwrap();
        WorkerState::new(config, Some(db), fetcher, SyncManager::unsupported()).unwrap()
    }

    pub async fn state() -> WorkerState {
        state_with(small_config(), manifest_fetcher()).await
    }

    /// Decode the JSON text content of a tool result.
    pub fn output<T: serde::de::DeserializeOwned>(result: &rmcp::model::CallToolResult) -> T {
        let content_val = serde_json::to_value(&result.content[0]).unwrap();
        let text = content_val
            .get("text")
            .and_then(|v| v.as_str())
            .expect("Expected text field in content");
        serde_json::from_str(text).unwrap()
    }
}
