//! Source of manifest assets during install.

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use crate::Error;

/// A fetched asset ready to be stored in a generation.
#[derive(Debug, Clone)]
pub struct FetchedAsset {
    pub status: u16,
    pub content_type: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl FetchedAsset {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Fetches manifest URLs for a cache install.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    async fn fetch_asset(&self, url: &Url) -> Result<FetchedAsset, Error>;
}
