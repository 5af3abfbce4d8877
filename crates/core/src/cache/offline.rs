//! The offline asset cache: install, activate and cache-first request handling.

use url::Url;

use super::fetcher::AssetFetcher;
use super::generations::{ActivationReport, CacheGeneration, GenerationState, InstallReport};
use super::lookup::{AssetRequest, BypassRules, CacheOutcome};
use crate::Error;
use crate::store::StoreDb;

/// Versioned asset cache over the durable store.
#[derive(Debug, Clone)]
pub struct OfflineCache {
    db: StoreDb,
    bypass: BypassRules,
}

impl OfflineCache {
    pub fn new(db: StoreDb, bypass: BypassRules) -> Self {
        Self { db, bypass }
    }

    /// Fetch every manifest URL and store them as generation `name`.
    ///
    /// Nothing is written unless every fetch succeeds, so a failed install
    /// leaves the currently active generation untouched.
    pub async fn install(
        &self, name: &str, manifest: &[Url], fetcher: &dyn AssetFetcher,
    ) -> Result<InstallReport, Error> {
        if name.trim().is_empty() {
            return Err(Error::InvalidInput("generation name cannot be empty".into()));
        }
        if manifest.is_empty() {
            return Err(Error::InvalidInput("manifest cannot be empty".into()));
        }

        tracing::info!(
            generation = name,
            state = GenerationState::Installing.as_str(),
            assets = manifest.len(),
            "installing cache generation"
        );

        let mut assets = Vec::with_capacity(manifest.len());
        for url in manifest {
            let fetched = match fetcher.fetch_asset(url).await {
                Ok(asset) if asset.is_success() => asset,
                Ok(asset) => return Err(self.install_failed(name, url, format!("status {}", asset.status))),
                Err(e) => return Err(self.install_failed(name, url, e.to_string())),
            };
            assets.push((url.clone(), fetched));
        }

        let report = self.db.store_generation(name, assets).await?;

        tracing::info!(
            generation = name,
            state = GenerationState::Installed.as_str(),
            entries = report.entries,
            bytes = report.bytes,
            "cache generation installed"
        );

        Ok(report)
    }

    fn install_failed(&self, name: &str, url: &Url, reason: String) -> Error {
        tracing::error!(generation = name, url = %url, reason = %reason, "failed to cache resources");
        Error::InstallFailed { generation: name.to_string(), url: url.to_string(), reason }
    }

    /// Activate `name`, deleting every generation outside `retain ∪ {name}`.
    pub async fn activate(&self, name: &str, retain: &[String]) -> Result<ActivationReport, Error> {
        let report = self.db.activate_generation(name, retain).await?;

        if let Some(previous) = &report.superseded {
            tracing::info!(
                generation = %previous,
                state = GenerationState::Superseded.as_str(),
                "cache generation superseded"
            );
        }
        for deleted in &report.deleted {
            tracing::info!(generation = %deleted, state = GenerationState::Deleted.as_str(), "cache generation deleted");
        }
        tracing::info!(generation = name, state = GenerationState::Active.as_str(), "cache generation active");

        Ok(report)
    }

    /// Answer an intercepted request, cache first.
    pub async fn handle(&self, request: &AssetRequest) -> Result<CacheOutcome, Error> {
        if self.bypass.matches(&request.url) {
            tracing::trace!(url = %request.url, "request bypasses the cache");
            return Ok(CacheOutcome::Bypass);
        }

        match self.db.match_active(request).await? {
            Some(response) => {
                tracing::debug!(url = %request.url, generation = %response.generation, "cache hit");
                Ok(CacheOutcome::Hit(response))
            }
            None => {
                tracing::debug!(url = %request.url, method = %request.method, "cache miss");
                Ok(CacheOutcome::Miss)
            }
        }
    }

    /// Every stored generation.
    pub async fn keys(&self) -> Result<Vec<CacheGeneration>, Error> {
        self.db.list_generations().await
    }

    /// Delete an inactive generation by name.
    pub async fn delete(&self, name: &str) -> Result<bool, Error> {
        let deleted = self.db.delete_generation(name).await?;
        if deleted {
            tracing::info!(generation = name, state = GenerationState::Deleted.as_str(), "cache generation deleted");
        }
        Ok(deleted)
    }

    pub async fn active(&self) -> Result<Option<String>, Error> {
        self.db.active_generation().await
    }
}
