//! Worker start-up: storage, sync worker and the install/activate cycle.

use std::sync::Arc;

use tokio::task::JoinHandle;
use vidrec_client::{FetchClient, FetchConfig, resolve_manifest};
use vidrec_core::cache::{ActivationReport, InstallReport};
use vidrec_core::sync::SyncOptions;
use vidrec_core::{AppConfig, Error, StoreDb, SyncManager};

use crate::state::WorkerState;

/// Open the durable store, or `None` when the session must run without one.
pub async fn open_store(config: &AppConfig) -> Option<StoreDb> {
    if !config.durable_storage {
        tracing::info!("durable storage disabled by configuration");
        return None;
    }

    match StoreDb::open(&config.db_path).await {
        Ok(db) => Some(db),
        Err(e) => {
            tracing::error!(path = %config.db_path.display(), error = %e, "failed to open durable store");
            None
        }
    }
}

/// Build the worker state and start the background sync worker.
///
/// The worker reconciles the same counter the tools mutate, so a volatile
/// session counter is shared rather than duplicated.
pub async fn start(config: AppConfig) -> Result<(WorkerState, Option<JoinHandle<()>>), Error> {
    let db = open_store(&config).await;
    let fetcher = Arc::new(FetchClient::new(FetchConfig::from(&config))?);

    let mut state = WorkerState::new(config, db, fetcher, SyncManager::unsupported())?;

    let worker = if state.config.background_sync {
        let (sync, worker) = SyncManager::spawn(state.counter.clone(), SyncOptions::from(state.config.as_ref()));
        state.sync = sync;
        Some(worker)
    } else {
        tracing::info!("background sync unsupported in this configuration");
        None
    };

    match state.counter.read_or_init().await {
        Ok(record) => tracing::info!(count = record.count, durable = state.counter.is_durable(), "video counter loaded"),
        Err(e) => tracing::warn!(error = %e, "video counter not loaded"),
    }

    Ok((state, worker))
}

/// Install the configured generation, then activate it.
pub async fn install_configured(state: &WorkerState) -> Result<(InstallReport, ActivationReport), Error> {
    let cache = state.cache()?;
    let manifest =
        resolve_manifest(&state.origin, &state.config.manifest).map_err(|e| Error::InvalidUrl(e.to_string()))?;

    let installed = cache.install(&state.config.cache_version, &manifest, state.fetcher.as_ref()).await?;
    let activated = cache.activate(&state.config.cache_version, &state.config.retain_set()).await?;
    Ok((installed, activated))
}

/// Run the install/activate cycle, logging instead of failing.
///
/// A failed install leaves whatever generation was active serving requests.
pub async fn bootstrap_cache(state: &WorkerState) {
    match install_configured(state).await {
        Ok((installed, activated)) => tracing::info!(
            generation = %activated.active,
            entries = installed.entries,
            deleted = activated.deleted.len(),
            "offline cache ready"
        ),
        Err(e) => {
            let previous = match state.cache() {
                Ok(cache) => cache.active().await.ok().flatten(),
                Err(_) => None,
            };
            tracing::warn!(
                error = %e,
                previous = previous.as_deref().unwrap_or("none"),
                "offline cache not updated; keeping previous generation"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::*;
    use vidrec_core::AssetRequest;
    use vidrec_core::CacheOutcome;

    #[tokio::test]
    async fn test_install_configured_activates_version() {
        let state = state().await;
        let (installed, activated) = install_configured(&state).await.unwrap();
        assert_eq!(installed.entries, 2);
        assert_eq!(activated.active, "video-recorder-cache-v1");

        let url = state.origin.join("/assets/scripts/main.js").unwrap();
        let outcome = state.cache().unwrap().handle(&AssetRequest::get(url)).await.unwrap();
        assert!(matches!(outcome, CacheOutcome::Hit(_)));
    }

    #[tokio::test]
    async fn test_bootstrap_failure_keeps_previous_generation() {
        let fetcher = manifest_fetcher();
        let state = state_with(small_config(), fetcher.clone()).await;
        install_configured(&state).await.unwrap();

        let mut next = (*state.config).clone();
        next.cache_version = "video-recorder-cache-v2".into();
        next.manifest.push("/assets/icons/icon-512x512.png".into());
        let upgraded = WorkerState { config: Arc::new(next), ..state };

        bootstrap_cache(&upgraded).await;

        let cache = upgraded.cache().unwrap();
        assert_eq!(cache.active().await.unwrap().as_deref(), Some("video-recorder-cache-v1"));
        assert_eq!(cache.keys().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_bootstrap_upgrade_replaces_generation() {
        let fetcher = manifest_fetcher();
        let state = state_with(small_config(), fetcher.clone()).await;
        install_configured(&state).await.unwrap();

        fetcher.set("http://localhost:3000/assets/icons/icon-512x512.png", "png");
        let mut next = (*state.config).clone();
        next.cache_version = "video-recorder-cache-v2".into();
        next.manifest.push("/assets/icons/icon-512x512.png".into());
        let upgraded = WorkerState { config: Arc::new(next), ..state };

        bootstrap_cache(&upgraded).await;

        let generations = upgraded.cache().unwrap().keys().await.unwrap();
        assert_eq!(generations.len(), 1);
        assert_eq!(generations[0].name, "video-recorder-cache-v2");
        assert_eq!(generations[0].entry_count, 3);
    }

    #[tokio::test]
    async fn test_start_without_durable_storage() {
        let config = AppConfig { durable_storage: false, background_sync: false, ..Default::default() };
        let (state, worker) = start(config).await.unwrap();
        assert!(worker.is_none());
        assert!(state.cache.is_none());
        assert!(!state.counter.is_durable());
        assert!(!state.sync.is_supported());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sync_worker_shares_volatile_counter() {
        let config = AppConfig { durable_storage: false, background_sync: true, ..Default::default() };
        let (state, worker) = start(config).await.unwrap();
        assert!(worker.is_some());
        assert!(!state.counter.is_durable());

        state.counter.increment().await.unwrap();
        state.sync.schedule(vidrec_core::COUNTER_SYNC_TAG).unwrap();
        tokio::time::sleep(std::time::Duration::from_secs(5)).await;

        let report = state.sync.last_report().unwrap();
        assert_eq!(report.count, Some(1));
        assert!(!report.durable);
    }

    #[tokio::test]
    async fn test_start_with_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig { db_path: dir.path().join("store.sqlite"), ..Default::default() };
        let (state, worker) = start(config).await.unwrap();
        assert!(worker.is_some());
        assert!(state.counter.is_durable());
        assert_eq!(state.counter.read().await.unwrap().unwrap().count, 0);
    }
}
