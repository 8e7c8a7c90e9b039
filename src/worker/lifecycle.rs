//! Cache Lifecycle Manager
//!
//! Populates the current cache generation on install and purges stale
//! generations on activate.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::{RequestKey, SharedStorage};
use crate::config::{InstallPolicy, WorkerConfig};
use crate::error::{Result, WorkerError};
use crate::models::{FetchRequest, ResponseRecord};
use crate::network::Fetcher;
use crate::worker::policy::{decide_cache_action, CacheAction, LifecycleEvent};

/// An asset left out of the cache during a best-effort install.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedAsset {
    pub url: String,
    pub reason: String,
}

/// Outcome of a successful install.
#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    pub cache_name: String,
    /// URLs stored, in manifest order
    pub cached: Vec<String>,
    pub skipped: Vec<SkippedAsset>,
    /// Supersede any waiting worker right away
    pub skip_waiting: bool,
}

/// Outcome of a successful activation.
#[derive(Debug, Clone, Serialize)]
pub struct ActivateReport {
    pub cache_name: String,
    /// Stale generations deleted, in storage order
    pub deleted: Vec<String>,
    /// Take control of already open clients
    pub claim_clients: bool,
}

/// Creates, fills and garbage-collects cache generations.
pub struct LifecycleManager {
    config: Arc<WorkerConfig>,
    storage: SharedStorage,
    fetcher: Arc<dyn Fetcher>,
}

impl LifecycleManager {
    pub fn new(config: Arc<WorkerConfig>, storage: SharedStorage, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            config,
            storage,
            fetcher,
        }
    }

    // == Install ==
    /// Fetches every manifest asset and stores the results in the current
    /// generation.
    ///
    /// Under [`InstallPolicy::BestEffort`] failing assets are skipped; under
    /// [`InstallPolicy::AllOrNothing`] the first failure aborts the install
    /// before anything is written. A storage failure always aborts.
    pub async fn on_install(&self) -> Result<InstallReport> {
        let CacheAction::Populate {
            cache_name,
            assets,
            skip_waiting,
        } = decide_cache_action(LifecycleEvent::Install, &self.config)
        else {
            return Err(WorkerError::Internal("install did not yield a populate action".into()));
        };

        info!(
            "Installing cache {} ({} assets via {} fetcher)",
            cache_name,
            assets.len(),
            self.fetcher.name()
        );

        let mut batch: Vec<(RequestKey, ResponseRecord)> = Vec::with_capacity(assets.len());
        let mut skipped = Vec::new();

        for asset in &assets {
            match self.fetch_asset(asset).await {
                Ok(entry) => batch.push(entry),
                Err(err) => match self.config.install_policy {
                    InstallPolicy::BestEffort => {
                        warn!("Skipping asset {}: {}", asset, err);
                        skipped.push(SkippedAsset {
                            url: asset.clone(),
                            reason: err.to_string(),
                        });
                    }
                    InstallPolicy::AllOrNothing => {
                        return Err(WorkerError::InstallFailed(format!("{}: {}", asset, err)));
                    }
                },
            }
        }

        let cached: Vec<String> = batch.iter().map(|(key, _)| key.as_str().to_string()).collect();

        self.storage
            .write()
            .await
            .put_all(&cache_name, batch)
            .map_err(|err| WorkerError::InstallFailed(err.to_string()))?;

        info!(
            "Cache {} installed: {} cached, {} skipped",
            cache_name,
            cached.len(),
            skipped.len()
        );

        Ok(InstallReport {
            cache_name,
            cached,
            skipped,
            skip_waiting,
        })
    }

    async fn fetch_asset(&self, asset: &str) -> Result<(RequestKey, ResponseRecord)> {
        let request = FetchRequest::get(self.config.resolve(asset)?);
        let response = self.fetcher.fetch(&request).await?;
        if !response.is_success() {
            return Err(WorkerError::Network(format!(
                "{} answered {}",
                request.url, response.status
            )));
        }
        debug!("Fetched asset {}", request.url);
        Ok((RequestKey::for_request(&request)?, response))
    }

    // == Activate ==
    /// Deletes every generation but the current one.
    ///
    /// All deletions complete before the report asks to claim clients.
    pub async fn on_activate(&self) -> Result<ActivateReport> {
        let existing = self.storage.read().await.keys();

        let CacheAction::Purge {
            stale,
            claim_clients,
        } = decide_cache_action(LifecycleEvent::Activate { existing }, &self.config)
        else {
            return Err(WorkerError::Internal("activate did not yield a purge action".into()));
        };

        let mut deleted = Vec::with_capacity(stale.len());
        for name in stale {
            if self.storage.write().await.delete(&name)? {
                info!("Deleted stale cache {}", name);
                deleted.push(name);
            }
        }

        info!("Cache {} active", self.config.cache_name);

        Ok(ActivateReport {
            cache_name: self.config.cache_name.clone(),
            deleted,
            claim_clients,
        })
    }
}
