//! Service worker registration
//!
//! Hosts the lifecycle manager, interceptor and sync handler for one cache
//! version and tracks whether that version controls clients yet.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::cache::{InterceptStats, SharedStorage};
use crate::config::WorkerConfig;
use crate::error::{Result, WorkerError};
use crate::models::FetchRequest;
use crate::network::Fetcher;
use crate::worker::interceptor::{FetchResponse, Interception, RequestInterceptor};
use crate::worker::lifecycle::{ActivateReport, InstallReport, LifecycleManager};
use crate::worker::sync::{BackgroundSync, SyncOutcome};

/// Lifecycle phase of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerPhase {
    /// Created, not installed yet
    Parsed,
    Installing,
    /// Installed and waiting to activate
    Installed,
    Activating,
    Activated,
    /// Failed to install or unregistered
    Redundant,
}

/// Snapshot of a worker's phase and control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkerState {
    pub phase: WorkerPhase,
    /// True once the worker has claimed open clients
    pub controlling: bool,
}

/// Reports of a full registration.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub install: InstallReport,
    /// None when the worker was left waiting
    pub activate: Option<ActivateReport>,
}

/// One registered version of the caching worker.
pub struct ServiceWorker {
    config: Arc<WorkerConfig>,
    storage: SharedStorage,
    lifecycle: LifecycleManager,
    interceptor: RequestInterceptor,
    sync: BackgroundSync,
    state: RwLock<WorkerState>,
}

impl ServiceWorker {
    pub fn new(config: WorkerConfig, storage: SharedStorage, fetcher: Arc<dyn Fetcher>) -> Self {
        let config = Arc::new(config);
        Self {
            lifecycle: LifecycleManager::new(config.clone(), storage.clone(), fetcher.clone()),
            interceptor: RequestInterceptor::new(config.clone(), storage.clone(), fetcher),
            sync: BackgroundSync::new(config.sync_tag.clone()),
            state: RwLock::new(WorkerState {
                phase: WorkerPhase::Parsed,
                controlling: false,
            }),
            config,
            storage,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn storage(&self) -> &SharedStorage {
        &self.storage
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    pub async fn stats(&self) -> InterceptStats {
        self.interceptor.stats().await
    }

    // == Install ==
    /// Runs the install step and leaves existing generations untouched on
    /// failure.
    ///
    /// A worker that was already installed or active keeps its previous
    /// state, and with it control, when a re-install fails. Any other
    /// worker becomes redundant.
    pub async fn install(&self) -> Result<InstallReport> {
        let previous = self.state().await;
        self.set_phase(WorkerPhase::Installing).await;

        match self.lifecycle.on_install().await {
            Ok(report) => {
                self.set_phase(WorkerPhase::Installed).await;
                Ok(report)
            }
            Err(err) => {
                warn!("Install of {} failed: {}", self.config.cache_name, err);
                *self.state.write().await = match previous.phase {
                    WorkerPhase::Installed | WorkerPhase::Activated => previous,
                    _ => WorkerState {
                        phase: WorkerPhase::Redundant,
                        controlling: false,
                    },
                };
                Err(err)
            }
        }
    }

    // == Activate ==
    /// Purges stale generations, then claims clients.
    pub async fn activate(&self) -> Result<ActivateReport> {
        let phase = self.state().await.phase;
        if !matches!(phase, WorkerPhase::Installed | WorkerPhase::Activated) {
            return Err(WorkerError::InvalidRequest(format!(
                "cannot activate a worker that is {:?}",
                phase
            )));
        }

        let previous = self.state().await;
        self.set_phase(WorkerPhase::Activating).await;
        let report = match self.lifecycle.on_activate().await {
            Ok(report) => report,
            Err(err) => {
                warn!("Activation of {} failed: {}", self.config.cache_name, err);
                *self.state.write().await = previous;
                return Err(err);
            }
        };

        // Stale generations are gone; only now take over open clients
        let mut state = self.state.write().await;
        state.phase = WorkerPhase::Activated;
        state.controlling = report.claim_clients;
        Ok(report)
    }

    // == Register ==
    /// Installs and, when install asks to skip waiting, activates at once.
    pub async fn register(&self) -> Result<Registration> {
        info!("Registering worker for {}", self.config.cache_name);
        let install = self.install().await?;
        let activate = if install.skip_waiting {
            Some(self.activate().await?)
        } else {
            None
        };
        Ok(Registration { install, activate })
    }

    // == Resume ==
    /// Takes over the current generation restored from a previous run
    /// without fetching anything.
    ///
    /// Returns None when storage holds no generation under the current name.
    pub async fn resume(&self) -> Result<Option<ActivateReport>> {
        if !self.storage.read().await.has(&self.config.cache_name) {
            return Ok(None);
        }
        info!("Resuming worker on stored cache {}", self.config.cache_name);
        {
            let mut state = self.state.write().await;
            if state.phase != WorkerPhase::Activated {
                state.phase = WorkerPhase::Installed;
            }
        }
        self.activate().await.map(Some)
    }

    /// Stops intercepting. Cached generations stay in storage.
    pub async fn unregister(&self) {
        info!("Unregistering worker for {}", self.config.cache_name);
        let mut state = self.state.write().await;
        state.phase = WorkerPhase::Redundant;
        state.controlling = false;
    }

    // == Events ==
    /// Handles a fetch event. Requests are only intercepted while the
    /// worker controls clients.
    pub async fn handle_fetch(&self, request: &FetchRequest) -> Interception {
        if !self.state().await.controlling {
            return Interception {
                response: FetchResponse::Passthrough,
                cache_write: None,
            };
        }
        self.interceptor.handle_fetch(request).await
    }

    pub async fn handle_sync(&self, tag: &str) -> SyncOutcome {
        self.sync.on_sync(tag).await
    }

    async fn set_phase(&self, phase: WorkerPhase) {
        self.state.write().await.phase = phase;
    }
}
