//! Response DTOs for the control API
//!
//! Defines the JSON bodies returned by the `/__sw` endpoints.

use serde::Serialize;

use crate::cache::InterceptStats;
use crate::worker::{Registration, SyncOutcome, WorkerPhase, WorkerState};

/// Response body for `POST /__sw/register`
#[derive(Debug, Clone, Serialize)]
pub struct RegisterResponse {
    pub cache_name: String,
    pub phase: WorkerPhase,
    pub controlling: bool,
    /// URLs pre-cached during install
    pub cached: Vec<String>,
    /// Manifest entries skipped by a best-effort install
    pub skipped: Vec<String>,
    /// Stale generations deleted on activate
    pub deleted: Vec<String>,
}

impl RegisterResponse {
    pub fn new(registration: Registration, state: WorkerState) -> Self {
        Self {
            cache_name: registration.install.cache_name,
            phase: state.phase,
            controlling: state.controlling,
            cached: registration.install.cached,
            skipped: registration
                .install
                .skipped
                .into_iter()
                .map(|asset| asset.url)
                .collect(),
            deleted: registration
                .activate
                .map(|report| report.deleted)
                .unwrap_or_default(),
        }
    }
}

/// One generation as listed by the status endpoint
#[derive(Debug, Clone, Serialize)]
pub struct GenerationSummary {
    pub name: String,
    pub entries: usize,
    pub current: bool,
}

/// Response body for `GET /__sw/status`
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub cache_name: String,
    pub phase: WorkerPhase,
    pub controlling: bool,
    pub generations: Vec<GenerationSummary>,
}

/// Response body for `GET /__sw/stats`
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub counters: InterceptStats,
    /// Share of offline lookups that found something
    pub offline_hit_rate: f64,
    /// Entries across all generations
    pub total_entries: usize,
}

impl StatsResponse {
    pub fn new(counters: InterceptStats, total_entries: usize) -> Self {
        Self {
            offline_hit_rate: counters.offline_hit_rate(),
            counters,
            total_entries,
        }
    }
}

/// Response body for `POST /__sw/sync/:tag`
#[derive(Debug, Clone, Serialize)]
pub struct SyncResponse {
    pub tag: String,
    pub outcome: SyncOutcome,
}

/// Response body for the health endpoint (GET /__sw/health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
