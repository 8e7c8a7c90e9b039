//! API Handlers
//!
//! Control endpoints for the worker and the proxy handler that turns every
//! other request into a fetch event.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    extract::{Path, Request, State},
    http::{HeaderValue, Uri},
    response::Response,
    Json,
};
use tracing::debug;
use url::Url;

use crate::cache::CacheStorage;
use crate::config::WorkerConfig;
use crate::error::{Result, WorkerError};
use crate::models::{
    FetchRequest, GenerationSummary, HealthResponse, RegisterResponse, RequestMode,
    ResponseRecord, ResponseSource, StatsResponse, StatusResponse, SyncResponse,
};
use crate::network::{Fetcher, HttpFetcher};
use crate::worker::{FetchResponse, ServiceWorker};

/// Response header naming where an intercepted response came from.
pub const CACHE_SOURCE_HEADER: &str = "x-offline-cache";

/// Largest request body the proxy buffers.
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The registered worker version
    pub worker: Arc<ServiceWorker>,
    /// Network used for requests the worker does not intercept
    pub fetcher: Arc<dyn Fetcher>,
}

impl AppState {
    pub fn new(worker: ServiceWorker, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            worker: Arc::new(worker),
            fetcher,
        }
    }

    /// Creates an AppState from configuration with an HTTP fetcher.
    ///
    /// Storage is loaded from `cache_dir` when set, so generations written
    /// by an earlier deployment are visible to this one.
    pub fn from_config(config: &WorkerConfig) -> Result<Self> {
        let fetcher: Arc<dyn Fetcher> =
            Arc::new(HttpFetcher::new(config.fetch_timeout.map(Duration::from_secs))?);
        let storage = match &config.cache_dir {
            Some(dir) => CacheStorage::persistent(dir, config.max_entries)?.into_shared(),
            None => CacheStorage::shared(config.max_entries),
        };
        let worker = ServiceWorker::new(config.clone(), storage, fetcher.clone());
        Ok(Self::new(worker, fetcher))
    }
}

/// Handler for POST /__sw/register
pub async fn register_handler(State(state): State<AppState>) -> Result<Json<RegisterResponse>> {
    let registration = state.worker.register().await?;
    let worker_state = state.worker.state().await;
    Ok(Json(RegisterResponse::new(registration, worker_state)))
}

/// Handler for POST /__sw/unregister
pub async fn unregister_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    state.worker.unregister().await;
    status_handler(State(state)).await
}

/// Handler for POST /__sw/sync/:tag
pub async fn sync_handler(
    State(state): State<AppState>,
    Path(tag): Path<String>,
) -> Json<SyncResponse> {
    let outcome = state.worker.handle_sync(&tag).await;
    Json(SyncResponse { tag, outcome })
}

/// Handler for GET /__sw/status
pub async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    let worker_state = state.worker.state().await;
    let current = &state.worker.config().cache_name;

    let generations = {
        let storage = state.worker.storage().read().await;
        storage
            .keys()
            .into_iter()
            .map(|name| GenerationSummary {
                entries: storage.get(&name).map(|g| g.len()).unwrap_or(0),
                current: &name == current,
                name,
            })
            .collect()
    };

    Json(StatusResponse {
        cache_name: current.clone(),
        phase: worker_state.phase,
        controlling: worker_state.controlling,
        generations,
    })
}

/// Handler for GET /__sw/stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let counters = state.worker.stats().await;
    let total_entries = state.worker.storage().read().await.total_entries();
    Json(StatsResponse::new(counters, total_entries))
}

/// Handler for GET /__sw/health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

/// Fallback handler: every non-control request is a fetch event.
///
/// Intercepted responses carry an `x-offline-cache` header. A deliberate
/// miss becomes `504 Gateway Timeout`.
pub async fn proxy_handler(State(state): State<AppState>, request: Request) -> Result<Response> {
    let fetch = fetch_request(state.worker.config(), request).await?;
    let interception = state.worker.handle_fetch(&fetch).await;

    // The dynamic cache write, if any, finishes on its own
    drop(interception.cache_write);

    match interception.response {
        FetchResponse::Passthrough => {
            debug!("Forwarding {} {}", fetch.method, fetch.url);
            let response = state.fetcher.fetch(&fetch).await?;
            Ok(into_http(response, None))
        }
        FetchResponse::Respond { response, source } => Ok(into_http(response, Some(source))),
        FetchResponse::NoResponse => Err(WorkerError::NoResponse(fetch.url.to_string())),
    }
}

/// Builds a fetch request from an incoming proxy request.
///
/// Absolute-form URIs are used as-is; origin-form URIs are resolved against
/// the configured origin.
pub async fn fetch_request(config: &WorkerConfig, request: Request) -> Result<FetchRequest> {
    let (parts, body) = request.into_parts();
    let url = request_url(config, &parts.uri)?;
    let mode = parts
        .headers
        .get("sec-fetch-mode")
        .and_then(|v| v.to_str().ok())
        .map(RequestMode::from_header)
        .unwrap_or_default();
    let body = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|err| WorkerError::InvalidRequest(format!("unreadable body: {}", err)))?;

    Ok(FetchRequest {
        method: parts.method,
        url,
        mode,
        headers: parts.headers,
        body,
    })
}

fn request_url(config: &WorkerConfig, uri: &Uri) -> Result<Url> {
    if uri.scheme().is_some() {
        return Ok(Url::parse(&uri.to_string())?);
    }
    let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    config.resolve(path)
}

fn into_http(record: ResponseRecord, source: Option<ResponseSource>) -> Response {
    let mut response = Response::new(Body::from(record.body));
    *response.status_mut() = record.status;
    *response.headers_mut() = record.headers;
    if let Some(source) = source {
        response
            .headers_mut()
            .insert(CACHE_SOURCE_HEADER, HeaderValue::from_static(source.as_str()));
    }
    response
}
