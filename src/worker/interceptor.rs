//! Request Interceptor
//!
//! Answers intercepted requests from the network or the current cache
//! generation, storing fresh same-origin responses along the way.

use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::{InterceptStats, RequestKey, SharedStorage};
use crate::config::WorkerConfig;
use crate::models::{FetchRequest, ResponseRecord, ResponseSource};
use crate::network::Fetcher;
use crate::tasks::spawn_cache_write;
use crate::worker::policy::{
    decide_response, route_request, CacheLookup, NetworkOutcome, RequestRoute, ResponseDecision,
};

/// Answer to an intercepted request.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchResponse {
    /// Not intercepted; the caller fetches the request itself
    Passthrough,
    Respond {
        response: ResponseRecord,
        source: ResponseSource,
    },
    /// Deliberate miss: neither network nor cache has an answer
    NoResponse,
}

/// A response plus the detached cache write it triggered, if any.
#[derive(Debug)]
pub struct Interception {
    pub response: FetchResponse,
    /// Awaiting this waits for the dynamic cache write; dropping it detaches
    pub cache_write: Option<JoinHandle<()>>,
}

impl Interception {
    fn new(response: FetchResponse) -> Self {
        Self {
            response,
            cache_write: None,
        }
    }
}

/// Routes intercepted requests between network and cache.
pub struct RequestInterceptor {
    config: Arc<WorkerConfig>,
    storage: SharedStorage,
    fetcher: Arc<dyn Fetcher>,
    stats: Arc<RwLock<InterceptStats>>,
}

impl RequestInterceptor {
    pub fn new(config: Arc<WorkerConfig>, storage: SharedStorage, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            config,
            storage,
            fetcher,
            stats: Arc::new(RwLock::new(InterceptStats::new())),
        }
    }

    pub async fn stats(&self) -> InterceptStats {
        self.stats.read().await.clone()
    }

    /// Decides and produces the answer for one request.
    pub async fn handle_fetch(&self, request: &FetchRequest) -> Interception {
        match route_request(request, &self.config) {
            RequestRoute::Passthrough => {
                debug!("Passthrough {} {}", request.method, request.url);
                self.stats.write().await.record_passthrough();
                Interception::new(FetchResponse::Passthrough)
            }
            RequestRoute::CacheFirst => Interception::new(self.cache_first(request).await),
            RequestRoute::NetworkFirst => self.network_first(request).await,
        }
    }

    // == Cache First ==
    async fn cache_first(&self, request: &FetchRequest) -> FetchResponse {
        let key = RequestKey::for_url(&request.url);
        let cached = self
            .storage
            .read()
            .await
            .match_in(&self.config.cache_name, &key);

        if let Some(response) = cached {
            debug!("CDN cache hit {}", request.url);
            self.stats.write().await.record_cache_hit();
            return FetchResponse::Respond {
                response,
                source: ResponseSource::Cache,
            };
        }

        match self.fetcher.fetch(request).await {
            Ok(response) => {
                self.stats.write().await.record_network();
                FetchResponse::Respond {
                    response,
                    source: ResponseSource::Network,
                }
            }
            Err(err) => {
                info!("CDN asset {} unavailable: {}", request.url, err);
                self.stats.write().await.record_miss();
                FetchResponse::NoResponse
            }
        }
    }

    // == Network First ==
    async fn network_first(&self, request: &FetchRequest) -> Interception {
        let fetched = self.fetcher.fetch(request).await;
        let outcome = match &fetched {
            Ok(response) => NetworkOutcome::Response(response),
            Err(err) => {
                info!("Network unavailable for {}, using cache: {}", request.url, err);
                NetworkOutcome::Failed
            }
        };

        match (decide_response(request, outcome, &self.config), fetched) {
            (ResponseDecision::Deliver { persist }, Ok(response)) => {
                self.stats.write().await.record_network();
                let cache_write = persist.then(|| {
                    spawn_cache_write(
                        self.storage.clone(),
                        self.stats.clone(),
                        self.config.cache_name.clone(),
                        RequestKey::for_url(&request.url),
                        response.clone(),
                    )
                });
                Interception {
                    response: FetchResponse::Respond {
                        response,
                        source: ResponseSource::Network,
                    },
                    cache_write,
                }
            }
            (ResponseDecision::Fallback(chain), _) => {
                Interception::new(self.resolve_fallback(request, &chain).await)
            }
            // Deliver is only decided for a network response
            (ResponseDecision::Deliver { .. }, Err(_)) => {
                self.stats.write().await.record_miss();
                Interception::new(FetchResponse::NoResponse)
            }
        }
    }

    async fn resolve_fallback(&self, request: &FetchRequest, chain: &[CacheLookup]) -> FetchResponse {
        let hit = {
            let storage = self.storage.read().await;
            chain.iter().find_map(|lookup| {
                storage
                    .match_in(&self.config.cache_name, &RequestKey::for_url(&lookup.url))
                    .map(|response| (response, lookup.source))
            })
        };

        let mut stats = self.stats.write().await;
        match hit {
            Some((response, source)) => {
                match source {
                    ResponseSource::Fallback => stats.record_fallback(),
                    _ => stats.record_cache_hit(),
                }
                debug!("Offline {} for {}", source.as_str(), request.url);
                FetchResponse::Respond { response, source }
            }
            None => {
                stats.record_miss();
                debug!("Offline miss for {}", request.url);
                FetchResponse::NoResponse
            }
        }
    }
}
