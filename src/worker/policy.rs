//! Caching policy
//!
//! Pure decision functions for lifecycle events and intercepted requests.
//! They perform no I/O; the lifecycle manager and interceptor carry out
//! what they decide.

use url::Url;

use crate::config::WorkerConfig;
use crate::models::{FetchRequest, ResponseRecord, ResponseSource};

/// File extensions answered with the fallback icon when offline.
pub const IMAGE_EXTENSIONS: &[&str] = &["svg", "png", "jpg", "jpeg", "gif"];

// == Lifecycle ==

/// Lifecycle event delivered by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Install,
    /// Activation, with the generation names currently in storage
    Activate { existing: Vec<String> },
}

/// What the lifecycle manager must do for an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheAction {
    /// Open `cache_name`, store `assets`, then ask to skip waiting
    Populate {
        cache_name: String,
        assets: Vec<String>,
        skip_waiting: bool,
    },
    /// Delete `stale` generations, then claim open clients
    Purge {
        stale: Vec<String>,
        claim_clients: bool,
    },
}

pub fn decide_cache_action(event: LifecycleEvent, config: &WorkerConfig) -> CacheAction {
    match event {
        LifecycleEvent::Install => CacheAction::Populate {
            cache_name: config.cache_name.clone(),
            assets: config.assets.clone(),
            skip_waiting: true,
        },
        LifecycleEvent::Activate { existing } => CacheAction::Purge {
            stale: existing
                .into_iter()
                .filter(|name| *name != config.cache_name)
                .collect(),
            claim_clients: true,
        },
    }
}

// == Requests ==

/// Strategy chosen for an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestRoute {
    /// Not intercepted: the caller goes to the network itself
    Passthrough,
    /// Cache, then network; network responses are not stored
    CacheFirst,
    /// Network, then the offline fallback chain
    NetworkFirst,
}

pub fn route_request(request: &FetchRequest, config: &WorkerConfig) -> RequestRoute {
    if !request.is_get() || request.url.scheme() == config.extension_scheme {
        RequestRoute::Passthrough
    } else if config.is_cdn_host(&request.url) {
        RequestRoute::CacheFirst
    } else {
        RequestRoute::NetworkFirst
    }
}

/// Result of the network attempt on the network-first route.
#[derive(Debug, Clone, Copy)]
pub enum NetworkOutcome<'a> {
    Response(&'a ResponseRecord),
    Failed,
}

/// One cache lookup of the offline fallback chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLookup {
    pub url: Url,
    /// Reported source when this lookup hits
    pub source: ResponseSource,
}

impl CacheLookup {
    fn cache(url: Url) -> Self {
        Self {
            url,
            source: ResponseSource::Cache,
        }
    }
}

/// How to answer a network-first request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseDecision {
    /// Return the network response, storing a copy when `persist`
    Deliver { persist: bool },
    /// Try these lookups in order; if all miss, answer with no response
    Fallback(Vec<CacheLookup>),
}

pub fn decide_response(
    request: &FetchRequest,
    outcome: NetworkOutcome<'_>,
    config: &WorkerConfig,
) -> ResponseDecision {
    match outcome {
        NetworkOutcome::Response(response) => ResponseDecision::Deliver {
            persist: response.status.as_u16() == 200 && config.is_same_origin(&request.url),
        },
        NetworkOutcome::Failed => ResponseDecision::Fallback(fallback_chain(request, config)),
    }
}

fn fallback_chain(request: &FetchRequest, config: &WorkerConfig) -> Vec<CacheLookup> {
    if request.is_navigation() {
        return [config.root_url(), config.index_url()]
            .into_iter()
            .flatten()
            .map(CacheLookup::cache)
            .collect();
    }

    let mut chain = vec![CacheLookup::cache(request.url.clone())];
    if is_image_path(&request.url) {
        if let Ok(icon) = config.fallback_icon_url() {
            chain.push(CacheLookup {
                url: icon,
                source: ResponseSource::Fallback,
            });
        }
    }
    chain
}

/// True when the URL path ends in an image extension (case-insensitive).
pub fn is_image_path(url: &Url) -> bool {
    url.path()
        .rsplit_once('.')
        .map(|(_, ext)| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|candidate| ext.eq_ignore_ascii_case(candidate))
        })
        .unwrap_or(false)
}
