//! Interception Statistics Module
//!
//! Tracks how intercepted requests were answered.

use serde::Serialize;

// == Intercept Stats ==
/// Counters for intercepted requests and dynamic cache writes.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InterceptStats {
    /// Responses delivered from the network
    pub network_responses: u64,
    /// Responses delivered from the cache
    pub cache_hits: u64,
    /// Offline fallback assets delivered
    pub fallback_hits: u64,
    /// Requests answered with an explicit "no response"
    pub misses: u64,
    /// Requests left to the network untouched
    pub passthrough: u64,
    /// Dynamic cache writes that succeeded
    pub stores: u64,
    /// Dynamic cache writes that failed and were swallowed
    pub store_failures: u64,
}

impl InterceptStats {
    // == Constructor ==
    /// Creates a new InterceptStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Offline Hit Rate ==
    /// Share of cache-answered requests (hits and fallbacks) that produced a response.
    ///
    /// Returns 0.0 if the cache has not been consulted yet.
    pub fn offline_hit_rate(&self) -> f64 {
        let served = self.cache_hits + self.fallback_hits;
        let total = served + self.misses;
        if total == 0 {
            0.0
        } else {
            served as f64 / total as f64
        }
    }

    pub fn record_network(&mut self) {
        self.network_responses += 1;
    }

    pub fn record_cache_hit(&mut self) {
        self.cache_hits += 1;
    }

    pub fn record_fallback(&mut self) {
        self.fallback_hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_passthrough(&mut self) {
        self.passthrough += 1;
    }

    pub fn record_store(&mut self) {
        self.stores += 1;
    }

    pub fn record_store_failure(&mut self) {
        self.store_failures += 1;
    }
}
