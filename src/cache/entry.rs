//! Cache Entry Module
//!
//! Defines request identities and the responses stored under them.

use url::Url;

use crate::error::{Result, WorkerError};
use crate::models::{FetchRequest, ResponseRecord};

// == Request Key ==
/// Identity of a cached request: GET plus the absolute URL without fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey(String);

impl RequestKey {
    /// Key for a URL fetched with GET.
    pub fn for_url(url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self(url.into())
    }

    /// Key for an intercepted request. Only GET requests can be cached.
    pub fn for_request(request: &FetchRequest) -> Result<Self> {
        if !request.is_get() {
            return Err(WorkerError::InvalidRequest(format!(
                "cannot cache {} {}",
                request.method, request.url
            )));
        }
        Ok(Self::for_url(&request.url))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// == Cache Entry ==
/// A stored response and when it was written.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub response: ResponseRecord,
    /// Write timestamp (Unix milliseconds)
    pub stored_at: u64,
}

impl CacheEntry {
    pub fn new(response: ResponseRecord) -> Self {
        Self {
            response,
            stored_at: current_timestamp_ms(),
        }
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub(crate) fn current_timestamp_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}
