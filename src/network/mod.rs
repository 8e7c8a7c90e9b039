//! Network Module
//!
//! Abstraction over the live network so the lifecycle manager and
//! interceptor can run against a real HTTP client or a scripted one.

mod http;
mod scripted;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{FetchRequest, ResponseRecord};

pub use http::{forwardable_headers, HttpFetcher};
pub use scripted::ScriptedFetcher;

/// Performs network fetches.
///
/// Any HTTP response, whatever its status, is `Ok`. `Err` means the network
/// itself failed (offline, connection refused, timeout).
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch a request over the network
    async fn fetch(&self, request: &FetchRequest) -> Result<ResponseRecord>;

    /// Human-readable backend name for logs
    fn name(&self) -> &'static str;
}
