//! reqwest-backed fetcher

use std::time::Duration;

use async_trait::async_trait;
use axum::http::HeaderMap;
use reqwest::redirect::Policy;
use tracing::debug;

use crate::error::Result;
use crate::models::{FetchRequest, ResponseRecord};
use crate::network::Fetcher;

/// Headers that describe a single hop and must not be forwarded.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "host",
    "content-length",
    "transfer-encoding",
    "te",
    "trailer",
    "upgrade",
    "keep-alive",
    "proxy-connection",
    "proxy-authorization",
    "proxy-authenticate",
];

/// Copies `headers` without hop-by-hop entries.
pub fn forwardable_headers(headers: &HeaderMap) -> HeaderMap {
    let mut forwarded = headers.clone();
    for name in HOP_BY_HOP {
        forwarded.remove(*name);
    }
    forwarded
}

/// Fetches over HTTP with reqwest. Redirects are returned to the caller.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Builds a client, optionally bounding every fetch by `timeout`.
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder().redirect(Policy::none());
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<ResponseRecord> {
        debug!("fetch {} {}", request.method, request.url);

        let response = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(forwardable_headers(&request.headers))
            .body(request.body.clone())
            .send()
            .await?;

        let status = response.status();
        let headers = forwardable_headers(response.headers());
        let body = response.bytes().await?;

        Ok(ResponseRecord {
            status,
            headers,
            body,
        })
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
