//! In-memory fetcher with scripted responses
//!
//! Stands in for the network in tests and offline simulations: responses are
//! registered per URL, and the whole network (or single URLs) can be taken
//! down.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use axum::http::StatusCode;

use crate::cache::RequestKey;
use crate::error::{Result, WorkerError};
use crate::models::{FetchRequest, ResponseRecord};
use crate::network::Fetcher;

#[derive(Debug, Default)]
pub struct ScriptedFetcher {
    responses: Mutex<HashMap<String, ResponseRecord>>,
    failing: Mutex<HashSet<String>>,
    offline: AtomicBool,
    /// URLs fetched, in order
    log: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `response` for `url`. Unknown URLs answer 404.
    pub fn respond(&self, url: &str, response: ResponseRecord) -> &Self {
        lock(&self.responses).insert(normalize(url), response);
        self
    }

    /// Makes fetches of `url` fail at the network level.
    pub fn fail(&self, url: &str) -> &Self {
        lock(&self.failing).insert(normalize(url));
        self
    }

    /// Takes the whole network down (`false`) or back up (`true`).
    pub fn set_online(&self, online: bool) {
        self.offline.store(!online, Ordering::SeqCst);
    }

    pub fn fetch_count(&self) -> usize {
        lock(&self.log).len()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<ResponseRecord> {
        let url = RequestKey::for_url(&request.url).as_str().to_string();
        lock(&self.log).push(url.clone());

        if self.offline.load(Ordering::SeqCst) {
            return Err(WorkerError::Network(format!("offline: {}", url)));
        }
        if lock(&self.failing).contains(&url) {
            return Err(WorkerError::Network(format!("connection reset: {}", url)));
        }

        Ok(lock(&self.responses)
            .get(&url)
            .cloned()
            .unwrap_or_else(|| ResponseRecord::new(StatusCode::NOT_FOUND, "not found")))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

fn normalize(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) => RequestKey::for_url(&parsed).as_str().to_string(),
        Err(_) => url.to_string(),
    }
}

// A poisoned lock only means another test thread panicked mid-update.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
