//! Cache Generation Module
//!
//! A named, versioned bucket of request/response pairs.

use std::collections::HashMap;

use crate::cache::entry::current_timestamp_ms;
use crate::cache::{CacheEntry, RequestKey};
use crate::error::{Result, WorkerError};
use crate::models::ResponseRecord;

// == Cache Generation ==
/// One cache generation. Writes replace by key; there is no eviction.
#[derive(Debug, Clone)]
pub struct CacheGeneration {
    name: String,
    /// Creation timestamp (Unix milliseconds), orders generations on reload
    created_at: u64,
    entries: HashMap<RequestKey, CacheEntry>,
    /// Maximum number of distinct keys
    max_entries: usize,
}

impl CacheGeneration {
    pub fn new(name: impl Into<String>, max_entries: usize) -> Self {
        Self::restore(name, current_timestamp_ms(), max_entries, Vec::new())
    }

    /// Rebuilds a generation from previously stored entries.
    pub fn restore(
        name: impl Into<String>,
        created_at: u64,
        max_entries: usize,
        entries: Vec<(RequestKey, CacheEntry)>,
    ) -> Self {
        Self {
            name: name.into(),
            created_at,
            entries: entries.into_iter().collect(),
            max_entries,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    // == Put ==
    /// Stores a response, replacing any previous one under the same key.
    ///
    /// Fails when a new key would exceed the generation's capacity.
    pub fn put(&mut self, key: RequestKey, response: ResponseRecord) -> Result<()> {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            return Err(WorkerError::Storage(format!(
                "cache '{}' is full ({} entries)",
                self.name, self.max_entries
            )));
        }
        self.entries.insert(key, CacheEntry::new(response));
        Ok(())
    }

    /// Number of keys in `keys` that are not stored yet.
    pub fn new_keys<'a>(&self, keys: impl IntoIterator<Item = &'a RequestKey>) -> usize {
        keys.into_iter()
            .filter(|key| !self.entries.contains_key(key))
            .count()
    }

    /// Remaining capacity for new keys.
    pub fn free_slots(&self) -> usize {
        self.max_entries.saturating_sub(self.entries.len())
    }

    // == Match ==
    pub fn get(&self, key: &RequestKey) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    /// All stored entries, in no particular order.
    pub fn entries(&self) -> impl Iterator<Item = (&RequestKey, &CacheEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
