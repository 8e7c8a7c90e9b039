//! Cache Storage Module
//!
//! The set of named cache generations, in creation order. Storage opened on
//! a directory mirrors every change to a snapshot file before applying it.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use crate::cache::{CacheGeneration, RequestKey, SnapshotDir};
use crate::error::{Result, WorkerError};
use crate::models::ResponseRecord;

/// Storage shared between the lifecycle manager, interceptor and write tasks.
pub type SharedStorage = Arc<RwLock<CacheStorage>>;

// == Cache Storage ==
/// All cache generations known to the host.
#[derive(Debug)]
pub struct CacheStorage {
    /// Generations in creation order
    generations: Vec<CacheGeneration>,
    /// Capacity of every generation opened through this storage
    max_entries: usize,
    /// Where generations are persisted; None keeps them in memory only
    snapshots: Option<SnapshotDir>,
}

impl CacheStorage {
    // == Constructor ==
    /// Creates an empty in-memory storage whose generations hold up to
    /// `max_entries` keys.
    pub fn new(max_entries: usize) -> Self {
        Self {
            generations: Vec::new(),
            max_entries,
            snapshots: None,
        }
    }

    /// Opens a storage persisted under `dir`, loading the generations a
    /// previous run left there.
    pub fn persistent(dir: impl Into<PathBuf>, max_entries: usize) -> Result<Self> {
        let snapshots = SnapshotDir::create(dir)?;
        let generations = snapshots.load_all(max_entries)?;
        info!(
            "Loaded {} cache generation(s) from {}",
            generations.len(),
            snapshots.root().display()
        );
        Ok(Self {
            generations,
            max_entries,
            snapshots: Some(snapshots),
        })
    }

    /// Wraps a new in-memory storage for sharing across tasks.
    pub fn shared(max_entries: usize) -> SharedStorage {
        Self::new(max_entries).into_shared()
    }

    pub fn into_shared(self) -> SharedStorage {
        Arc::new(RwLock::new(self))
    }

    // == Open ==
    /// Returns the named generation, creating an empty one when absent.
    pub fn open(&mut self, name: &str) -> Result<&CacheGeneration> {
        let index = match self.position(name) {
            Some(index) => index,
            None => self.commit(CacheGeneration::new(name, self.max_entries))?,
        };
        Ok(&self.generations[index])
    }

    pub fn get(&self, name: &str) -> Option<&CacheGeneration> {
        self.generations.iter().find(|g| g.name() == name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    // == Keys ==
    /// Names of all generations, oldest first.
    pub fn keys(&self) -> Vec<String> {
        self.generations.iter().map(|g| g.name().to_string()).collect()
    }

    // == Delete ==
    /// Deletes a whole generation. Returns false when it did not exist.
    pub fn delete(&mut self, name: &str) -> Result<bool> {
        let Some(index) = self.position(name) else {
            return Ok(false);
        };
        if let Some(snapshots) = &self.snapshots {
            snapshots.remove(name)?;
        }
        self.generations.remove(index);
        Ok(true)
    }

    // == Match ==
    /// Looks up a response in one generation.
    pub fn match_in(&self, name: &str, key: &RequestKey) -> Option<ResponseRecord> {
        self.get(name)
            .and_then(|g| g.get(key))
            .map(|entry| entry.response.clone())
    }

    // == Put ==
    /// Stores one response, creating the generation if needed.
    pub fn put(&mut self, name: &str, key: RequestKey, response: ResponseRecord) -> Result<()> {
        let mut staged = self.staged(name);
        staged.put(key, response)?;
        self.commit(staged)?;
        Ok(())
    }

    /// Stores a batch of responses or nothing at all.
    ///
    /// Capacity is checked for the whole batch before the first write. A
    /// rejected batch leaves storage unchanged, including generation names.
    pub fn put_all(&mut self, name: &str, batch: Vec<(RequestKey, ResponseRecord)>) -> Result<()> {
        let mut staged = self.staged(name);
        let needed = staged.new_keys(batch.iter().map(|(key, _)| key));
        if needed > staged.free_slots() {
            return Err(WorkerError::Storage(format!(
                "cache '{}' cannot hold {} more entries",
                name, needed
            )));
        }
        for (key, response) in batch {
            staged.put(key, response)?;
        }
        self.commit(staged)?;
        Ok(())
    }

    // == Length ==
    /// Number of generations.
    pub fn len(&self) -> usize {
        self.generations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generations.is_empty()
    }

    /// Total entries across all generations.
    pub fn total_entries(&self) -> usize {
        self.generations.iter().map(CacheGeneration::len).sum()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.generations.iter().position(|g| g.name() == name)
    }

    /// Working copy of the named generation, or a fresh one.
    fn staged(&self, name: &str) -> CacheGeneration {
        self.get(name)
            .cloned()
            .unwrap_or_else(|| CacheGeneration::new(name, self.max_entries))
    }

    /// Persists `generation`, then swaps it in. Returns its index.
    fn commit(&mut self, generation: CacheGeneration) -> Result<usize> {
        if let Some(snapshots) = &self.snapshots {
            snapshots.save(&generation)?;
        }
        match self.position(generation.name()) {
            Some(index) => {
                self.generations[index] = generation;
                Ok(index)
            }
            None => {
                self.generations.push(generation);
                Ok(self.generations.len() - 1)
            }
        }
    }
}
