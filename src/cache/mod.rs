//! Cache Module
//!
//! Named cache generations holding request/response pairs, optionally
//! persisted as JSON snapshots.

mod entry;
mod generation;
mod snapshot;
mod stats;
mod storage;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use entry::{CacheEntry, RequestKey};
pub use generation::CacheGeneration;
pub(crate) use snapshot::SnapshotDir;
pub use stats::InterceptStats;
pub use storage::{CacheStorage, SharedStorage};
