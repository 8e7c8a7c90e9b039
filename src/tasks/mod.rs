//! Background Tasks Module
//!
//! Tasks that run detached from the event that spawned them.
//!
//! # Tasks
//! - Cache write: stores a network response while the original is delivered

mod cache_write;

pub use cache_write::spawn_cache_write;
