//! Offline Proxy - A network-first offline caching proxy
//!
//! Intercepts requests for a to-do web app, serves cached assets when the
//! network is down and manages versioned cache generations across releases.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod network;
pub mod tasks;
pub mod worker;

pub use api::AppState;
pub use config::WorkerConfig;
pub use error::{Result, WorkerError};
pub use worker::ServiceWorker;
