//! API Module
//!
//! HTTP host for the caching worker.
//!
//! # Endpoints
//! - `POST /__sw/register` - Install and activate the worker
//! - `POST /__sw/unregister` - Stop intercepting
//! - `POST /__sw/sync/:tag` - Background sync trigger
//! - `GET /__sw/status` - Worker phase and generations
//! - `GET /__sw/stats` - Interception counters
//! - `GET /__sw/health` - Health check endpoint
//! - everything else - proxied through the worker

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
