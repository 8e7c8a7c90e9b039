//! Request and Response models
//!
//! Fetch records exchanged with the network and cache, plus the DTOs
//! serialized by the control API.

pub mod fetch;
pub mod responses;

// Re-export commonly used types
pub use fetch::{FetchRequest, RequestMode, ResponseRecord, ResponseSource};
pub use responses::{
    ErrorResponse, GenerationSummary, HealthResponse, RegisterResponse, StatsResponse,
    StatusResponse, SyncResponse,
};
