//! Worker Module
//!
//! The caching worker: lifecycle manager, request interceptor, background
//! sync and the registration that hosts them.
//!
//! Decisions live in [`policy`] as pure functions; the other modules perform
//! the storage and network I/O those decisions call for.

pub mod interceptor;
pub mod lifecycle;
pub mod policy;
pub mod registration;
pub mod sync;

pub use interceptor::{FetchResponse, Interception, RequestInterceptor};
pub use lifecycle::{ActivateReport, InstallReport, LifecycleManager, SkippedAsset};
pub use policy::{
    decide_cache_action, decide_response, route_request, CacheAction, CacheLookup,
    LifecycleEvent, NetworkOutcome, RequestRoute, ResponseDecision,
};
pub use registration::{Registration, ServiceWorker, WorkerPhase, WorkerState};
pub use sync::{BackgroundSync, SyncOutcome};
