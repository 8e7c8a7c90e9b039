//! Integration Tests for the offline proxy
//!
//! Drives the worker through the HTTP router and the public library API:
//! registration, offline fallbacks and cache versioning.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use offline_proxy::{
    api::create_router,
    cache::{CacheStorage, RequestKey, SharedStorage},
    models::{FetchRequest, ResponseRecord, ResponseSource},
    network::ScriptedFetcher,
    worker::{FetchResponse, ServiceWorker, WorkerPhase},
    AppState, WorkerConfig,
};
use serde_json::Value;
use tower::ServiceExt;

// == Helper Functions ==

const ORIGIN: &str = "http://127.0.0.1:8080";

/// Upstream app answering every manifest asset with a distinct body.
fn upstream() -> Arc<ScriptedFetcher> {
    let fetcher = Arc::new(ScriptedFetcher::new());
    for asset in WorkerConfig::default().assets {
        fetcher.respond(
            &format!("{}{}", ORIGIN, asset),
            ResponseRecord::ok(format!("body of {}", asset)).with_header("content-type", "text/plain"),
        );
    }
    fetcher
}

fn create_test_app(fetcher: Arc<ScriptedFetcher>, storage: SharedStorage) -> (Router, AppState) {
    let worker = ServiceWorker::new(WorkerConfig::default(), storage, fetcher.clone());
    let state = AppState::new(worker, fetcher);
    (create_router(state.clone()), state)
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_to_string(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> axum::response::Response {
    app.clone().oneshot(request).await.unwrap()
}

async fn register(app: &Router) -> Value {
    let response = send(
        app,
        Request::builder()
            .method("POST")
            .uri("/__sw/register")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    body_to_json(response.into_body()).await
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn navigate(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("sec-fetch-mode", "navigate")
        .body(Body::empty())
        .unwrap()
}

// == Registration ==

#[tokio::test]
async fn test_register_endpoint_installs_and_claims() {
    let (app, _) = create_test_app(upstream(), CacheStorage::shared(100));

    let json = register(&app).await;
    assert_eq!(json["cache_name"], "todo-app-v2.0");
    assert_eq!(json["phase"], "activated");
    assert_eq!(json["controlling"], true);
    assert_eq!(json["cached"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_register_endpoint_reports_install_failure() {
    // One entry of capacity cannot hold five assets
    let (app, state) = create_test_app(upstream(), CacheStorage::shared(1));

    let response = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/__sw/register")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = body_to_json(response.into_body()).await;
    assert!(json["error"].as_str().unwrap().contains("Install failed"));
    assert_eq!(state.worker.state().await.phase, WorkerPhase::Redundant);
}

// == Interception ==

#[tokio::test]
async fn test_online_request_served_from_network() {
    let fetcher = upstream();
    let (app, _) = create_test_app(fetcher.clone(), CacheStorage::shared(100));
    register(&app).await;

    let response = send(&app, get("/todo-list-pwa/manifest.json")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-offline-cache"], "network");
}

#[tokio::test]
async fn test_offline_roundtrip_is_byte_identical() {
    let fetcher = upstream();
    let (app, _) = create_test_app(fetcher.clone(), CacheStorage::shared(100));
    register(&app).await;
    fetcher.set_online(false);

    let response = send(&app, get("/todo-list-pwa/manifest.json")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-offline-cache"], "cache");
    assert_eq!(response.headers()["content-type"], "text/plain");
    assert_eq!(
        body_to_string(response.into_body()).await,
        "body of /todo-list-pwa/manifest.json"
    );
}

#[tokio::test]
async fn test_offline_icon_fallback_for_uncached_image() {
    let fetcher = upstream();
    let (app, _) = create_test_app(fetcher.clone(), CacheStorage::shared(100));
    register(&app).await;
    fetcher.set_online(false);

    let response = send(&app, get("/todo-list-pwa/icons/icon-192x192.svg")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-offline-cache"], "fallback");
    assert_eq!(
        body_to_string(response.into_body()).await,
        "body of /todo-list-pwa/icons/icon-192.png"
    );
}

#[tokio::test]
async fn test_offline_navigation_uses_index_when_root_missing() {
    let fetcher = upstream();
    // Root page unavailable at install time
    fetcher.fail(&format!("{}/todo-list-pwa/", ORIGIN));
    let (app, _) = create_test_app(fetcher.clone(), CacheStorage::shared(100));

    let json = register(&app).await;
    assert_eq!(json["skipped"][0], "/todo-list-pwa/");
    fetcher.set_online(false);

    let response = send(&app, navigate("/todo-list-pwa/")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_to_string(response.into_body()).await,
        "body of /todo-list-pwa/index.html"
    );
}

#[tokio::test]
async fn test_offline_uncached_request_is_gateway_timeout() {
    let fetcher = upstream();
    let (app, _) = create_test_app(fetcher.clone(), CacheStorage::shared(100));
    register(&app).await;
    fetcher.set_online(false);

    let response = send(&app, get("/todo-list-pwa/api/todos.json")).await;
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    let json = body_to_json(response.into_body()).await;
    assert!(json["error"].as_str().unwrap().contains("todos.json"));
}

#[tokio::test]
async fn test_offline_cdn_miss_is_gateway_timeout() {
    let fetcher = upstream();
    let (app, _) = create_test_app(fetcher.clone(), CacheStorage::shared(100));
    register(&app).await;
    fetcher.set_online(false);

    let response = send(&app, get("https://cdn.jsdelivr.net/npm/bootstrap/dist/logo.png")).await;
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
}

#[tokio::test]
async fn test_non_get_is_never_cached() {
    let fetcher = upstream();
    fetcher.respond(&format!("{}/api/todos", ORIGIN), ResponseRecord::ok("saved"));
    let storage = CacheStorage::shared(100);
    let (app, _) = create_test_app(fetcher.clone(), storage.clone());
    register(&app).await;
    let entries_before = storage.read().await.total_entries();

    let response = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/api/todos")
            .body(Body::from(r#"{"title":"milk"}"#))
            .unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("x-offline-cache").is_none());
    assert_eq!(storage.read().await.total_entries(), entries_before);
}

#[tokio::test]
async fn test_stats_endpoint_counts_outcomes() {
    let fetcher = upstream();
    let (app, _) = create_test_app(fetcher.clone(), CacheStorage::shared(100));
    register(&app).await;
    fetcher.set_online(false);

    send(&app, get("/todo-list-pwa/manifest.json")).await;
    send(&app, get("/todo-list-pwa/missing.js")).await;

    let response = send(&app, get("/__sw/stats")).await;
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["cache_hits"], 1);
    assert_eq!(json["misses"], 1);
    assert_eq!(json["total_entries"], 5);
}

// == Versioning ==

#[tokio::test]
async fn test_new_version_replaces_old_generation() {
    let fetcher = upstream();
    let storage = CacheStorage::shared(100);

    let v1 = ServiceWorker::new(
        WorkerConfig::default().with_cache_name("todo-app-v1.0"),
        storage.clone(),
        fetcher.clone(),
    );
    v1.register().await.unwrap();

    // Dynamically cached under v1 only
    let extra = WorkerConfig::default().resolve("/todo-list-pwa/app.js").unwrap();
    fetcher.respond(extra.as_str(), ResponseRecord::ok("v1 js"));
    let interception = v1.handle_fetch(&FetchRequest::get(extra.clone())).await;
    interception.cache_write.unwrap().await.unwrap();

    let v2 = ServiceWorker::new(WorkerConfig::default(), storage.clone(), fetcher.clone());
    v2.install().await.unwrap();
    assert_eq!(storage.read().await.keys(), vec!["todo-app-v1.0", "todo-app-v2.0"]);

    let report = v2.activate().await.unwrap();
    assert_eq!(report.deleted, vec!["todo-app-v1.0"]);
    assert_eq!(storage.read().await.keys(), vec!["todo-app-v2.0"]);

    // v1's dynamic entry is gone with its generation
    fetcher.set_online(false);
    let result = v2.handle_fetch(&FetchRequest::get(extra.clone())).await;
    assert_eq!(result.response, FetchResponse::NoResponse);
    assert!(storage
        .read()
        .await
        .match_in("todo-app-v1.0", &RequestKey::for_url(&extra))
        .is_none());
}

#[tokio::test]
async fn test_failed_install_keeps_previous_generation() {
    let fetcher = upstream();
    let storage = CacheStorage::shared(5);

    let v1 = ServiceWorker::new(
        WorkerConfig::default().with_cache_name("todo-app-v1.0"),
        storage.clone(),
        fetcher.clone(),
    );
    v1.register().await.unwrap();

    // v2 ships one more asset than a generation can hold
    let mut v2_config = WorkerConfig::default();
    v2_config.assets.push("/todo-list-pwa/app.js".to_string());
    fetcher.respond(&format!("{}/todo-list-pwa/app.js", ORIGIN), ResponseRecord::ok("js"));

    let v2 = ServiceWorker::new(v2_config, storage.clone(), fetcher.clone());
    assert!(v2.register().await.is_err());
    assert_eq!(v2.state().await.phase, WorkerPhase::Redundant);

    // v1 keeps serving offline and no empty v2 generation is left behind
    assert_eq!(storage.read().await.keys(), vec!["todo-app-v1.0"]);
    assert_eq!(storage.read().await.get("todo-app-v1.0").unwrap().len(), 5);
    fetcher.set_online(false);
    let manifest = WorkerConfig::default().resolve("/todo-list-pwa/manifest.json").unwrap();
    let result = v1.handle_fetch(&FetchRequest::get(manifest)).await;
    assert!(matches!(
        result.response,
        FetchResponse::Respond { source: ResponseSource::Cache, .. }
    ));
}

#[tokio::test]
async fn test_activate_twice_keeps_single_generation() {
    let storage = CacheStorage::shared(100);
    let worker = ServiceWorker::new(WorkerConfig::default(), storage.clone(), upstream());
    worker.register().await.unwrap();

    let second = worker.activate().await.unwrap();
    assert!(second.deleted.is_empty());
    assert_eq!(storage.read().await.keys(), vec!["todo-app-v2.0"]);
}

#[tokio::test]
async fn test_generations_carry_across_deployments() {
    let dir = tempfile::TempDir::new().unwrap();
    let fetcher = upstream();

    // First deployment ships v1 and caches the manifest
    {
        let storage = CacheStorage::persistent(dir.path(), 100).unwrap().into_shared();
        let v1 = ServiceWorker::new(
            WorkerConfig::default().with_cache_name("todo-app-v1.0"),
            storage,
            fetcher.clone(),
        );
        v1.register().await.unwrap();
    }

    // Second deployment ships v2 and purges the generation v1 left on disk
    let storage = CacheStorage::persistent(dir.path(), 100).unwrap().into_shared();
    assert_eq!(storage.read().await.keys(), vec!["todo-app-v1.0"]);
    let (app, _) = create_test_app(fetcher.clone(), storage.clone());
    let json = register(&app).await;
    assert_eq!(json["deleted"][0], "todo-app-v1.0");

    let reopened = CacheStorage::persistent(dir.path(), 100).unwrap();
    assert_eq!(reopened.keys(), vec!["todo-app-v2.0"]);
}

#[tokio::test]
async fn test_restart_with_upstream_down_serves_stored_generation() {
    let dir = tempfile::TempDir::new().unwrap();
    let fetcher = upstream();
    {
        let storage = CacheStorage::persistent(dir.path(), 100).unwrap().into_shared();
        ServiceWorker::new(WorkerConfig::default(), storage, fetcher.clone())
            .register()
            .await
            .unwrap();
    }

    // Same version restarts while the app server is unreachable
    fetcher.set_online(false);
    let storage = CacheStorage::persistent(dir.path(), 100).unwrap().into_shared();
    let (app, state) = create_test_app(fetcher.clone(), storage);
    state.worker.resume().await.unwrap().unwrap();

    let response = send(&app, get("/todo-list-pwa/manifest.json")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-offline-cache"], "cache");
    assert_eq!(response.headers()["content-type"], "text/plain");
    assert_eq!(
        body_to_string(response.into_body()).await,
        "body of /todo-list-pwa/manifest.json"
    );
}
