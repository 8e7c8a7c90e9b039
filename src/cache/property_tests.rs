//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check storage, routing and versioning invariants.

use std::sync::Arc;

use axum::http::Method;
use proptest::prelude::*;
use url::Url;

use crate::cache::{CacheStorage, RequestKey};
use crate::config::WorkerConfig;
use crate::models::{FetchRequest, ResponseRecord};
use crate::network::ScriptedFetcher;
use crate::worker::{
    decide_cache_action, route_request, CacheAction, LifecycleEvent, LifecycleManager,
    RequestRoute,
};

// == Strategies ==
fn path_strategy() -> impl Strategy<Value = String> {
    "(/[a-z0-9_-]{1,12}){1,4}(\\.[a-z]{2,4})?".prop_map(|s| s)
}

fn body_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..512)
}

fn generation_name_strategy() -> impl Strategy<Value = String> {
    "todo-app-v[0-9]\\.[0-9]".prop_map(|s| s)
}

fn non_get_method_strategy() -> impl Strategy<Value = Method> {
    prop_oneof![
        Just(Method::POST),
        Just(Method::PUT),
        Just(Method::DELETE),
        Just(Method::PATCH),
        Just(Method::HEAD),
        Just(Method::OPTIONS),
    ]
}

fn app_url(path: &str) -> Url {
    WorkerConfig::default().resolve(path).unwrap()
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Any stored body is returned byte-identical.
    #[test]
    fn prop_roundtrip_storage(path in path_strategy(), body in body_strategy()) {
        let mut storage = CacheStorage::new(10);
        let key = RequestKey::for_url(&app_url(&path));
        let response = ResponseRecord::ok(body.clone());

        storage.put("v1", key.clone(), response.clone()).unwrap();

        let retrieved = storage.match_in("v1", &key).unwrap();
        prop_assert_eq!(retrieved.body.as_ref(), body.as_slice());
        prop_assert_eq!(retrieved, response);
    }

    // A generation never holds more keys than its capacity.
    #[test]
    fn prop_capacity_never_exceeded(
        paths in prop::collection::vec(path_strategy(), 1..40),
        capacity in 1usize..10,
    ) {
        let mut storage = CacheStorage::new(capacity);
        for path in paths {
            let _ = storage.put("v1", RequestKey::for_url(&app_url(&path)), ResponseRecord::ok("x"));
        }
        prop_assert!(storage.get("v1").unwrap().len() <= capacity);
    }

    // Non-GET requests are never intercepted.
    #[test]
    fn prop_non_get_is_passthrough(path in path_strategy(), method in non_get_method_strategy()) {
        let request = FetchRequest::get(app_url(&path)).with_method(method);
        prop_assert_eq!(route_request(&request, &WorkerConfig::default()), RequestRoute::Passthrough);
    }

    // Extension-scheme requests are never intercepted.
    #[test]
    fn prop_extension_scheme_is_passthrough(id in "[a-p]{32}", path in path_strategy()) {
        let url = Url::parse(&format!("chrome-extension://{}{}", id, path)).unwrap();
        let request = FetchRequest::get(url);
        prop_assert_eq!(route_request(&request, &WorkerConfig::default()), RequestRoute::Passthrough);
    }

    // The purge list is exactly the set of non-current names.
    #[test]
    fn prop_purge_spares_only_current(
        existing in prop::collection::vec(generation_name_strategy(), 0..8),
        current in generation_name_strategy(),
    ) {
        let config = WorkerConfig::default().with_cache_name(current.clone());
        let action = decide_cache_action(LifecycleEvent::Activate { existing: existing.clone() }, &config);

        let CacheAction::Purge { stale, claim_clients } = action else {
            panic!("activate must purge");
        };
        prop_assert!(claim_clients);
        prop_assert!(!stale.contains(&current));
        prop_assert_eq!(stale.len(), existing.iter().filter(|n| **n != current).count());
    }

    // After activate, exactly one generation is left, whatever existed before.
    #[test]
    fn prop_activate_leaves_one_generation(
        existing in prop::collection::vec(generation_name_strategy(), 0..6),
        current in generation_name_strategy(),
    ) {
        let storage = CacheStorage::shared(10);
        let config = Arc::new(WorkerConfig {
            assets: vec!["/todo-list-pwa/".to_string()],
            ..WorkerConfig::default().with_cache_name(current.clone())
        });
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.respond(app_url("/todo-list-pwa/").as_str(), ResponseRecord::ok("root"));

        let keys = block_on(async {
            {
                let mut guard = storage.write().await;
                for name in &existing {
                    guard.open(name).unwrap();
                }
            }
            let lifecycle = LifecycleManager::new(config, storage.clone(), fetcher);
            lifecycle.on_install().await.unwrap();
            lifecycle.on_activate().await.unwrap();
            lifecycle.on_activate().await.unwrap();
            storage.read().await.keys()
        });

        prop_assert_eq!(keys, vec![current]);
    }
}
