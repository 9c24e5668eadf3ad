//! KVCache HTTP server
//!
//! Serves the `/kvstore` key-value resource over a cache coordinator, plus
//! `/metrics` and `/health`.

pub mod handlers;
pub mod metrics;
pub mod response;

use axum::Router;
use axum::routing::get;
use kvcache_cache::ConsistencyCoordinator;
use kvcache_common::config::{StoreBackend, StoreConfig};
use kvcache_store::{BackingStore, MemoryStore, RedbStore, StoreResult};
use metrics::ServerMetrics;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared state for all handlers
pub struct AppState {
    pub coordinator: Arc<ConsistencyCoordinator>,
    pub metrics: ServerMetrics,
    pub store_name: &'static str,
}

impl AppState {
    pub fn new(coordinator: Arc<ConsistencyCoordinator>, store_name: &'static str) -> Self {
        Self {
            coordinator,
            metrics: ServerMetrics::new(),
            store_name,
        }
    }
}

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/metrics", get(handlers::metrics))
        .route("/health", get(handlers::health_check))
        .route(
            "/kvstore",
            get(handlers::read)
                .post(handlers::create)
                .put(handlers::update)
                .delete(handlers::delete),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Open the configured backing store
pub fn open_store(config: &StoreConfig) -> StoreResult<Arc<dyn BackingStore>> {
    match config.backend {
        StoreBackend::Redb => Ok(Arc::new(RedbStore::open(&config.path)?)),
        StoreBackend::Memory => {
            warn!("Using in-memory backing store; data is lost on exit");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Write back every dirty entry before exit and log the outcome
pub async fn flush_on_shutdown(coordinator: &ConsistencyCoordinator) {
    match coordinator.flush().await {
        Ok(count) => info!("Shutdown flush wrote {} dirty entries", count),
        Err(e) => {
            let failures = coordinator.take_flush_failures();
            tracing::error!(
                "Shutdown flush incomplete: {} ({} values not persisted)",
                e,
                failures.len()
            );
            for f in failures {
                tracing::error!("Unpersisted key {}: {}", f.key, f.error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request, StatusCode};
    use kvcache_common::CacheMode;
    use kvcache_store::{StoreError, StoreOp};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn app(capacity: usize, mode: CacheMode, store: &Arc<MemoryStore>) -> (Router, Arc<AppState>) {
        let coordinator =
            Arc::new(ConsistencyCoordinator::new(capacity, mode, store.clone()).unwrap());
        let state = Arc::new(AppState::new(coordinator, "memory"));
        (router(state.clone()), state)
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(v) => builder
                .header("content-type", "application/json")
                .body(Body::from(v.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    #[tokio::test]
    async fn test_crud_round() {
        let store = Arc::new(MemoryStore::new());
        let (app, _) = app(4, CacheMode::WriteThrough, &store);

        let (status, body) =
            send(&app, Method::POST, "/kvstore", Some(json!({"Key": 1, "Value": "one"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["Status"], 0);
        assert_eq!(body["Error"], "No error");
        assert_eq!(body["Data"], "Inserted key: 1");
        assert_eq!(store.get(1).as_deref(), Some("one"));

        let (status, body) = send(&app, Method::GET, "/kvstore?key=1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["Data"], json!({"Key": 1, "Value": "one"}));

        let (status, _) =
            send(&app, Method::PUT, "/kvstore", Some(json!({"Key": 1, "Value": "uno"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(store.get(1).as_deref(), Some("uno"));

        let (status, body) = send(&app, Method::DELETE, "/kvstore?key=1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["Data"], "Deleted key: 1");

        let (status, body) = send(&app, Method::GET, "/kvstore?key=1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["Status"], 8);
        assert_eq!(body["Error"], "Key not found");
        assert_eq!(body["Data"], "key not found: 1");
    }

    #[tokio::test]
    async fn test_duplicate_create_conflict() {
        let store = Arc::new(MemoryStore::with_entries([(5, "five")]));
        let (app, _) = app(4, CacheMode::WriteBack, &store);

        let (status, body) =
            send(&app, Method::POST, "/kvstore", Some(json!({"Key": 5, "Value": "x"}))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["Status"], 9);
        assert_eq!(body["Error"], "Key already present");
    }

    #[tokio::test]
    async fn test_invalid_input() {
        let store = Arc::new(MemoryStore::new());
        let (app, _) = app(4, CacheMode::WriteThrough, &store);

        let (status, body) = send(&app, Method::GET, "/kvstore?key=abc", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["Status"], 7);
        assert_eq!(body["Error"], "Invalid key");

        let (status, body) = send(&app, Method::DELETE, "/kvstore", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["Status"], 7);

        let (status, body) =
            send(&app, Method::POST, "/kvstore", Some(json!({"Key": "one"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["Status"], 3);
        assert_eq!(body["Error"], "Invalid JSON");
        assert_eq!(store.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_malformed_query_uses_envelope() {
        let store = Arc::new(MemoryStore::with_entries([(1, "a")]));
        let (app, state) = app(4, CacheMode::WriteThrough, &store);

        for uri in ["/kvstore?key=1&key=2", "/kvstore?key=%ZZ"] {
            for method in [Method::GET, Method::DELETE] {
                let (status, body) = send(&app, method, uri, None).await;
                assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
                assert_eq!(body["Status"], 7, "{uri}");
                assert_eq!(body["Error"], "Invalid key");
                assert!(body["Data"].is_string());
            }
        }
        assert_eq!(store.total_calls(), 0);
        assert_eq!(state.metrics.requests_failed(metrics::KvOperation::Read), 2);
        assert_eq!(store.get(1).as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_store_unavailable_status() {
        let store = Arc::new(MemoryStore::new());
        let (app, _) = app(4, CacheMode::WriteThrough, &store);
        store.set_offline(true);

        let (status, body) = send(&app, Method::GET, "/kvstore?key=1", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["Status"], 1);
    }

    #[tokio::test]
    async fn test_deferred_flush_failure_in_separate_field() {
        let store = Arc::new(MemoryStore::new());
        let (app, state) = app(1, CacheMode::WriteBack, &store);

        send(&app, Method::POST, "/kvstore", Some(json!({"Key": 1, "Value": "x"}))).await;
        store.inject_fault(StoreOp::Insert, Some(1), StoreError::rejected("disk full"));

        let (status, body) =
            send(&app, Method::POST, "/kvstore", Some(json!({"Key": 2, "Value": "y"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["Status"], 0);
        assert_eq!(body["Data"], "Inserted key: 2");
        assert_eq!(body["DeferredFlushFailures"][0]["Key"], 1);
        assert_eq!(body["DeferredFlushFailures"][0]["Value"], "x");

        // Reported once
        let (_, body) = send(&app, Method::GET, "/kvstore?key=2", None).await;
        assert!(body.get("DeferredFlushFailures").is_none());
        assert_eq!(state.coordinator.pending_flush_failures(), 0);
    }

    #[tokio::test]
    async fn test_metrics_and_health() {
        let store = Arc::new(MemoryStore::new());
        let (app, _) = app(4, CacheMode::WriteBack, &store);
        send(&app, Method::POST, "/kvstore", Some(json!({"Key": 1, "Value": "a"}))).await;
        send(&app, Method::GET, "/kvstore?key=1", None).await;

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("kvcache_cache_hits_total 1"));
        assert!(text.contains("kvcache_cache_dirty_entries 1"));
        assert!(text.contains("kvcache_requests_total{operation=\"create\"} 1"));

        let (status, body) = send(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["mode"], "write-back");
    }

    #[tokio::test]
    async fn test_flush_on_shutdown_persists_dirty_entries() {
        let store = Arc::new(MemoryStore::new());
        let (app, state) = app(4, CacheMode::WriteBack, &store);
        send(&app, Method::POST, "/kvstore", Some(json!({"Key": 7, "Value": "seven"}))).await;
        assert!(store.is_empty());

        flush_on_shutdown(&state.coordinator).await;
        assert_eq!(store.get(7).as_deref(), Some("seven"));
    }

    #[tokio::test]
    async fn test_open_redb_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            backend: StoreBackend::Redb,
            path: dir.path().join("kv.redb"),
        };
        let store = open_store(&config).unwrap();
        assert_eq!(store.name(), "redb");
        store.insert(1, "a").await.unwrap();
        assert_eq!(store.read(1).await.unwrap(), "a");
    }
}
