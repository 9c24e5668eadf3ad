//! Axum handlers for the `/kvstore` resource.
//!
//! - `POST /kvstore` with `{"Key": int, "Value": string}`: create
//! - `GET /kvstore?key=N`: read
//! - `PUT /kvstore` with `{"Key": int, "Value": string}`: update
//! - `DELETE /kvstore?key=N`: delete
//!
//! Bodies and query strings are parsed by hand so malformed input is
//! reported in the regular response envelope rather than as a bare
//! extractor rejection.

use crate::AppState;
use crate::metrics::KvOperation;
use crate::response::{ApiError, KvResponse};
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use kvcache_common::{CacheStoreError, Key};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, warn};

type Result<T> = std::result::Result<T, ApiError>;

const REQUIRED_JSON_FORMAT: &str = r#"required JSON format: {"Key": int, "Value": string}"#;

/// Request body for create and update; also the data of a successful read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KvData {
    pub key: Key,
    pub value: String,
}

/// Query string of read and delete
#[derive(Debug, Deserialize)]
pub struct KeyParams {
    pub key: Option<String>,
}

fn parse_body(body: &Bytes) -> Result<KvData> {
    serde_json::from_slice(body)
        .map_err(|e| ApiError::invalid_input(format!("invalid JSON ({e}); {REQUIRED_JSON_FORMAT}")))
}

fn parse_key(uri: &Uri) -> Result<Key> {
    let Query(params) = Query::<KeyParams>::try_from_uri(uri)
        .map_err(|e| ApiError::invalid_key(format!("malformed query string: {}", e.body_text())))?;
    let raw = params
        .key
        .as_deref()
        .ok_or_else(|| ApiError::invalid_key("missing 'key' query parameter"))?;
    raw.trim()
        .parse()
        .map_err(|_| ApiError::invalid_key(format!("key must be an integer, got '{raw}'")))
}

/// Finish a request: record metrics and attach any drained flush failures
fn finish(
    state: &AppState,
    op: KvOperation,
    started: Instant,
    outcome: Result<KvResponse>,
) -> Response {
    let failures = state.coordinator.take_flush_failures();
    state.metrics.record_flush_failures_reported(failures.len());
    for f in &failures {
        warn!(
            "Reporting deferred flush failure for key {}: {}",
            f.key, f.error
        );
    }

    match outcome {
        Ok(resp) => {
            state.metrics.record(op, true, started);
            resp.with_flush_failures(failures).into_response()
        }
        Err(mut err) => {
            state.metrics.record(op, false, started);
            if !err.error.is_expected() && !matches!(err.error, CacheStoreError::InvalidInput(_)) {
                error!(
                    "{} request failed [{}]: {}",
                    op.as_str(),
                    err.error.code(),
                    err.error
                );
            }
            err.deferred_flush_failures.extend(failures);
            err.into_response()
        }
    }
}

async fn create_key(state: &AppState, body: &Bytes) -> Result<KvResponse> {
    let req = parse_body(body)?;
    state.coordinator.create(req.key, req.value).await?;
    Ok(KvResponse::ok(format!("Inserted key: {}", req.key)))
}

async fn read_key(state: &AppState, uri: &Uri) -> Result<KvResponse> {
    let key = parse_key(uri)?;
    let value = state.coordinator.read(key).await?;
    Ok(KvResponse::ok(serde_json::json!(KvData { key, value })))
}

async fn update_key(state: &AppState, body: &Bytes) -> Result<KvResponse> {
    let req = parse_body(body)?;
    state.coordinator.update(req.key, req.value).await?;
    Ok(KvResponse::ok(format!("Updated key: {}", req.key)))
}

async fn delete_key(state: &AppState, uri: &Uri) -> Result<KvResponse> {
    let key = parse_key(uri)?;
    state.coordinator.delete(key).await?;
    Ok(KvResponse::ok(format!("Deleted key: {key}")))
}

/// POST /kvstore
pub async fn create(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let started = Instant::now();
    let outcome = create_key(&state, &body).await;
    finish(&state, KvOperation::Create, started, outcome)
}

/// GET /kvstore?key=N
pub async fn read(State(state): State<Arc<AppState>>, uri: Uri) -> Response {
    let started = Instant::now();
    let outcome = read_key(&state, &uri).await;
    finish(&state, KvOperation::Read, started, outcome)
}

/// PUT /kvstore
pub async fn update(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let started = Instant::now();
    let outcome = update_key(&state, &body).await;
    finish(&state, KvOperation::Update, started, outcome)
}

/// DELETE /kvstore?key=N
pub async fn delete(State(state): State<Arc<AppState>>, uri: Uri) -> Response {
    let started = Instant::now();
    let outcome = delete_key(&state, &uri).await;
    finish(&state, KvOperation::Delete, started, outcome)
}

/// GET /metrics
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = state
        .metrics
        .export_prometheus(&state.coordinator.stats(), state.coordinator.mode());
    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        body,
    )
}

/// GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "healthy",
        "mode": state.coordinator.mode().to_string(),
        "store": state.store_name,
    }))
}
