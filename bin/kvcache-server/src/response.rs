//! JSON response envelope for the key-value API
//!
//! Every response, success or failure, has the same shape:
//!
//! ```json
//! {"Status": 0, "Error": "No error", "Data": ...}
//! ```
//!
//! `Status` is a numeric [`StatusCode`] and `Error` its fixed description.
//! On failure `Data` carries the specific message (which key, what the
//! store said).
//!
//! Deferred flush failures drained while handling the request are reported
//! in their own `DeferredFlushFailures` field so they are never confused
//! with the outcome of the request itself.

use axum::Json;
use axum::response::{IntoResponse, Response};
use kvcache_cache::FlushFailure;
use kvcache_common::{CacheStoreError, Key};
use serde::{Serialize, Serializer};

/// Numeric outcome code carried in the `Status` field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i64)]
pub enum StatusCode {
    Unknown = -1,
    Success = 0,
    DbConnectionError = 1,
    StatementPreparationError = 2,
    InvalidJsonError = 3,
    JsonParseError = 4,
    StatementExecutionError = 5,
    DbResponseError = 6,
    InvalidKeyError = 7,
    KeyNotFoundError = 8,
    KeyDuplicationError = 9,
    InsertError = 10,
    DeleteError = 11,
}

impl StatusCode {
    pub const fn code(self) -> i64 {
        self as i64
    }

    /// Fixed text for the `Error` field
    pub const fn description(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown error",
            Self::Success => "No error",
            Self::DbConnectionError => "Database connection failed. Request Aborted",
            Self::StatementPreparationError => "unable to prepare statement for DB query",
            Self::InvalidJsonError => "Invalid JSON",
            Self::JsonParseError => "Unable to parse server response to JSON",
            Self::StatementExecutionError => "unable to execute database query",
            Self::DbResponseError => "unable to get DB response for query execution",
            Self::InvalidKeyError => "Invalid key",
            Self::KeyNotFoundError => "Key not found",
            Self::KeyDuplicationError => "Key already present",
            Self::InsertError => "unable to add given key in DB",
            Self::DeleteError => "unable to delete given key from DB",
        }
    }
}

impl From<&CacheStoreError> for StatusCode {
    fn from(error: &CacheStoreError) -> Self {
        match error {
            CacheStoreError::NotFound(_) => Self::KeyNotFoundError,
            CacheStoreError::DuplicateKey(_) => Self::KeyDuplicationError,
            CacheStoreError::StoreUnavailable(_) => Self::DbConnectionError,
            CacheStoreError::StoreWriteFailed(_) => Self::StatementExecutionError,
            CacheStoreError::InvalidInput(_) => Self::InvalidJsonError,
            CacheStoreError::FlushFailed { .. } => Self::InsertError,
        }
    }
}

impl Serialize for StatusCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.code())
    }
}

/// Record of one write-back that did not reach the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct FlushFailureReport {
    pub key: Key,
    pub value: String,
    pub error: String,
}

impl From<FlushFailure> for FlushFailureReport {
    fn from(f: FlushFailure) -> Self {
        Self {
            key: f.key,
            value: f.value,
            error: f.error.to_string(),
        }
    }
}

/// Response body for `/kvstore`
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct KvResponse {
    pub status: StatusCode,
    pub error: &'static str,
    pub data: serde_json::Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub deferred_flush_failures: Vec<FlushFailureReport>,
}

impl KvResponse {
    pub fn ok(data: impl Into<serde_json::Value>) -> Self {
        Self::with_status(StatusCode::Success, data)
    }

    pub fn with_status(status: StatusCode, data: impl Into<serde_json::Value>) -> Self {
        Self {
            status,
            error: status.description(),
            data: data.into(),
            deferred_flush_failures: Vec::new(),
        }
    }

    pub fn with_flush_failures(mut self, failures: Vec<FlushFailure>) -> Self {
        self.deferred_flush_failures = failures.into_iter().map(Into::into).collect();
        self
    }
}

/// Error side of a handler; rendered with the status the error kind maps to
#[derive(Debug)]
pub struct ApiError {
    pub error: CacheStoreError,
    pub status: StatusCode,
    pub deferred_flush_failures: Vec<FlushFailure>,
}

impl ApiError {
    /// Malformed request body
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        CacheStoreError::invalid_input(msg).into()
    }

    /// Missing, malformed or non-integer key
    pub fn invalid_key(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::InvalidKeyError,
            ..Self::from(CacheStoreError::invalid_input(msg))
        }
    }
}

impl From<CacheStoreError> for ApiError {
    fn from(error: CacheStoreError) -> Self {
        Self {
            status: StatusCode::from(&error),
            error,
            deferred_flush_failures: Vec::new(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let http = axum::http::StatusCode::from_u16(self.error.http_status_code())
            .unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        let body = KvResponse::with_status(self.status, self.error.to_string())
            .with_flush_failures(self.deferred_flush_failures);
        (http, Json(body)).into_response()
    }
}

impl IntoResponse for KvResponse {
    fn into_response(self) -> Response {
        (axum::http::StatusCode::OK, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvcache_store::StoreError;

    #[test]
    fn test_envelope_field_names() {
        let body = serde_json::to_value(KvResponse::ok("Inserted key: 1")).unwrap();
        assert_eq!(body["Status"], 0);
        assert_eq!(body["Error"], "No error");
        assert_eq!(body["Data"], "Inserted key: 1");
        assert!(body.get("DeferredFlushFailures").is_none());
    }

    #[test]
    fn test_flush_failures_reported_separately() {
        let resp = KvResponse::ok("Updated key: 2").with_flush_failures(vec![FlushFailure {
            key: 1,
            value: "x".into(),
            error: StoreError::rejected("disk full"),
        }]);
        let body = serde_json::to_value(resp).unwrap();
        assert_eq!(body["Status"], 0);
        assert_eq!(body["DeferredFlushFailures"][0]["Key"], 1);
        assert_eq!(body["DeferredFlushFailures"][0]["Value"], "x");
    }

    #[test]
    fn test_error_status_codes() {
        let resp = ApiError::from(CacheStoreError::NotFound(3)).into_response();
        assert_eq!(resp.status(), axum::http::StatusCode::NOT_FOUND);

        let resp = ApiError::invalid_input("bad body").into_response();
        assert_eq!(resp.status(), axum::http::StatusCode::BAD_REQUEST);

        let resp = ApiError::from(CacheStoreError::unavailable("down")).into_response();
        assert_eq!(resp.status(), axum::http::StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_numeric_status_and_fixed_description() {
        let cases = [
            (CacheStoreError::NotFound(3), 8, "Key not found"),
            (CacheStoreError::DuplicateKey(3), 9, "Key already present"),
            (
                CacheStoreError::unavailable("down"),
                1,
                "Database connection failed. Request Aborted",
            ),
            (CacheStoreError::invalid_input("bad body"), 3, "Invalid JSON"),
        ];
        for (error, code, description) in cases {
            let detail = error.to_string();
            let body = serde_json::to_value(KvResponse::with_status(
                StatusCode::from(&error),
                detail.clone(),
            ))
            .unwrap();
            assert_eq!(body["Status"], code);
            assert_eq!(body["Error"], description);
            assert_eq!(body["Data"], detail);
        }

        let err = ApiError::invalid_key("key must be an integer");
        assert_eq!(err.status, StatusCode::InvalidKeyError);
        assert_eq!(err.status.code(), 7);
        assert_eq!(StatusCode::Unknown.code(), -1);
    }
}
