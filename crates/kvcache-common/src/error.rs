//! Error types for KVCache
//!
//! This module defines the error taxonomy surfaced by the cache
//! coordinator to request-handling layers.

use crate::types::Key;
use thiserror::Error;

/// Common result type for KVCache operations
pub type Result<T> = std::result::Result<T, CacheStoreError>;

/// Error returned by cache-fronted key-value operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheStoreError {
    #[error("key not found: {0}")]
    NotFound(Key),

    #[error("key already present: {0}")]
    DuplicateKey(Key),

    /// Connection or statement failure; no local recovery is possible
    #[error("backing store unavailable: {0}")]
    StoreUnavailable(String),

    /// The store rejected a write for a reason other than unavailability
    #[error("backing store write failed: {0}")]
    StoreWriteFailed(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An explicit flush could not write a dirty entry back
    #[error("flush of key {key} failed: {reason}")]
    FlushFailed { key: Key, reason: String },
}

impl CacheStoreError {
    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a store unavailable error
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::StoreUnavailable(msg.into())
    }

    /// Create a store write failure
    pub fn write_failed(msg: impl Into<String>) -> Self {
        Self::StoreWriteFailed(msg.into())
    }

    /// Check if this is a normal, non-exceptional outcome
    ///
    /// Missing and duplicate keys are reported to callers as ordinary
    /// results rather than faults.
    #[must_use]
    pub const fn is_expected(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::DuplicateKey(_))
    }

    /// Check if this error originated in the backing store
    #[must_use]
    pub const fn is_store_failure(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable(_) | Self::StoreWriteFailed(_) | Self::FlushFailed { .. }
        )
    }

    /// Get HTTP status code for transport mapping
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::InvalidInput(_) => 400,
            Self::NotFound(_) => 404,
            Self::DuplicateKey(_) => 409,
            Self::StoreWriteFailed(_) | Self::FlushFailed { .. } => 500,
            Self::StoreUnavailable(_) => 503,
        }
    }

    /// Stable machine-readable code for response bodies
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "KeyNotFound",
            Self::DuplicateKey(_) => "DuplicateKey",
            Self::StoreUnavailable(_) => "StoreUnavailable",
            Self::StoreWriteFailed(_) => "StoreWriteFailed",
            Self::InvalidInput(_) => "InvalidInput",
            Self::FlushFailed { .. } => "FlushFailed",
        }
    }
}
