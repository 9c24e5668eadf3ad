//! Backing store error types

use kvcache_common::{CacheStoreError, Key};
use thiserror::Error;

/// Backing store error
///
/// `NotFound` and `AlreadyExists` are answers about the data; the other two
/// variants are failures of the store itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Key does not exist in the store
    #[error("key not found in store: {0}")]
    NotFound(Key),

    /// Key already exists in the store
    #[error("key already exists in store: {0}")]
    AlreadyExists(Key),

    /// Connection, transaction or statement failure
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store refused or failed to apply a write
    #[error("store rejected write: {0}")]
    Rejected(String),
}

/// Result type for backing store operations
pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    /// Create an unavailable error
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create a rejected-write error
    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }
}

impl From<StoreError> for CacheStoreError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(key) => Self::NotFound(key),
            StoreError::AlreadyExists(key) => Self::DuplicateKey(key),
            StoreError::Unavailable(msg) => Self::StoreUnavailable(msg),
            StoreError::Rejected(msg) => Self::StoreWriteFailed(msg),
        }
    }
}

impl From<redb::DatabaseError> for StoreError {
    fn from(e: redb::DatabaseError) -> Self {
        Self::Unavailable(format!("redb database error: {e}"))
    }
}

impl From<redb::TransactionError> for StoreError {
    fn from(e: redb::TransactionError) -> Self {
        Self::Unavailable(format!("redb transaction error: {e}"))
    }
}

impl From<redb::TableError> for StoreError {
    fn from(e: redb::TableError) -> Self {
        Self::Unavailable(format!("redb table error: {e}"))
    }
}

impl From<redb::StorageError> for StoreError {
    fn from(e: redb::StorageError) -> Self {
        Self::Unavailable(format!("redb storage error: {e}"))
    }
}

impl From<redb::CommitError> for StoreError {
    fn from(e: redb::CommitError) -> Self {
        Self::Rejected(format!("redb commit error: {e}"))
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        Self::Unavailable(format!("io error: {e}"))
    }
}
