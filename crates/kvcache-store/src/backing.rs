//! Backing store trait
//!
//! The slower, persistent side of the cache. Implementations must be safe to
//! share between concurrent requests; the coordinator never holds its own
//! lock while awaiting one of these calls.

use crate::error::StoreResult;
use async_trait::async_trait;
use derive_more::Display;
use kvcache_common::Key;

/// Operations a backing store exposes, for logging and fault injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum StoreOp {
    #[display("exists")]
    Exists,
    #[display("insert")]
    Insert,
    #[display("update")]
    Update,
    #[display("read")]
    Read,
    #[display("delete")]
    Delete,
}

/// Persistent key-value store behind the cache
#[async_trait]
pub trait BackingStore: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Check whether `key` is stored
    async fn exists(&self, key: Key) -> StoreResult<bool>;

    /// Store a new key; fails with `AlreadyExists` if it is present
    async fn insert(&self, key: Key, value: &str) -> StoreResult<()>;

    /// Replace the value of an existing key; fails with `NotFound` if absent
    async fn update(&self, key: Key, value: &str) -> StoreResult<()>;

    /// Read the value of `key`; fails with `NotFound` if absent
    async fn read(&self, key: Key) -> StoreResult<String>;

    /// Remove `key`; fails with `NotFound` if absent
    async fn delete(&self, key: Key) -> StoreResult<()>;
}
