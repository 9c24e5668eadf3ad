//! KVCache cache layer
//!
//! A fixed-capacity LRU cache kept consistent with a backing store under
//! either write-through or write-back semantics.
//!
//! - [`RecencyList`]: arena-backed doubly linked list giving O(1) recency
//!   updates and LRU eviction
//! - [`LruCache`]: key index plus dirty tracking on top of the list
//! - [`ConsistencyCoordinator`]: the public entry point; routes every
//!   create/read/update/delete through the cache and the store

pub mod coordinator;
pub mod lru;
pub mod recency;
pub mod stats;

pub use coordinator::{ConsistencyCoordinator, FLUSH_FAILURE_JOURNAL_LIMIT, FlushFailure};
pub use lru::LruCache;
pub use recency::{Entry, NodeId, RecencyList};
pub use stats::{CacheStats, StatsSnapshot};
