//! Consistency coordinator
//!
//! Puts an [`LruCache`] in front of a [`BackingStore`] and applies the
//! configured [`CacheMode`]:
//!
//! - **Write-through**: the store is written first; the cache only changes
//!   once the store has accepted the write, so a failed store write leaves
//!   the cache untouched.
//! - **Write-back**: writes land in the cache marked dirty. A dirty entry
//!   reaches the store when it is evicted (or on an explicit [`flush`]).
//!   An eviction flush that fails loses the value from the cache; it is
//!   logged and recorded in the flush-failure journal, never folded into the
//!   result of the unrelated call that triggered the eviction.
//!
//! # Locking
//!
//! Two locks with different jobs:
//!
//! - `cache`: a `parking_lot::Mutex` around the LRU structure. Every access
//!   (including promoting reads) takes it, and it is never held across an
//!   `.await`, so no store I/O happens under it.
//! - `write_gate`: an async `RwLock` over the store-touching paths.
//!   Mutations, cache population and flushes hold it exclusively, so the
//!   store write and the matching cache update of one operation never
//!   interleave with another's. Read misses hold it shared while reading
//!   the store, so they run in parallel with each other. Cache hits never
//!   touch it.
//!
//! # Cancellation
//!
//! Once a dirty entry has been evicted, the cache no longer holds it. Its
//! write-back therefore runs on a spawned task that owns both the entry
//! and the exclusive gate guard. Dropping the caller's future (a request
//! deadline, a disconnected client) does not abort it: the write still
//! completes or lands in the journal, and no other store operation runs
//! until it has.
//!
//! [`flush`]: ConsistencyCoordinator::flush

use crate::lru::LruCache;
use crate::recency::Entry;
use crate::stats::{CacheStats, StatsSnapshot};
use kvcache_common::{CacheMode, CacheStoreError, Key, Result};
use kvcache_store::{BackingStore, StoreError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};
use tracing::{debug, error, info, warn};

/// Maximum number of unacknowledged flush failures kept for callers
pub const FLUSH_FAILURE_JOURNAL_LIMIT: usize = 1024;

type Journal = Mutex<VecDeque<FlushFailure>>;
type WriteGuard = OwnedRwLockWriteGuard<()>;

/// A dirty value that could not be written back
///
/// The backing store is behind by exactly this write. If the failure came
/// from an eviction the value is no longer cached either; after a failed
/// explicit flush the entry stays cached and dirty. No retry is attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushFailure {
    pub key: Key,
    pub value: String,
    pub error: StoreError,
}

/// Cache plus backing store under one consistency mode
pub struct ConsistencyCoordinator {
    cache: Mutex<LruCache>,
    store: Arc<dyn BackingStore>,
    mode: CacheMode,
    write_gate: Arc<RwLock<()>>,
    /// Bumped by every mutation, under the exclusive gate
    generation: AtomicU64,
    stats: Arc<CacheStats>,
    flush_failures: Arc<Journal>,
}

impl ConsistencyCoordinator {
    /// Create a coordinator with an empty cache of `capacity` entries
    ///
    /// # Errors
    /// Returns `InvalidInput` if `capacity` is zero.
    pub fn new(capacity: usize, mode: CacheMode, store: Arc<dyn BackingStore>) -> Result<Self> {
        let capacity = NonZeroUsize::new(capacity).ok_or_else(|| {
            CacheStoreError::invalid_input("cache capacity must be a positive integer")
        })?;

        info!(
            "Cache initialized: capacity={}, mode={}, store={}",
            capacity,
            mode,
            store.name()
        );

        Ok(Self {
            cache: Mutex::new(LruCache::new(capacity)),
            store,
            mode,
            write_gate: Arc::new(RwLock::new(())),
            generation: AtomicU64::new(0),
            stats: Arc::new(CacheStats::default()),
            flush_failures: Arc::new(Mutex::new(VecDeque::new())),
        })
    }

    pub fn mode(&self) -> CacheMode {
        self.mode
    }

    pub fn capacity(&self) -> usize {
        self.cache.lock().capacity()
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }

    /// Cache-only membership check; no promotion, no store call
    pub fn contains(&self, key: Key) -> bool {
        self.cache.lock().contains(key)
    }

    /// Cached entry for `key` without promotion
    pub fn peek(&self, key: Key) -> Option<Entry> {
        self.cache.lock().peek(key).cloned()
    }

    /// Copy of the cached entries, most recently used first
    pub fn entries(&self) -> Vec<Entry> {
        self.cache.lock().iter().cloned().collect()
    }

    /// Counters plus current occupancy
    pub fn stats(&self) -> StatsSnapshot {
        let (entries, dirty, capacity) = {
            let cache = self.cache.lock();
            (cache.len(), cache.dirty_count(), cache.capacity())
        };
        StatsSnapshot::capture(&self.stats, entries, dirty, capacity)
    }

    /// Zero the counters; cached entries are not affected
    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    /// Create `key`; rejected if it exists in the cache or the store
    ///
    /// # Errors
    /// `DuplicateKey` if the key exists anywhere, or the store error that
    /// prevented the write (write-through) or the existence check.
    pub async fn create(&self, key: Key, value: impl Into<String>) -> Result<()> {
        let value = value.into();
        let gate = self.lock_exclusive().await;

        if self.contains(key) {
            return Err(CacheStoreError::DuplicateKey(key));
        }
        if self.store.exists(key).await? {
            return Err(CacheStoreError::DuplicateKey(key));
        }

        let evicted = match self.mode {
            CacheMode::WriteThrough => {
                self.store.insert(key, &value).await?;
                self.cache.lock().put(key, value, false)
            }
            CacheMode::WriteBack => self.cache.lock().put(key, value, true),
        };
        self.generation.fetch_add(1, Ordering::Relaxed);
        debug!("Created key {}", key);

        self.settle_eviction(evicted, gate).await;
        Ok(())
    }

    /// Read `key`, filling the cache from the store on a miss
    ///
    /// # Errors
    /// `NotFound` if the store has no such key; store failures are reported
    /// as such, never as `NotFound`.
    pub async fn read(&self, key: Key) -> Result<String> {
        if let Some(value) = self.cached_value(key) {
            self.stats.record_hit();
            debug!("Cache hit for key {}", key);
            return Ok(value);
        }
        self.stats.record_miss();
        debug!("Cache miss for key {}", key);

        let (value, seen) = {
            let _shared = self.write_gate.read().await;
            // A writer may have cached the key while we waited for the gate
            if let Some(value) = self.cached_value(key) {
                return Ok(value);
            }
            let seen = self.generation.load(Ordering::Relaxed);
            (self.store.read(key).await?, seen)
        };

        let gate = self.lock_exclusive().await;
        if self.generation.load(Ordering::Relaxed) != seen {
            // A mutation ran between our store read and now; whatever it
            // left in the cache is newer than what we read
            return Ok(self.cached_value(key).unwrap_or(value));
        }
        let evicted = self.cache.lock().put(key, value.clone(), false);
        self.settle_eviction(evicted, gate).await;
        Ok(value)
    }

    /// Replace the value of an existing `key`
    ///
    /// # Errors
    /// `NotFound` if the key is neither cached nor stored, or the store
    /// error that prevented the write.
    pub async fn update(&self, key: Key, value: impl Into<String>) -> Result<()> {
        let value = value.into();
        let gate = self.lock_exclusive().await;

        let evicted = match self.mode {
            CacheMode::WriteThrough => {
                self.store.update(key, &value).await?;
                self.cache.lock().put(key, value, false)
            }
            CacheMode::WriteBack => {
                if !self.contains(key) && !self.store.exists(key).await? {
                    return Err(CacheStoreError::NotFound(key));
                }
                self.cache.lock().put(key, value, true)
            }
        };
        self.generation.fetch_add(1, Ordering::Relaxed);
        debug!("Updated key {}", key);

        self.settle_eviction(evicted, gate).await;
        Ok(())
    }

    /// Delete `key` from both the cache and the store
    ///
    /// Succeeds if the key was present in either; a key cached but not yet
    /// flushed is a legitimate hit.
    ///
    /// # Errors
    /// `NotFound` only if the key was in neither; otherwise the store error
    /// from the delete. The cache entry is gone in both cases.
    pub async fn delete(&self, key: Key) -> Result<()> {
        let _gate = self.lock_exclusive().await;

        let in_cache = self.cache.lock().delete(key);
        self.generation.fetch_add(1, Ordering::Relaxed);
        let in_store = match self.store.delete(key).await {
            Ok(()) => true,
            Err(StoreError::NotFound(_)) => false,
            Err(e) => {
                warn!("Store delete of key {} failed after cache removal: {}", key, e);
                return Err(e.into());
            }
        };

        if !in_cache && !in_store {
            return Err(CacheStoreError::NotFound(key));
        }
        debug!(
            "Deleted key {} (cached: {}, stored: {})",
            key, in_cache, in_store
        );
        Ok(())
    }

    /// Write every dirty entry back to the store
    ///
    /// Entries stay cached and become clean. Every dirty entry is attempted;
    /// entries whose write fails stay dirty and are journaled. Returns the
    /// number flushed. Waits for any in-flight eviction write-back first.
    ///
    /// # Errors
    /// `FlushFailed` for the first entry that could not be written.
    pub async fn flush(&self) -> Result<usize> {
        let _gate = self.lock_exclusive().await;

        let dirty = self.cache.lock().dirty_entries();
        if dirty.is_empty() {
            return Ok(0);
        }

        let mut flushed = 0;
        let mut first_failure = None;
        for (key, value) in dirty {
            let result = write_back(self.store.as_ref(), key, &value).await;
            match result {
                Ok(()) => {
                    self.stats.record_writeback();
                    if self.cache.lock().mark_clean(key, &value) {
                        flushed += 1;
                    }
                }
                Err(e) => {
                    self.stats.record_flush_failure();
                    error!("Flush of dirty key {} failed: {}", key, e);
                    first_failure.get_or_insert(CacheStoreError::FlushFailed {
                        key,
                        reason: e.to_string(),
                    });
                    record_flush_failure(
                        &self.flush_failures,
                        FlushFailure {
                            key,
                            value,
                            error: e,
                        },
                    );
                }
            }
        }

        info!("Flushed {} dirty entries to {}", flushed, self.store.name());
        match first_failure {
            Some(err) => Err(err),
            None => Ok(flushed),
        }
    }

    /// Drain the record of dirty values that could not be written back
    pub fn take_flush_failures(&self) -> Vec<FlushFailure> {
        self.flush_failures.lock().drain(..).collect()
    }

    /// Number of flush failures not yet taken
    pub fn pending_flush_failures(&self) -> usize {
        self.flush_failures.lock().len()
    }

    async fn lock_exclusive(&self) -> WriteGuard {
        Arc::clone(&self.write_gate).write_owned().await
    }

    fn cached_value(&self, key: Key) -> Option<String> {
        self.cache.lock().get(key).map(str::to_owned)
    }

    /// Deal with an entry pushed out of the cache by a put
    ///
    /// Must be called straight after the put, with no await in between, so
    /// a dirty entry is always handed to its write-back task.
    async fn settle_eviction(&self, evicted: Option<Entry>, gate: WriteGuard) {
        let Some(entry) = evicted else {
            return;
        };
        self.stats.record_eviction();

        if !entry.dirty {
            debug!("Evicted clean key {}", entry.key);
            return;
        }

        let key = entry.key;
        let task = EvictionWriteBack {
            store: Arc::clone(&self.store),
            stats: Arc::clone(&self.stats),
            journal: Arc::clone(&self.flush_failures),
        };
        if let Err(e) = tokio::spawn(task.run(entry, gate)).await {
            error!("Write-back task for evicted key {} died: {}", key, e);
        }
    }
}

/// Write-back of one evicted dirty entry, detached from the caller
struct EvictionWriteBack {
    store: Arc<dyn BackingStore>,
    stats: Arc<CacheStats>,
    journal: Arc<Journal>,
}

impl EvictionWriteBack {
    async fn run(self, entry: Entry, _gate: WriteGuard) {
        let result = write_back(self.store.as_ref(), entry.key, &entry.value).await;
        match result {
            Ok(()) => {
                self.stats.record_writeback();
                debug!("Evicted key {} flushed to {}", entry.key, self.store.name());
            }
            Err(e) => {
                self.stats.record_flush_failure();
                error!(
                    "Deferred flush failed for evicted key {}: {}; store is behind",
                    entry.key, e
                );
                record_flush_failure(
                    &self.journal,
                    FlushFailure {
                        key: entry.key,
                        value: entry.value,
                        error: e,
                    },
                );
            }
        }
    }
}

/// Persist a dirty value: insert if the store lacks the key, else update
async fn write_back(
    store: &dyn BackingStore,
    key: Key,
    value: &str,
) -> std::result::Result<(), StoreError> {
    if store.exists(key).await? {
        store.update(key, value).await
    } else {
        store.insert(key, value).await
    }
}

fn record_flush_failure(journal: &Journal, failure: FlushFailure) {
    let mut journal = journal.lock();
    if journal.len() >= FLUSH_FAILURE_JOURNAL_LIMIT
        && let Some(dropped) = journal.pop_front()
    {
        warn!(
            "Flush failure journal full; dropping record for key {}",
            dropped.key
        );
    }
    journal.push_back(failure);
}
