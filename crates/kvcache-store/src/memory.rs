//! In-memory backing store
//!
//! Keeps records in a `HashMap` behind a `RwLock`. Besides serving as a
//! development backend it can be switched offline (every call fails with
//! `Unavailable`, like a dropped database connection) and can be told to
//! fail or stall chosen operations, which is how the coordinator's failure
//! and cancellation paths are exercised.

use crate::backing::{BackingStore, StoreOp};
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use kvcache_common::Key;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

const OP_COUNT: usize = 5;

const fn op_slot(op: StoreOp) -> usize {
    match op {
        StoreOp::Exists => 0,
        StoreOp::Insert => 1,
        StoreOp::Update => 2,
        StoreOp::Read => 3,
        StoreOp::Delete => 4,
    }
}

/// Volatile backing store with outage and fault injection
#[derive(Default)]
pub struct MemoryStore {
    /// Stored records
    data: RwLock<HashMap<Key, String>>,
    /// When set, every operation fails as unavailable
    offline: AtomicBool,
    /// Injected failures keyed by operation and key (`None` matches any key)
    faults: Mutex<HashMap<(StoreOp, Option<Key>), StoreError>>,
    /// Injected latency, matched like `faults`
    delays: Mutex<HashMap<(StoreOp, Option<Key>), Duration>>,
    /// Calls received per operation, including failed ones
    calls: [AtomicU64; OP_COUNT],
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `entries`
    pub fn with_entries<I, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (Key, V)>,
        V: Into<String>,
    {
        let store = Self::new();
        {
            let mut data = store.data.write();
            for (key, value) in entries {
                data.insert(key, value.into());
            }
        }
        store
    }

    /// Simulate losing (or regaining) the connection to the store
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Make `op` fail with `error`, for one key or for every key
    pub fn inject_fault(&self, op: StoreOp, key: Option<Key>, error: StoreError) {
        self.faults.lock().insert((op, key), error);
    }

    /// Remove all injected faults
    pub fn clear_faults(&self) {
        self.faults.lock().clear();
    }

    /// Make `op` stall for `delay` before doing its work
    ///
    /// The delay applies after the fault check, so a stalled call that is
    /// dropped mid-sleep has not touched the data.
    pub fn inject_delay(&self, op: StoreOp, key: Option<Key>, delay: Duration) {
        self.delays.lock().insert((op, key), delay);
    }

    pub fn clear_delays(&self) {
        self.delays.lock().clear();
    }

    /// Number of times `op` has been called
    pub fn call_count(&self, op: StoreOp) -> u64 {
        self.calls[op_slot(op)].load(Ordering::Relaxed)
    }

    /// Number of calls across all operations
    pub fn total_calls(&self) -> u64 {
        self.calls.iter().map(|c| c.load(Ordering::Relaxed)).sum()
    }

    /// Read a record directly, bypassing faults and call counting
    pub fn get(&self, key: Key) -> Option<String> {
        self.data.read().get(&key).cloned()
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Check if the store holds no records
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Ordered copy of all records
    pub fn snapshot(&self) -> BTreeMap<Key, String> {
        self.data
            .read()
            .iter()
            .map(|(k, v)| (*k, v.clone()))
            .collect()
    }

    /// Record the call, fail it if scheduled, then apply any injected delay
    async fn check(&self, op: StoreOp, key: Key) -> StoreResult<()> {
        self.calls[op_slot(op)].fetch_add(1, Ordering::Relaxed);

        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("memory store is offline"));
        }

        {
            let faults = self.faults.lock();
            if let Some(err) = faults.get(&(op, Some(key))).or_else(|| faults.get(&(op, None))) {
                return Err(err.clone());
            }
        }

        let delay = {
            let delays = self.delays.lock();
            delays
                .get(&(op, Some(key)))
                .or_else(|| delays.get(&(op, None)))
                .copied()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }
}

#[async_trait]
impl BackingStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn exists(&self, key: Key) -> StoreResult<bool> {
        self.check(StoreOp::Exists, key).await?;
        Ok(self.data.read().contains_key(&key))
    }

    async fn insert(&self, key: Key, value: &str) -> StoreResult<()> {
        self.check(StoreOp::Insert, key).await?;
        let mut data = self.data.write();
        if data.contains_key(&key) {
            return Err(StoreError::AlreadyExists(key));
        }
        data.insert(key, value.to_string());
        Ok(())
    }

    async fn update(&self, key: Key, value: &str) -> StoreResult<()> {
        self.check(StoreOp::Update, key).await?;
        match self.data.write().get_mut(&key) {
            Some(slot) => {
                *slot = value.to_string();
                Ok(())
            }
            None => Err(StoreError::NotFound(key)),
        }
    }

    async fn read(&self, key: Key) -> StoreResult<String> {
        self.check(StoreOp::Read, key).await?;
        self.data
            .read()
            .get(&key)
            .cloned()
            .ok_or(StoreError::NotFound(key))
    }

    async fn delete(&self, key: Key) -> StoreResult<()> {
        self.check(StoreOp::Delete, key).await?;
        self.data
            .write()
            .remove(&key)
            .map(|_| ())
            .ok_or(StoreError::NotFound(key))
    }
}
