//! Bounded LRU cache
//!
//! Combines a [`RecencyList`] with a key index for O(1) get/put/evict. The
//! cache is a plain in-memory structure: it never fails and never talks to a
//! backing store. Entries pushed out on overflow are handed back to the
//! caller, which decides whether they need writing back.
//!
//! Not synchronized; the coordinator wraps it in a mutex.

use crate::recency::{Entry, NodeId, RecencyList};
use kvcache_common::Key;
use std::collections::HashMap;
use std::num::NonZeroUsize;

/// LRU cache with per-entry dirty tracking
#[derive(Debug)]
pub struct LruCache {
    list: RecencyList,
    index: HashMap<Key, NodeId>,
    capacity: NonZeroUsize,
    /// Number of entries with the dirty flag set
    dirty: usize,
}

impl LruCache {
    /// Create an empty cache holding at most `capacity` entries
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            list: RecencyList::with_capacity(capacity.get()),
            index: HashMap::with_capacity(capacity.get()),
            capacity,
            dirty: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Number of dirty entries
    pub fn dirty_count(&self) -> usize {
        self.dirty
    }

    /// Look up a value and promote it to most recently used
    pub fn get(&mut self, key: Key) -> Option<&str> {
        let id = *self.index.get(&key)?;
        self.list.touch(id);
        self.list.get(id).map(|e| e.value.as_str())
    }

    /// Look up an entry without changing recency
    pub fn peek(&self, key: Key) -> Option<&Entry> {
        self.index.get(&key).and_then(|id| self.list.get(*id))
    }

    /// Existence check without changing recency
    pub fn contains(&self, key: Key) -> bool {
        self.index.contains_key(&key)
    }

    /// Insert or update `key`, promoting it to most recently used
    ///
    /// An existing key is updated in place and its dirty flag set to
    /// `mark_dirty`; nothing is evicted. A new key inserted into a full cache
    /// first evicts the least recently used entry, which is returned.
    pub fn put(&mut self, key: Key, value: impl Into<String>, mark_dirty: bool) -> Option<Entry> {
        if let Some(&id) = self.index.get(&key) {
            if let Some(entry) = self.list.get_mut(id) {
                match (entry.dirty, mark_dirty) {
                    (false, true) => self.dirty += 1,
                    (true, false) => self.dirty -= 1,
                    _ => {}
                }
                entry.value = value.into();
                entry.dirty = mark_dirty;
            }
            self.list.touch(id);
            return None;
        }

        let evicted = if self.list.len() >= self.capacity.get() {
            self.evict()
        } else {
            None
        };

        let id = self.list.insert_front(Entry::new(key, value, mark_dirty));
        self.index.insert(key, id);
        if mark_dirty {
            self.dirty += 1;
        }
        evicted
    }

    /// Remove `key`, returning its entry if it was cached
    pub fn remove(&mut self, key: Key) -> Option<Entry> {
        let id = self.index.remove(&key)?;
        let entry = self.list.remove(id)?;
        if entry.dirty {
            self.dirty -= 1;
        }
        Some(entry)
    }

    /// Remove `key`; returns whether it was cached
    pub fn delete(&mut self, key: Key) -> bool {
        self.remove(key).is_some()
    }

    /// Copy of every dirty entry's key and value, most recent first
    pub fn dirty_entries(&self) -> Vec<(Key, String)> {
        self.list
            .iter()
            .filter(|e| e.dirty)
            .map(|e| (e.key, e.value.clone()))
            .collect()
    }

    /// Clear the dirty flag of `key` if its value is still `expected`
    ///
    /// Returns false if the key is gone, already clean, or was rewritten
    /// after the caller took its snapshot.
    pub fn mark_clean(&mut self, key: Key, expected: &str) -> bool {
        let Some(&id) = self.index.get(&key) else {
            return false;
        };
        match self.list.get_mut(id) {
            Some(entry) if entry.dirty && entry.value == expected => {
                entry.dirty = false;
                self.dirty -= 1;
                true
            }
            _ => false,
        }
    }

    /// Keys from most to least recently used
    pub fn keys(&self) -> Vec<Key> {
        self.list.iter().map(|e| e.key).collect()
    }

    /// Entries from most to least recently used
    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.list.iter()
    }

    fn evict(&mut self) -> Option<Entry> {
        let entry = self.list.remove_tail()?;
        self.index.remove(&entry.key);
        if entry.dirty {
            self.dirty -= 1;
        }
        Some(entry)
    }
}
