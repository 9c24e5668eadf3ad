//! Recency list for LRU ordering
//!
//! A doubly linked list kept in an arena of nodes addressed by stable
//! [`NodeId`]s. Two sentinel nodes sit at fixed slots: the head sentinel
//! precedes the most recently used entry, the tail sentinel follows the
//! least recently used one. Sentinels are created by the constructor, never
//! carry an [`Entry`] and are never handed out to callers.
//!
//! ```text
//!   [HEAD] <-> [MRU] <-> ... <-> [LRU] <-> [TAIL]
//! ```
//!
//! Every operation is pointer rewiring on at most four nodes; nothing scans
//! the list. Vacated slots go on a free list and are reused by the next
//! insert, so the arena never grows beyond the peak number of live entries.

use kvcache_common::Key;

const HEAD: usize = 0;
const TAIL: usize = 1;

/// A single cached record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: Key,
    pub value: String,
    /// True iff the cached value is newer than the backing store's
    pub dirty: bool,
}

impl Entry {
    pub fn new(key: Key, value: impl Into<String>, dirty: bool) -> Self {
        Self {
            key,
            value: value.into(),
            dirty,
        }
    }
}

/// Stable handle to a live entry in a [`RecencyList`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug)]
struct Node {
    /// `None` for sentinels and free slots
    entry: Option<Entry>,
    prev: usize,
    next: usize,
}

/// Doubly linked list ordered from most to least recently used
#[derive(Debug)]
pub struct RecencyList {
    nodes: Vec<Node>,
    free: Vec<usize>,
    len: usize,
}

impl Default for RecencyList {
    fn default() -> Self {
        Self::new()
    }
}

impl RecencyList {
    /// Create an empty list
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create an empty list with room for `capacity` entries
    pub fn with_capacity(capacity: usize) -> Self {
        let mut nodes = Vec::with_capacity(capacity + 2);
        nodes.push(Node {
            entry: None,
            prev: HEAD,
            next: TAIL,
        });
        nodes.push(Node {
            entry: None,
            prev: HEAD,
            next: TAIL,
        });
        Self {
            nodes,
            free: Vec::new(),
            len: 0,
        }
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Link a new entry at the head
    pub fn insert_front(&mut self, entry: Entry) -> NodeId {
        let slot = match self.free.pop() {
            Some(slot) => {
                self.nodes[slot].entry = Some(entry);
                slot
            }
            None => {
                self.nodes.push(Node {
                    entry: Some(entry),
                    prev: HEAD,
                    next: TAIL,
                });
                self.nodes.len() - 1
            }
        };
        self.link_front(slot);
        self.len += 1;
        NodeId(slot)
    }

    /// Move an entry to the head. No effect if it is already there.
    pub fn touch(&mut self, id: NodeId) {
        if !self.is_live(id) || self.nodes[HEAD].next == id.0 {
            return;
        }
        self.unlink(id.0);
        self.link_front(id.0);
    }

    /// Unlink and return the least recently used entry
    pub fn remove_tail(&mut self) -> Option<Entry> {
        let last = self.nodes[TAIL].prev;
        if last == HEAD {
            return None;
        }
        self.remove(NodeId(last))
    }

    /// Unlink and return an arbitrary entry
    ///
    /// Returns `None` if `id` does not refer to a live entry.
    pub fn remove(&mut self, id: NodeId) -> Option<Entry> {
        if !self.is_live(id) {
            return None;
        }
        self.unlink(id.0);
        let node = &mut self.nodes[id.0];
        node.prev = HEAD;
        node.next = TAIL;
        let entry = node.entry.take();
        self.free.push(id.0);
        self.len -= 1;
        entry
    }

    pub fn get(&self, id: NodeId) -> Option<&Entry> {
        self.nodes.get(id.0).and_then(|n| n.entry.as_ref())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Entry> {
        self.nodes.get_mut(id.0).and_then(|n| n.entry.as_mut())
    }

    /// Most recently used entry
    pub fn front(&self) -> Option<&Entry> {
        self.nodes[self.nodes[HEAD].next].entry.as_ref()
    }

    /// Least recently used entry
    pub fn back(&self) -> Option<&Entry> {
        self.nodes[self.nodes[TAIL].prev].entry.as_ref()
    }

    /// Iterate from most to least recently used
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            list: self,
            cursor: self.nodes[HEAD].next,
        }
    }

    fn is_live(&self, id: NodeId) -> bool {
        id.0 != HEAD
            && id.0 != TAIL
            && self.nodes.get(id.0).is_some_and(|n| n.entry.is_some())
    }

    fn unlink(&mut self, slot: usize) {
        let (prev, next) = (self.nodes[slot].prev, self.nodes[slot].next);
        self.nodes[prev].next = next;
        self.nodes[next].prev = prev;
    }

    fn link_front(&mut self, slot: usize) {
        let first = self.nodes[HEAD].next;
        self.nodes[slot].prev = HEAD;
        self.nodes[slot].next = first;
        self.nodes[first].prev = slot;
        self.nodes[HEAD].next = slot;
    }
}

/// Iterator over a [`RecencyList`], most recently used first
pub struct Iter<'a> {
    list: &'a RecencyList,
    cursor: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Entry;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor == TAIL {
            return None;
        }
        let node = &self.list.nodes[self.cursor];
        self.cursor = node.next;
        node.entry.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(list: &RecencyList) -> Vec<Key> {
        list.iter().map(|e| e.key).collect()
    }

    fn filled(n: Key) -> (RecencyList, Vec<NodeId>) {
        let mut list = RecencyList::new();
        let ids = (1..=n)
            .map(|k| list.insert_front(Entry::new(k, format!("v{k}"), false)))
            .collect();
        (list, ids)
    }

    #[test]
    fn test_insert_front_orders_mru_first() {
        let (list, _) = filled(3);
        assert_eq!(keys(&list), vec![3, 2, 1]);
        assert_eq!(list.len(), 3);
        assert_eq!(list.front().unwrap().key, 3);
        assert_eq!(list.back().unwrap().key, 1);
    }

    #[test]
    fn test_touch_moves_to_head() {
        let (mut list, ids) = filled(3);
        list.touch(ids[0]);
        assert_eq!(keys(&list), vec![1, 3, 2]);

        list.touch(ids[1]);
        assert_eq!(keys(&list), vec![2, 1, 3]);
    }

    #[test]
    fn test_touch_head_is_noop() {
        let (mut list, ids) = filled(3);
        list.touch(ids[2]);
        assert_eq!(keys(&list), vec![3, 2, 1]);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_remove_tail_in_lru_order() {
        let (mut list, ids) = filled(3);
        list.touch(ids[0]);

        assert_eq!(list.remove_tail().unwrap().key, 2);
        assert_eq!(list.remove_tail().unwrap().key, 3);
        assert_eq!(list.remove_tail().unwrap().key, 1);
        assert!(list.remove_tail().is_none());
        assert!(list.is_empty());
        assert!(list.front().is_none());
        assert!(list.back().is_none());
    }

    #[test]
    fn test_remove_middle() {
        let (mut list, ids) = filled(3);
        let removed = list.remove(ids[1]).unwrap();
        assert_eq!(removed.key, 2);
        assert_eq!(keys(&list), vec![3, 1]);

        // Stale handle is rejected
        assert!(list.remove(ids[1]).is_none());
        assert!(list.get(ids[1]).is_none());
        list.touch(ids[1]);
        assert_eq!(keys(&list), vec![3, 1]);
    }

    #[test]
    fn test_sentinels_not_exposed() {
        let (mut list, _) = filled(2);
        assert!(list.remove(NodeId(HEAD)).is_none());
        assert!(list.remove(NodeId(TAIL)).is_none());
        assert!(list.get(NodeId(HEAD)).is_none());
        list.touch(NodeId(TAIL));
        assert_eq!(keys(&list), vec![2, 1]);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_slots_are_reused() {
        let mut list = RecencyList::with_capacity(2);
        for k in 0..100 {
            list.insert_front(Entry::new(k, "x", false));
            if list.len() > 2 {
                list.remove_tail();
            }
        }
        assert_eq!(keys(&list), vec![99, 98]);
        // Two sentinels plus at most three live-or-free slots
        assert!(list.nodes.len() <= 5);
    }

    #[test]
    fn test_get_mut_updates_in_place() {
        let (mut list, ids) = filled(2);
        let entry = list.get_mut(ids[0]).unwrap();
        entry.value = "changed".into();
        entry.dirty = true;

        assert_eq!(list.get(ids[0]).unwrap().value, "changed");
        assert!(list.get(ids[0]).unwrap().dirty);
        assert_eq!(keys(&list), vec![2, 1]);
    }
}
