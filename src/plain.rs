//! Plain variant: one key per chain node.

use std::cell::RefCell;
use std::fmt;

use crate::arena::{Arena, NodeId};
use crate::pole::{BucketCounter, Pole, PoleIndex};
use crate::trace::trace_log;
use crate::{Config, ConfigError};

#[derive(Clone, Debug)]
struct Node<K> {
    key: K,
    next: NodeId,
}

/// An ordered multiset over a sorted singly-linked chain, entered through a
/// lazily grown pole index.
///
/// Every operation binary searches the poles for a nearby entry point and then
/// walks at most a few buckets of nodes. Walks that pass `bucket_size` nodes
/// without meeting a pole install one at the current position.
///
/// Equal keys are kept; each [`insert`](Self::insert) adds an occurrence and
/// each successful [`remove`](Self::remove) takes one away.
///
/// [`find`](Self::find) takes `&self` but still extends the pole index: the
/// index sits behind a `RefCell`, which makes the set `!Sync`.
pub struct PoleSet<K> {
    nodes: Arena<Node<K>>,
    /// `poles[0]` always names `head`.
    poles: RefCell<PoleIndex<Pole<K>>>,
    head: NodeId,
    len: usize,
    bucket_size: usize,
}

impl<K: Ord + Clone> PoleSet<K> {
    /// Creates an empty set with a bucket size of 4.
    pub fn new() -> Self {
        Self::from_valid_config(Config::plain())
    }

    /// Creates an empty set that installs a pole every `bucket_size` nodes.
    ///
    /// # Panics
    ///
    /// Panics if `bucket_size` is zero.
    pub fn with_bucket_size(bucket_size: usize) -> Self {
        match Self::with_config(Config { bucket_size }) {
            Ok(set) => set,
            Err(e) => panic!("invalid bucket size: {e}"),
        }
    }

    pub fn with_config(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    fn from_valid_config(config: Config) -> Self {
        Self {
            nodes: Arena::new(),
            poles: RefCell::new(PoleIndex::new()),
            head: NodeId::NULL,
            len: 0,
            bucket_size: config.bucket_size,
        }
    }

    #[inline]
    pub fn bucket_size(&self) -> usize {
        self.bucket_size
    }

    /// Number of stored keys, counting duplicates.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_null()
    }

    /// Recounts the keys by walking the whole chain.
    pub fn calc_len(&self) -> usize {
        let mut n = 0;
        let mut cur = self.head;
        while !cur.is_null() {
            n += 1;
            cur = self.nodes[cur].next;
        }
        n
    }

    pub fn insert(&mut self, key: K) {
        let poles = self.poles.get_mut();
        self.len += 1;

        if self.head.is_null() {
            let id = self.nodes.alloc(Node {
                key: key.clone(),
                next: NodeId::NULL,
            });
            self.head = id;
            poles.clear();
            poles.push(Pole { key, node: id });
            return;
        }

        let mut slot = poles.locate(&key);
        if slot == 0 {
            let id = self.nodes.alloc(Node {
                key: key.clone(),
                next: self.head,
            });
            self.head = id;
            *poles.get_mut(0) = Pole { key, node: id };
            return;
        }

        let mut counter = BucketCounter::new(self.bucket_size);
        let mut prev = NodeId::NULL;
        let mut cur = poles.get(slot - 1).node;
        while !cur.is_null() && self.nodes[cur].key <= key {
            if counter.due() {
                trace_log!(slot, "installing pole during insert");
                poles.install(
                    slot,
                    Pole {
                        key: self.nodes[cur].key.clone(),
                        node: cur,
                    },
                );
                slot += 1;
            }
            prev = cur;
            cur = self.nodes[cur].next;
            counter.step();
        }

        // The starting pole's key is <= `key`, so the walk moved at least once.
        debug_assert!(!prev.is_null());
        let id = self.nodes.alloc(Node { key, next: cur });
        self.nodes[prev].next = id;
    }

    /// Returns whether `key` is present.
    ///
    /// The walk installs poles like [`insert`](Self::insert) does, so repeated
    /// lookups in a region get faster even without writes.
    pub fn find(&self, key: &K) -> bool {
        let mut poles = self.poles.borrow_mut();
        let mut slot = poles.locate(key);
        if slot == 0 {
            // Either empty, or `key` sorts before the head.
            return false;
        }

        let mut counter = BucketCounter::new(self.bucket_size);
        let mut cur = poles.get(slot - 1).node;
        while !cur.is_null() && self.nodes[cur].key < *key {
            if counter.due() {
                trace_log!(slot, "installing pole during find");
                poles.install(
                    slot,
                    Pole {
                        key: self.nodes[cur].key.clone(),
                        node: cur,
                    },
                );
                slot += 1;
            }
            cur = self.nodes[cur].next;
            counter.step();
        }
        !cur.is_null() && self.nodes[cur].key == *key
    }

    #[inline]
    pub fn contains(&self, key: &K) -> bool {
        self.find(key)
    }

    /// Removes one occurrence of `key`. Returns false if it was not present.
    ///
    /// The walk starts at the last pole strictly below `key` so the node
    /// before the match is known and can be relinked. Poles that named the
    /// removed node move to its successor, or are dropped when the successor
    /// already has a pole of its own.
    pub fn remove(&mut self, key: &K) -> bool {
        if self.head.is_null() {
            return false;
        }
        let poles = self.poles.get_mut();

        let mut slot = poles.locate_before(key);
        let mut prev = NodeId::NULL;
        let target = if slot == 0 {
            if self.nodes[self.head].key != *key {
                return false;
            }
            self.head
        } else {
            let mut counter = BucketCounter::new(self.bucket_size);
            let mut cur = poles.get(slot - 1).node;
            while !cur.is_null() && self.nodes[cur].key < *key {
                if counter.due() {
                    trace_log!(slot, "installing pole during remove");
                    poles.install(
                        slot,
                        Pole {
                            key: self.nodes[cur].key.clone(),
                            node: cur,
                        },
                    );
                    slot += 1;
                }
                prev = cur;
                cur = self.nodes[cur].next;
                counter.step();
            }
            if cur.is_null() || self.nodes[cur].key != *key {
                return false;
            }
            cur
        };

        let next = self.nodes[target].next;
        if prev.is_null() {
            self.head = next;
        } else {
            self.nodes[prev].next = next;
        }

        // Poles from `slot` on are untouched by the walk; only ones caching
        // `key` can name the target.
        let mut j = slot;
        while j < poles.len() && poles.get(j).key == *key {
            if poles.get(j).node == target {
                trace_log!(slot = j, "repairing pole of removed node");
                Self::repair_pole(&self.nodes, poles, j, next);
                break;
            }
            j += 1;
        }

        self.nodes.free(target);
        self.len -= 1;
        true
    }

    /// Points slot `j` at `succ`, the successor of the node it named.
    fn repair_pole(
        nodes: &Arena<Node<K>>,
        poles: &mut PoleIndex<Pole<K>>,
        j: usize,
        succ: NodeId,
    ) {
        if succ.is_null() {
            if j == 0 {
                poles.clear();
            } else {
                poles.remove(j);
            }
            return;
        }

        // The successor's own pole takes over the slot; at slot 0 it then
        // names the new head.
        if j + 1 < poles.len() && poles.get(j + 1).node == succ {
            poles.remove(j);
            return;
        }
        *poles.get_mut(j) = Pole {
            key: nodes[succ].key.clone(),
            node: succ,
        };
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.poles.get_mut().clear();
        self.head = NodeId::NULL;
        self.len = 0;
    }

    pub fn first(&self) -> Option<&K> {
        (!self.head.is_null()).then(|| &self.nodes[self.head].key)
    }

    pub fn last(&self) -> Option<&K> {
        let poles = self.poles.borrow();
        if poles.is_empty() {
            return None;
        }
        let mut cur = poles.get(poles.len() - 1).node;
        while !self.nodes[cur].next.is_null() {
            cur = self.nodes[cur].next;
        }
        Some(&self.nodes[cur].key)
    }

    /// Keys in ascending order, duplicates included.
    pub fn iter(&self) -> Iter<'_, K> {
        Iter {
            nodes: &self.nodes,
            cur: self.head,
            remaining: self.len,
        }
    }

    /// Number of installed poles.
    pub fn pole_count(&self) -> usize {
        self.poles.borrow().len()
    }

    /// Cached keys of the installed poles, in index order.
    pub fn pole_keys(&self) -> Vec<K> {
        self.poles.borrow().iter().map(|p| p.key.clone()).collect()
    }

    pub fn memory_usage(&self) -> usize {
        self.nodes.memory_usage() + self.poles.borrow().memory_usage()
    }

    pub fn shrink_to_fit(&mut self) {
        self.nodes.shrink_to_fit();
        self.poles.get_mut().shrink_to_fit();
    }
}

impl<K: Ord + Clone + fmt::Debug> PoleSet<K> {
    /// Renders the chain as `[:1, 3, :5, 8]`, where `:` marks a node that
    /// carries a pole.
    pub fn dump(&self) -> String {
        let poles = self.poles.borrow();
        let mut out = String::from("[");
        let mut p = 0;
        let mut cur = self.head;
        while !cur.is_null() {
            if cur != self.head {
                out.push_str(", ");
            }
            if p < poles.len() && poles.get(p).node == cur {
                out.push(':');
                p += 1;
            }
            out.push_str(&format!("{:?}", self.nodes[cur].key));
            cur = self.nodes[cur].next;
        }
        out.push(']');
        out
    }
}

impl<K: Ord + Clone> Default for PoleSet<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone> Clone for PoleSet<K> {
    fn clone(&self) -> Self {
        Self {
            nodes: self.nodes.clone(),
            poles: RefCell::new(self.poles.borrow().clone()),
            head: self.head,
            len: self.len,
            bucket_size: self.bucket_size,
        }
    }
}

impl<K: Ord + Clone + fmt::Debug> fmt::Debug for PoleSet<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<K: Ord + Clone> Extend<K> for PoleSet<K> {
    fn extend<I: IntoIterator<Item = K>>(&mut self, iter: I) {
        for key in iter {
            self.insert(key);
        }
    }
}

impl<K: Ord + Clone> FromIterator<K> for PoleSet<K> {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl<'a, K: Ord + Clone> IntoIterator for &'a PoleSet<K> {
    type Item = &'a K;
    type IntoIter = Iter<'a, K>;

    fn into_iter(self) -> Iter<'a, K> {
        self.iter()
    }
}

pub struct Iter<'a, K> {
    nodes: &'a Arena<Node<K>>,
    cur: NodeId,
    remaining: usize,
}

impl<'a, K> Iterator for Iter<'a, K> {
    type Item = &'a K;

    fn next(&mut self) -> Option<&'a K> {
        if self.cur.is_null() {
            return None;
        }
        let node = &self.nodes[self.cur];
        self.cur = node.next;
        self.remaining -= 1;
        Some(&node.key)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K> ExactSizeIterator for Iter<'_, K> {}

#[cfg(test)]
impl<K: Ord + Clone + fmt::Debug> PoleSet<K> {
    /// Checks the structural invariants; panics with a description on failure.
    pub(crate) fn validate(&self) {
        let poles = self.poles.borrow();
        assert_eq!(self.calc_len(), self.len, "len must match chain length");
        assert_eq!(self.nodes.len(), self.len, "every arena node is in the chain");

        let keys: Vec<&K> = self.iter().collect();
        assert!(
            keys.windows(2).all(|w| w[0] <= w[1]),
            "chain must be sorted: {keys:?}"
        );

        if self.head.is_null() {
            assert!(poles.is_empty(), "empty set keeps no poles");
            return;
        }
        assert_eq!(poles.get(0).node, self.head, "pole 0 must name the head");

        // Poles appear in chain order and cache their node's key.
        let mut p = 0;
        let mut cur = self.head;
        while !cur.is_null() && p < poles.len() {
            if poles.get(p).node == cur {
                assert!(
                    poles.get(p).key == self.nodes[cur].key,
                    "pole {p} caches a stale key"
                );
                p += 1;
            } else {
                cur = self.nodes[cur].next;
            }
        }
        assert_eq!(p, poles.len(), "poles must follow chain order");
    }
}
