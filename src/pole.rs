//! The pole index: a sorted array of entry points into a chain.
//!
//! Poles are handles to chain nodes, kept in chain order. A lookup binary
//! searches them for the last pole at or before the target key and then walks
//! the chain from there. Walks that cross `bucket_size` nodes without meeting
//! a pole install one, so the index grows where traffic goes and never needs
//! a separate maintenance pass.

use std::collections::VecDeque;

use crate::arena::NodeId;

/// A pole that caches the key of the node it points at.
#[derive(Clone, Debug)]
pub(crate) struct Pole<K> {
    pub(crate) key: K,
    pub(crate) node: NodeId,
}

/// Slots sit in a ring buffer so dropping the front pole, which every
/// removal at the head does, costs O(1).
#[derive(Clone, Debug)]
pub(crate) struct PoleIndex<P> {
    slots: VecDeque<P>,
}

impl<P> PoleIndex<P> {
    pub(crate) fn new() -> Self {
        Self {
            slots: VecDeque::new(),
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[inline]
    pub(crate) fn get(&self, slot: usize) -> &P {
        &self.slots[slot]
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, slot: usize) -> &mut P {
        &mut self.slots[slot]
    }

    pub(crate) fn iter(&self) -> std::collections::vec_deque::Iter<'_, P> {
        self.slots.iter()
    }

    /// Upper-bound search: index of the first pole whose key is greater than
    /// `key`.
    ///
    /// A result `p > 0` makes `slots[p - 1]` a valid starting point for a walk
    /// towards `key`; `0` means `key` sorts at or before the head.
    #[inline]
    pub(crate) fn locate_by<'s, K, F>(&'s self, key: &K, mut key_of: F) -> usize
    where
        K: Ord + ?Sized + 's,
        F: FnMut(&'s P) -> &'s K,
    {
        let mut l = 0;
        let mut r = self.slots.len();
        while l != r {
            let m = l + (r - l) / 2;
            if key_of(&self.slots[m]) <= key {
                l = m + 1;
            } else {
                r = m;
            }
        }
        l
    }

    /// Lower-bound search: index of the first pole whose key is not less than
    /// `key`. `slots[p - 1]` then sits strictly before every node equal to
    /// `key`.
    #[inline]
    pub(crate) fn locate_before_by<'s, K, F>(&'s self, key: &K, mut key_of: F) -> usize
    where
        K: Ord + ?Sized + 's,
        F: FnMut(&'s P) -> &'s K,
    {
        let mut l = 0;
        let mut r = self.slots.len();
        while l != r {
            let m = l + (r - l) / 2;
            if key_of(&self.slots[m]) < key {
                l = m + 1;
            } else {
                r = m;
            }
        }
        l
    }

    /// Overwrites `slot`, or appends when the walk has moved past the last
    /// pole.
    #[inline]
    pub(crate) fn install(&mut self, slot: usize, pole: P) {
        debug_assert!(slot <= self.slots.len());
        if slot == self.slots.len() {
            self.slots.push_back(pole);
        } else {
            self.slots[slot] = pole;
        }
    }

    /// Drops `slot`, shifting whichever side of it is shorter.
    pub(crate) fn remove(&mut self, slot: usize) -> P {
        self.slots.remove(slot).expect("pole slot out of range")
    }

    pub(crate) fn push(&mut self, pole: P) {
        self.slots.push_back(pole);
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
    }

    pub(crate) fn shrink_to_fit(&mut self) {
        self.slots.shrink_to_fit();
    }

    pub(crate) fn memory_usage(&self) -> usize {
        self.slots.capacity() * std::mem::size_of::<P>()
    }
}

impl<K: Ord> PoleIndex<Pole<K>> {
    #[inline]
    pub(crate) fn locate(&self, key: &K) -> usize {
        self.locate_by(key, |p| &p.key)
    }

    #[inline]
    pub(crate) fn locate_before(&self, key: &K) -> usize {
        self.locate_before_by(key, |p| &p.key)
    }
}

/// Counts steps of a chain walk and says when a pole is due.
///
/// The first pole falls `bucket_size` nodes past the starting pole, then one
/// every `bucket_size` nodes after that.
pub(crate) struct BucketCounter {
    bucket_size: usize,
    remaining: usize,
}

impl BucketCounter {
    #[inline]
    pub(crate) fn new(bucket_size: usize) -> Self {
        debug_assert!(bucket_size > 0);
        Self {
            bucket_size,
            remaining: bucket_size,
        }
    }

    /// Called before looking at each node; true when the node gets a pole.
    #[inline]
    pub(crate) fn due(&mut self) -> bool {
        if self.remaining == 0 {
            self.remaining = self.bucket_size;
            true
        } else {
            false
        }
    }

    /// Restarts the count at an existing pole.
    #[inline]
    pub(crate) fn reset(&mut self) {
        self.remaining = self.bucket_size;
    }

    /// Called after stepping to the next node.
    #[inline]
    pub(crate) fn step(&mut self) {
        self.remaining -= 1;
    }
}
