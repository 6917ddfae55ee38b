//! Fixed-capacity sorted blocks for the unrolled chain.

use smallvec::SmallVec;

use crate::arena::NodeId;

/// Maximum number of keys held by one block.
pub const BLOCK_CAPACITY: usize = 12;

/// One node of the unrolled chain: up to [`BLOCK_CAPACITY`] sorted keys.
///
/// Every key of a block is `<=` every key of the blocks after it. A block
/// whose last key is removed stays in the chain with no keys; it remembers
/// that key as its `fence` so walks and pole searches still see a separator
/// in the right place until the block is refilled or compacted away.
#[derive(Clone, Debug)]
pub(crate) struct Block<K> {
    /// Never spills: inserts into a full block carry a key out first.
    keys: SmallVec<[K; BLOCK_CAPACITY]>,
    fence: Option<K>,
    pub(crate) next: NodeId,
}

impl<K: Ord> Block<K> {
    pub(crate) fn new(next: NodeId) -> Self {
        Self {
            keys: SmallVec::new(),
            fence: None,
            next,
        }
    }

    pub(crate) fn with_key(key: K, next: NodeId) -> Self {
        let mut block = Self::new(next);
        block.keys.push(key);
        block
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    #[inline]
    pub(crate) fn is_full(&self) -> bool {
        self.keys.len() == BLOCK_CAPACITY
    }

    #[inline]
    pub(crate) fn keys(&self) -> &[K] {
        &self.keys
    }

    /// The keys a walk compares against: the live keys, or the fence of an
    /// emptied block.
    #[inline]
    pub(crate) fn probe(&self) -> &[K] {
        match &self.fence {
            Some(fence) if self.keys.is_empty() => std::slice::from_ref(fence),
            _ => self.keys.as_slice(),
        }
    }

    /// First live key, or the fence of an emptied block. This is the key the
    /// pole index orders blocks by.
    #[inline]
    pub(crate) fn separator(&self) -> &K {
        self.keys
            .first()
            .or(self.fence.as_ref())
            .expect("block in chain has neither keys nor fence")
    }

    /// Whether an insert walk should stop here: something in the block sorts
    /// after `key`.
    #[inline]
    pub(crate) fn exceeds(&self, key: &K) -> bool {
        self.probe().last().map_or(false, |k| k > key)
    }

    /// Whether a lookup walk can stop here. A live key `>= key` decides the
    /// lookup in this block; an emptied block only bounds it when its fence
    /// is strictly greater, since an equal key may still follow.
    #[inline]
    pub(crate) fn bounds(&self, key: &K) -> bool {
        match self.keys.last() {
            Some(last) => last >= key,
            None => self.fence.as_ref().map_or(false, |f| f > key),
        }
    }

    #[inline]
    pub(crate) fn contains(&self, key: &K) -> bool {
        self.keys.binary_search(key).is_ok()
    }

    /// Position of the first key not less than `key`.
    #[inline]
    pub(crate) fn lower_bound(&self, key: &K) -> usize {
        self.keys.iter().position(|k| k >= key).unwrap_or(self.keys.len())
    }

    /// Stores `key` into an empty block, dropping its fence.
    pub(crate) fn fill(&mut self, key: K) {
        debug_assert!(self.keys.is_empty());
        self.fence = None;
        self.keys.push(key);
    }

    /// Inserts `key` at `pos`, shifting later keys right. The block must have
    /// room.
    pub(crate) fn insert_at(&mut self, pos: usize, key: K) {
        debug_assert!(!self.is_full());
        self.keys.insert(pos, key);
    }

    /// Takes the largest key out to make room.
    pub(crate) fn pop_max(&mut self) -> K {
        self.keys.pop().expect("carrying out of an empty block")
    }

    /// Removes one occurrence of `key`. Returns false, leaving the block
    /// untouched, when the block does not hold it.
    pub(crate) fn remove(&mut self, key: &K) -> bool {
        let Some(pos) = self.keys.iter().position(|k| k == key) else {
            return false;
        };
        let removed = self.keys.remove(pos);
        if self.keys.is_empty() {
            self.fence = Some(removed);
        }
        true
    }

    /// Moves the live keys out, leaving the block empty without a fence.
    pub(crate) fn take_keys(&mut self) -> SmallVec<[K; BLOCK_CAPACITY]> {
        self.fence = None;
        std::mem::take(&mut self.keys)
    }

    /// Appends during compaction; callers keep keys ascending.
    pub(crate) fn push(&mut self, key: K) {
        debug_assert!(!self.is_full());
        debug_assert!(self.keys.last().map_or(true, |last| *last <= key));
        self.keys.push(key);
    }
}
