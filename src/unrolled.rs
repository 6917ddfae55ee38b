//! Unrolled variant: up to [`BLOCK_CAPACITY`] keys per chain node.

use std::cell::RefCell;
use std::fmt;

use crate::arena::{Arena, NodeId};
use crate::block::{Block, BLOCK_CAPACITY};
use crate::pole::{BucketCounter, PoleIndex};
use crate::trace::{debug_log, trace_log};
use crate::{Config, ConfigError};

/// An ordered multiset over a chain of sorted fixed-capacity blocks, entered
/// through a lazily grown pole index.
///
/// Compared to [`PoleSet`](crate::PoleSet) this trades some shifting inside
/// blocks for far fewer links to chase. Poles point at blocks and are ordered
/// by each block's first key, read live from the block.
///
/// Removal tombstones: a key is taken out of its block in place, and a block
/// that loses its last key stays in the chain. Once tombstones reach half of
/// the live keys, the next [`remove`](Self::remove) first calls
/// [`rebuild`](Self::rebuild), which repacks everything into full blocks.
///
/// Like `PoleSet`, [`find`](Self::find) grows the pole index through a
/// `RefCell` and takes `&self`.
pub struct UnrolledPoleSet<K> {
    blocks: Arena<Block<K>>,
    /// `poles[0]` always names `head`; poles are in strict chain order.
    poles: RefCell<PoleIndex<NodeId>>,
    head: NodeId,
    len: usize,
    /// Keys removed since the last rebuild.
    removed: usize,
    bucket_size: usize,
}

impl<K: Ord + Clone> UnrolledPoleSet<K> {
    /// Creates an empty set with a pole on every block it walks.
    pub fn new() -> Self {
        Self::from_valid_config(Config::unrolled())
    }

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
            blocks: Arena::new(),
            poles: RefCell::new(PoleIndex::new()),
            head: NodeId::NULL,
            len: 0,
            removed: 0,
            bucket_size: config.bucket_size,
        }
    }

    #[inline]
    pub fn bucket_size(&self) -> usize {
        self.bucket_size
    }

    /// Number of live keys, counting duplicates.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Tombstoned keys waiting for the next rebuild.
    #[inline]
    pub fn removed(&self) -> usize {
        self.removed
    }

    /// Number of blocks in the chain, emptied ones included.
    #[inline]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Recounts the live keys by walking every block.
    pub fn calc_len(&self) -> usize {
        let mut n = 0;
        let mut cur = self.head;
        while !cur.is_null() {
            n += self.blocks[cur].len();
            cur = self.blocks[cur].next;
        }
        n
    }

    pub fn insert(&mut self, key: K) {
        self.len += 1;
        let poles = self.poles.get_mut();

        if self.head.is_null() {
            let id = self.blocks.alloc(Block::with_key(key, NodeId::NULL));
            self.head = id;
            poles.clear();
            poles.push(id);
            return;
        }

        let blocks = &self.blocks;
        let slot = poles
            .locate_by(&key, |id| blocks[*id].separator())
            .max(1);
        let target = Self::walk(blocks, poles, slot, self.bucket_size, |b| b.exceeds(&key));
        Self::insert_sorted(&mut self.blocks, target, key);
    }

    /// Returns whether `key` is present. Installs poles along the way.
    pub fn find(&self, key: &K) -> bool {
        let mut poles = self.poles.borrow_mut();
        if poles.is_empty() {
            return false;
        }
        let blocks = &self.blocks;
        let slot = poles
            .locate_before_by(key, |id| blocks[*id].separator())
            .max(1);
        let stop = Self::walk(blocks, &mut poles, slot, self.bucket_size, |b| b.bounds(key));
        blocks[stop].contains(key)
    }

    #[inline]
    pub fn contains(&self, key: &K) -> bool {
        self.find(key)
    }

    /// Removes one occurrence of `key`. Returns false if it was not present.
    ///
    /// Rebuilds first when tombstones have reached half the live count, so
    /// compaction is paid for across the removals that caused it.
    pub fn remove(&mut self, key: &K) -> bool {
        if self.head.is_null() {
            return false;
        }
        if self.removed * 2 >= self.len {
            self.rebuild();
            if self.head.is_null() {
                return false;
            }
        }

        let poles = self.poles.get_mut();
        let blocks = &self.blocks;
        let slot = poles
            .locate_before_by(key, |id| blocks[*id].separator())
            .max(1);
        let stop = Self::walk(blocks, poles, slot, self.bucket_size, |b| b.bounds(key));
        if !self.blocks[stop].remove(key) {
            return false;
        }
        self.len -= 1;
        self.removed += 1;
        true
    }

    /// Walks blocks from the pole before `slot` until `stop` accepts one or
    /// the chain ends, and returns that block.
    ///
    /// Every `bucket_size` blocks the walk installs a pole. Existing poles it
    /// passes are stepped over rather than overwritten, which keeps the index
    /// in chain order even when emptied blocks let a walk run past the pole
    /// its search landed before.
    fn walk(
        blocks: &Arena<Block<K>>,
        poles: &mut PoleIndex<NodeId>,
        mut slot: usize,
        bucket_size: usize,
        mut stop: impl FnMut(&Block<K>) -> bool,
    ) -> NodeId {
        let mut counter = BucketCounter::new(bucket_size);
        let mut cur = *poles.get(slot - 1);
        loop {
            if slot < poles.len() && *poles.get(slot) == cur {
                slot += 1;
                counter.reset();
            } else if counter.due() {
                trace_log!(slot, "installing pole");
                poles.install(slot, cur);
                slot += 1;
            }

            let block = &blocks[cur];
            if block.next.is_null() || stop(block) {
                return cur;
            }
            cur = block.next;
            counter.step();
        }
    }

    /// Inserts `key` into block `id` or, when it overflows, the block after.
    ///
    /// A full block whose successor is missing or also full gets a fresh empty
    /// successor. A full block then carries its maximum into the successor
    /// before shifting `key` in, so every key stays `<=` the blocks after it.
    fn insert_sorted(blocks: &mut Arena<Block<K>>, id: NodeId, key: K) {
        if blocks[id].is_empty() {
            blocks[id].fill(key);
            return;
        }

        if blocks[id].is_full() {
            let next = blocks[id].next;
            if next.is_null() || blocks[next].is_full() {
                trace_log!("splitting full block");
                let fresh = blocks.alloc(Block::new(next));
                blocks[id].next = fresh;
            }
        }

        let pos = blocks[id].lower_bound(&key);
        let next = blocks[id].next;
        if pos == BLOCK_CAPACITY {
            Self::insert_sorted(blocks, next, key);
            return;
        }
        if blocks[id].is_full() {
            let carry = blocks[id].pop_max();
            Self::insert_sorted(blocks, next, carry);
        }
        blocks[id].insert_at(pos, key);
    }

    /// Repacks the live keys into full blocks from the head on, frees the
    /// blocks left over, and reinstalls a pole every `bucket_size` blocks.
    ///
    /// The key sequence is unchanged. With no live keys left, all storage is
    /// released.
    pub fn rebuild(&mut self) {
        if self.head.is_null() {
            return;
        }
        debug_log!(
            len = self.len,
            removed = self.removed,
            blocks = self.blocks.len(),
            "rebuilding unrolled chain"
        );

        let poles = self.poles.get_mut();
        poles.clear();
        self.removed = 0;
        if self.len == 0 {
            self.blocks.clear();
            self.head = NodeId::NULL;
            return;
        }

        // The write cursor never overtakes the read cursor: every block it
        // leaves behind is full, and no block holds more than a full one.
        let mut write = self.head;
        let mut written = 1usize;
        poles.push(write);
        let mut read = self.head;
        while !read.is_null() {
            let next = self.blocks[read].next;
            for key in self.blocks[read].take_keys() {
                if self.blocks[write].is_full() {
                    write = self.blocks[write].next;
                    if written % self.bucket_size == 0 {
                        poles.push(write);
                    }
                    written += 1;
                }
                self.blocks[write].push(key);
            }
            read = next;
        }

        let mut tail = std::mem::replace(&mut self.blocks[write].next, NodeId::NULL);
        while !tail.is_null() {
            tail = self.blocks.free(tail).next;
        }
        debug_log!(blocks = self.blocks.len(), "rebuild finished");
    }

    pub fn clear(&mut self) {
        self.blocks.clear();
        self.poles.get_mut().clear();
        self.head = NodeId::NULL;
        self.len = 0;
        self.removed = 0;
    }

    pub fn first(&self) -> Option<&K> {
        self.iter().next()
    }

    pub fn last(&self) -> Option<&K> {
        let from_last_pole = self.poles.borrow().iter().last().copied();
        // The maximum normally sits after the last pole; when those blocks
        // were all emptied, fall back to the whole chain.
        for start in [from_last_pole, Some(self.head)].into_iter().flatten() {
            let mut found = None;
            let mut cur = start;
            while !cur.is_null() {
                found = self.blocks[cur].keys().last().or(found);
                cur = self.blocks[cur].next;
            }
            if found.is_some() {
                return found;
            }
        }
        None
    }

    /// Live keys in ascending order, duplicates included.
    pub fn iter(&self) -> Iter<'_, K> {
        Iter {
            blocks: &self.blocks,
            cur: self.head,
            pos: 0,
            remaining: self.len,
        }
    }

    pub fn pole_count(&self) -> usize {
        self.poles.borrow().len()
    }

    /// First key (or fence) of each pole's block, in index order.
    pub fn pole_keys(&self) -> Vec<K> {
        self.poles
            .borrow()
            .iter()
            .map(|id| self.blocks[*id].separator().clone())
            .collect()
    }

    pub fn memory_usage(&self) -> usize {
        self.blocks.memory_usage() + self.poles.borrow().memory_usage()
    }

    pub fn shrink_to_fit(&mut self) {
        self.blocks.shrink_to_fit();
        self.poles.get_mut().shrink_to_fit();
    }
}

impl<K: Ord + Clone + fmt::Debug> UnrolledPoleSet<K> {
    /// Renders the chain block by block, e.g. `[:(1, 2, 3) (4) :()]`. A `:`
    /// marks a block with a pole; `()` is an emptied block.
    pub fn dump(&self) -> String {
        let poles = self.poles.borrow();
        let mut out = String::from("[");
        let mut p = 0;
        let mut cur = self.head;
        while !cur.is_null() {
            if cur != self.head {
                out.push(' ');
            }
            if p < poles.len() && *poles.get(p) == cur {
                out.push(':');
                p += 1;
            }
            let keys: Vec<String> = self.blocks[cur]
                .keys()
                .iter()
                .map(|k| format!("{k:?}"))
                .collect();
            out.push('(');
            out.push_str(&keys.join(", "));
            out.push(')');
            cur = self.blocks[cur].next;
        }
        out.push(']');
        out
    }
}

impl<K: Ord + Clone> Default for UnrolledPoleSet<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone> Clone for UnrolledPoleSet<K> {
    fn clone(&self) -> Self {
        Self {
            blocks: self.blocks.clone(),
            poles: RefCell::new(self.poles.borrow().clone()),
            head: self.head,
            len: self.len,
            removed: self.removed,
            bucket_size: self.bucket_size,
        }
    }
}

impl<K: Ord + Clone + fmt::Debug> fmt::Debug for UnrolledPoleSet<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<K: Ord + Clone> Extend<K> for UnrolledPoleSet<K> {
    fn extend<I: IntoIterator<Item = K>>(&mut self, iter: I) {
        for key in iter {
            self.insert(key);
        }
    }
}

impl<K: Ord + Clone> FromIterator<K> for UnrolledPoleSet<K> {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl<'a, K: Ord + Clone> IntoIterator for &'a UnrolledPoleSet<K> {
    type Item = &'a K;
    type IntoIter = Iter<'a, K>;

    fn into_iter(self) -> Iter<'a, K> {
        self.iter()
    }
}

pub struct Iter<'a, K> {
    blocks: &'a Arena<Block<K>>,
    cur: NodeId,
    pos: usize,
    remaining: usize,
}

impl<'a, K: Ord> Iterator for Iter<'a, K> {
    type Item = &'a K;

    fn next(&mut self) -> Option<&'a K> {
        while !self.cur.is_null() {
            let keys = self.blocks[self.cur].keys();
            if let Some(key) = keys.get(self.pos) {
                self.pos += 1;
                self.remaining -= 1;
                return Some(key);
            }
            self.cur = self.blocks[self.cur].next;
            self.pos = 0;
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K: Ord> ExactSizeIterator for Iter<'_, K> {}

#[cfg(test)]
impl<K: Ord + Clone + fmt::Debug> UnrolledPoleSet<K> {
    /// Checks the structural invariants; panics with a description on failure.
    pub(crate) fn validate(&self) {
        let poles = self.poles.borrow();
        assert_eq!(self.calc_len(), self.len, "len must match live keys");

        if self.head.is_null() {
            assert_eq!(self.blocks.len(), 0, "empty set keeps no blocks");
            assert!(poles.is_empty(), "empty set keeps no poles");
            return;
        }

        // Live keys and fences together never decrease along the chain.
        let mut chain = Vec::new();
        let mut separators: Vec<&K> = Vec::new();
        let mut cur = self.head;
        while !cur.is_null() {
            let block = &self.blocks[cur];
            assert!(block.len() <= BLOCK_CAPACITY);
            assert!(block.keys().windows(2).all(|w| w[0] <= w[1]));
            separators.extend(block.probe());
            chain.push(cur);
            cur = block.next;
        }
        assert_eq!(chain.len(), self.blocks.len(), "every arena block is in the chain");
        assert!(
            separators.windows(2).all(|w| w[0] <= w[1]),
            "chain must be sorted: {separators:?}"
        );

        assert_eq!(*poles.get(0), self.head, "pole 0 must name the head");
        let mut at = 0;
        for (slot, id) in poles.iter().enumerate() {
            let found = chain[at..]
                .iter()
                .position(|c| c == id)
                .unwrap_or_else(|| panic!("pole {slot} out of chain order"));
            at += found + 1;
        }
    }
}
