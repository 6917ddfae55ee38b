//! Slab storage for chain nodes.
//!
//! Chains link their nodes through [`NodeId`] handles instead of pointers. The
//! arena owns every node; links and poles only name slots, so restructuring
//! the chain can never leave an index entry dangling into freed memory, and
//! dropping the arena releases a chain of any length without recursion.

use std::ops::{Index, IndexMut};

/// Handle to a slot in an [`Arena`].
///
/// 32 bits are plenty for an in-memory chain and halve the size of every link
/// compared to a `usize`. `u32::MAX` is reserved for [`NodeId::NULL`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub(crate) struct NodeId(u32);

impl NodeId {
    pub(crate) const NULL: NodeId = NodeId(u32::MAX);

    #[inline]
    pub(crate) fn is_null(self) -> bool {
        self.0 == Self::NULL.0
    }

    #[cfg(test)]
    pub(crate) fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    fn index(self) -> usize {
        debug_assert!(!self.is_null());
        self.0 as usize
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Arena<T> {
    slots: Vec<Option<T>>,
    /// Vacated slots, reused LIFO.
    free: Vec<NodeId>,
}

impl<T> Arena<T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    pub(crate) fn alloc(&mut self, value: T) -> NodeId {
        if let Some(id) = self.free.pop() {
            debug_assert!(self.slots[id.index()].is_none());
            self.slots[id.index()] = Some(value);
            return id;
        }
        let idx = self.slots.len();
        assert!(idx < u32::MAX as usize, "node arena exhausted");
        self.slots.push(Some(value));
        NodeId(idx as u32)
    }

    pub(crate) fn free(&mut self, id: NodeId) -> T {
        let value = self.slots[id.index()]
            .take()
            .expect("freeing a vacant arena slot");
        self.free.push(id);
        value
    }

    /// Number of occupied slots.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
    }

    pub(crate) fn shrink_to_fit(&mut self) {
        // Trailing vacant slots can go; interior ones stay addressable.
        while matches!(self.slots.last(), Some(None)) {
            self.slots.pop();
        }
        let len = self.slots.len();
        self.free.retain(|id| id.index() < len);
        self.slots.shrink_to_fit();
        self.free.shrink_to_fit();
    }

    pub(crate) fn memory_usage(&self) -> usize {
        self.slots.capacity() * std::mem::size_of::<Option<T>>()
            + self.free.capacity() * std::mem::size_of::<NodeId>()
    }
}

impl<T> Index<NodeId> for Arena<T> {
    type Output = T;

    #[inline]
    fn index(&self, id: NodeId) -> &T {
        self.slots[id.index()]
            .as_ref()
            .expect("dangling node handle")
    }
}

impl<T> IndexMut<NodeId> for Arena<T> {
    #[inline]
    fn index_mut(&mut self, id: NodeId) -> &mut T {
        self.slots[id.index()]
            .as_mut()
            .expect("dangling node handle")
    }
}
