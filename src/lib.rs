//! # pole-set
//!
//! Ordered multisets built on a sorted singly-linked chain plus a sparse
//! index of "pole" pointers into it.
//!
//! The index is not maintained eagerly or probabilistically. Every operation
//! binary searches the poles for an entry point near its key and walks the
//! chain from there; a walk that crosses a full bucket of nodes without
//! meeting a pole installs one. Busy regions of the chain therefore collect
//! poles on their own, and a lookup costs `O(log P)` for the search plus a
//! short bounded walk.
//!
//! Two variants share that scheme:
//!
//! - [`PoleSet`]: one key per chain node.
//! - [`UnrolledPoleSet`]: up to [`BLOCK_CAPACITY`] sorted keys per node, with
//!   tombstoning removal and amortized compaction.
//!
//! ## Example
//!
//! ```rust
//! use pole_set::UnrolledPoleSet;
//!
//! let mut set = UnrolledPoleSet::new();
//! for k in [5, 3, 8, 1, 3] {
//!     set.insert(k);
//! }
//!
//! assert!(set.find(&3));
//! assert!(set.remove(&3));
//! assert!(set.find(&3));
//! assert!(!set.find(&9));
//! assert_eq!(set.iter().copied().collect::<Vec<_>>(), vec![1, 3, 5, 8]);
//! ```
//!
//! ## Lookups mutate
//!
//! `find` takes `&self` but may install poles. The pole index lives in a
//! `RefCell`, so both sets are `Send` but not `Sync`; they are meant for use
//! from one thread at a time.

#![deny(unsafe_code)]

mod arena;
mod block;
mod plain;
mod pole;
mod trace;
mod unrolled;

pub use block::BLOCK_CAPACITY;
pub use plain::PoleSet;
pub use unrolled::UnrolledPoleSet;

/// Iterators over the keys of each variant.
pub mod iter {
    pub use crate::plain::Iter as PoleSetIter;
    pub use crate::unrolled::Iter as UnrolledPoleSetIter;
}

// =============================================================================
// Configuration
// =============================================================================

const PLAIN_BUCKET_SIZE: usize = 4;
const UNROLLED_BUCKET_SIZE: usize = 1;

/// Construction parameters shared by both variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Nodes (or blocks) a walk crosses before it installs a pole. Smaller
    /// values mean shorter walks and a larger index.
    pub bucket_size: usize,
}

impl Config {
    /// Defaults for [`PoleSet`]: a pole every 4 nodes.
    pub const fn plain() -> Self {
        Self {
            bucket_size: PLAIN_BUCKET_SIZE,
        }
    }

    /// Defaults for [`UnrolledPoleSet`]: a pole on every block.
    pub const fn unrolled() -> Self {
        Self {
            bucket_size: UNROLLED_BUCKET_SIZE,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket_size == 0 {
            return Err(ConfigError::ZeroBucketSize);
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::plain()
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("bucket size must be at least 1")]
    ZeroBucketSize,
}


#[cfg(test)]
mod proptests;
