//! Registry of live handles
//!
//! Tracks every handle issued by the allocator, ordered by start block.
//! Release validation and enumeration go through here; the free-space
//! algorithm itself never consults it.

use crate::allocator::range::Handle;
use std::collections::BTreeMap;

/// Ordered set of live handles keyed by their first block
#[derive(Debug, Clone, Default)]
pub struct ActiveHandleRegistry {
    live: BTreeMap<u32, Handle>,

    /// Sum of live handle counts
    live_blocks: u64,
}

impl ActiveHandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly issued handle
    ///
    /// Returns `false` if a handle already starts at the same block.
    pub fn insert(&mut self, handle: Handle) -> bool {
        if self.live.contains_key(&handle.start()) {
            return false;
        }

        self.live.insert(handle.start(), handle);
        self.live_blocks += u64::from(handle.count());
        true
    }

    /// Forget a handle
    ///
    /// Returns `false` unless exactly this handle is live.
    pub fn remove(&mut self, handle: &Handle) -> bool {
        if !self.contains(handle) {
            return false;
        }

        self.live.remove(&handle.start());
        self.live_blocks -= u64::from(handle.count());
        true
    }

    pub fn contains(&self, handle: &Handle) -> bool {
        self.live.get(&handle.start()) == Some(handle)
    }

    /// Live handle covering `block`
    pub fn find_containing(&self, block: u32) -> Option<&Handle> {
        self.live
            .range(..=block)
            .next_back()
            .map(|(_, handle)| handle)
            .filter(|handle| handle.contains(block))
    }

    /// Live handles in ascending start order
    pub fn iter(&self) -> impl Iterator<Item = &Handle> {
        self.live.values()
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Total blocks held by live handles
    pub fn live_blocks(&self) -> u64 {
        self.live_blocks
    }

    pub fn clear(&mut self) {
        self.live.clear();
        self.live_blocks = 0;
    }

    /// Copy of this registry with every handle stamped for another owner
    pub(crate) fn retagged(&self, owner: u32) -> Self {
        ActiveHandleRegistry {
            live: self
                .live
                .iter()
                .map(|(&start, handle)| (start, handle.with_owner(owner)))
                .collect(),
            live_blocks: self.live_blocks,
        }
    }
}
