//! Contiguous block-range allocation
//!
//! The allocator hands out ranges of abstract block indices out of a fixed
//! space `[0, max_blocks)`:
//! - `pool`: fixed-capacity generational storage for chain nodes and handles
//! - `chain`: address-ordered free list, best-fit allocation and coalescing
//! - `registry`: ordered set of live handles for release validation
//! - `range`: the [`BlockRangeAllocator`] facade and its [`Handle`]
//! - `shared`: mutex-guarded allocator for multi-threaded callers

pub mod chain;
pub mod pool;
pub mod range;
pub mod registry;
pub mod shared;

pub use range::{BlockRangeAllocator, Handle};
pub use shared::SharedAllocator;

use serde::{Deserialize, Serialize};

/// Block allocator trait
///
/// Defines the interface for claiming and returning contiguous block ranges.
pub trait BlockAllocator {
    /// Token naming one claimed range
    type Handle;

    /// Claim `count` contiguous blocks, `None` if the request cannot be met
    fn acquire(&mut self, count: u32) -> Option<Self::Handle>;

    /// Return a previously claimed range, `false` if the handle is unknown
    fn release(&mut self, handle: Self::Handle) -> bool;

    /// Get number of free blocks available
    fn free_blocks(&self) -> u32;

    /// Get total number of blocks managed
    fn total_blocks(&self) -> u32;

    /// Calculate fragmentation score (0.0 = no fragmentation, higher = more fragmented)
    fn fragmentation_score(&self) -> f64;
}

/// Point-in-time statistics about an allocator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationStats {
    pub max_blocks: u32,
    pub free_blocks: u32,
    /// Number of disjoint free ranges
    pub free_ranges: usize,
    pub largest_free_range: u32,
    pub live_handles: u32,
    pub fragmentation: f64,
}

impl AllocationStats {
    /// Blocks held by live handles
    pub fn used_blocks(&self) -> u32 {
        self.max_blocks - self.free_blocks
    }

    /// Fraction of the space held by live handles
    pub fn utilization(&self) -> f64 {
        f64::from(self.used_blocks()) / f64::from(self.max_blocks.max(1))
    }
}
