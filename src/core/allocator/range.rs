//! Block-range allocator
//!
//! Composes the free chain, a pool of handle slots and the live-handle
//! registry into the public allocator. Handles are plain `Copy` tokens; a
//! handle whose slot has been released no longer validates, so a second
//! release of the same token is detected instead of corrupting the chain.

use crate::allocator::chain::{FreeChain, FreeNode};
use crate::allocator::pool::{NodeId, NodePool};
use crate::allocator::registry::ActiveHandleRegistry;
use crate::allocator::{AllocationStats, BlockAllocator};
use crate::config::AllocatorConfig;
use crate::error::{AllocError, Result};
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, error, trace, warn};

/// Source of per-instance owner tags stamped into handles
static NEXT_OWNER: AtomicU32 = AtomicU32::new(1);

/// Caller's claim on a contiguous range of blocks
///
/// Only [`BlockRangeAllocator::acquire`] creates handles, and a handle is
/// consumed by passing it back to [`BlockRangeAllocator::release`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    owner: u32,
    id: NodeId,
    start: u32,
    count: u32,
}

impl Handle {
    /// First block of the range
    pub fn start(&self) -> u32 {
        self.start
    }

    /// Number of blocks in the range
    pub fn count(&self) -> u32 {
        self.count
    }

    /// One past the last block of the range
    pub fn end(&self) -> u32 {
        self.start + self.count
    }

    /// Check if this handle covers a block index
    pub fn contains(&self, block: u32) -> bool {
        block >= self.start && block < self.end()
    }

    pub(crate) fn with_owner(self, owner: u32) -> Handle {
        Handle { owner, ..self }
    }
}

/// Storage slot backing one live handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    start: u32,
    count: u32,
}

/// Best-fit allocator of contiguous block ranges out of `[0, max_blocks)`
///
/// A clone is an independent allocator with its own owner tag. Handles
/// issued by either copy are foreign to the other, including handles issued
/// before the clone; the clone's copies of those are listed by
/// [`handles`](Self::handles).
#[derive(Debug)]
pub struct BlockRangeAllocator {
    /// Tag distinguishing this allocator's handles from other instances'
    owner: u32,

    chain: FreeChain,

    /// One slot per live handle
    handles: NodePool<Span>,

    /// Absent when handle tracking is disabled
    registry: Option<ActiveHandleRegistry>,

    /// Panic on foreign or double release
    strict_release: bool,
}

impl Clone for BlockRangeAllocator {
    fn clone(&self) -> Self {
        let owner = NEXT_OWNER.fetch_add(1, Ordering::Relaxed);
        BlockRangeAllocator {
            owner,
            chain: self.chain.clone(),
            handles: self.handles.clone(),
            registry: self
                .registry
                .as_ref()
                .map(|registry| registry.retagged(owner)),
            strict_release: self.strict_release,
        }
    }
}

impl BlockRangeAllocator {
    /// Create an allocator over `max_blocks` blocks, all free
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `max_blocks` is 0 and `PoolInit` if node
    /// storage cannot be reserved.
    pub fn new(max_blocks: u32) -> Result<Self> {
        Self::with_config(&AllocatorConfig::new(max_blocks))
    }

    /// Create an allocator from a validated configuration
    pub fn with_config(config: &AllocatorConfig) -> Result<Self> {
        config.validate()?;

        let chain = FreeChain::new(config.max_blocks)?;
        let handles = NodePool::new(config.max_blocks)?;
        let registry = config.track_handles.then(ActiveHandleRegistry::new);

        debug!(
            "Initialized block range allocator: {} blocks, {} free-node slots, handle tracking {}",
            config.max_blocks,
            FreeChain::node_capacity(config.max_blocks),
            if config.track_handles { "on" } else { "off" }
        );

        Ok(BlockRangeAllocator {
            owner: NEXT_OWNER.fetch_add(1, Ordering::Relaxed),
            chain,
            handles,
            registry,
            strict_release: config.strict_release,
        })
    }

    /// Claim `count` contiguous blocks
    ///
    /// Returns `None` when `count` is 0 or no single free range is large
    /// enough. Use [`try_acquire`](Self::try_acquire) to learn which.
    pub fn acquire(&mut self, count: u32) -> Option<Handle> {
        self.try_acquire(count).ok()
    }

    /// Claim `count` contiguous blocks, reporting why a request failed
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if `count` is 0
    /// - `OutOfSpace` if no free range holds `count` blocks, even when the
    ///   free total would
    pub fn try_acquire(&mut self, count: u32) -> Result<Handle> {
        let start = match self.chain.acquire(count) {
            Ok(start) => start,
            Err(err) => {
                debug!("Acquire of {} blocks refused: {}", count, err);
                return Err(err);
            }
        };

        let Some(id) = self.handles.acquire(Span { start, count }) else {
            error!(
                "Handle pool exhausted with {} live handles over {} blocks",
                self.handles.len(),
                self.max_count()
            );
            if cfg!(debug_assertions) {
                panic!("handle pool exhausted");
            }
            self.chain.release(start, count)?;
            return Err(AllocError::PoolExhausted("handles"));
        };

        let handle = Handle {
            owner: self.owner,
            id,
            start,
            count,
        };
        if let Some(registry) = self.registry.as_mut() {
            let inserted = registry.insert(handle);
            debug_assert!(inserted, "registry already holds a handle at {}", start);
        }

        trace!("Acquired [{}, +{})", start, count);
        Ok(handle)
    }

    /// Give a handle's blocks back
    ///
    /// Returns `false`, leaving the allocator untouched, when the handle was
    /// not issued by this allocator or has already been released.
    pub fn release(&mut self, handle: Handle) -> bool {
        self.try_release(handle).is_ok()
    }

    /// Give a handle's blocks back, reporting rejected handles as errors
    ///
    /// # Errors
    ///
    /// Returns `UnknownHandle` for foreign, stale or duplicate handles.
    ///
    /// # Panics
    ///
    /// Panics on an unknown handle when strict release is configured.
    pub fn try_release(&mut self, handle: Handle) -> Result<()> {
        if !self.is_live(&handle) {
            return Err(self.reject(handle));
        }

        self.chain.release(handle.start, handle.count)?;

        if let Some(registry) = self.registry.as_mut() {
            registry.remove(&handle);
        }
        self.handles.release(handle.id);

        trace!("Released [{}, +{})", handle.start, handle.count);
        Ok(())
    }

    fn is_live(&self, handle: &Handle) -> bool {
        if handle.owner != self.owner {
            return false;
        }

        let in_pool = self.handles.get(handle.id)
            == Some(&Span {
                start: handle.start,
                count: handle.count,
            });

        match &self.registry {
            Some(registry) => in_pool && registry.contains(handle),
            None => in_pool,
        }
    }

    fn reject(&self, handle: Handle) -> AllocError {
        warn!(
            "Release of unknown handle [{}, +{}) (foreign or already released)",
            handle.start, handle.count
        );

        if self.strict_release {
            panic!(
                "release of unknown handle [{}, +{})",
                handle.start, handle.count
            );
        }

        AllocError::UnknownHandle {
            start: handle.start,
            count: handle.count,
        }
    }

    /// Number of free blocks
    pub fn free_count(&self) -> u32 {
        self.chain.free_count()
    }

    /// Size of the managed block space
    pub fn max_count(&self) -> u32 {
        self.chain.max_blocks()
    }

    /// Number of live handles
    pub fn live_count(&self) -> u32 {
        self.handles.len()
    }

    /// Check whether a handle is live in this allocator
    pub fn contains(&self, handle: &Handle) -> bool {
        self.is_live(handle)
    }

    /// Check whether `block` belongs to a live handle
    pub fn is_allocated(&self, block: u32) -> bool {
        block < self.max_count() && !self.chain.is_free(block)
    }

    /// Live handle covering `block`, if any
    pub fn handle_at(&self, block: u32) -> Option<Handle> {
        match &self.registry {
            Some(registry) => registry.find_containing(block).copied(),
            None => self
                .handles
                .iter()
                .find(|(_, span)| block >= span.start && block < span.start + span.count)
                .map(|(id, span)| Handle {
                    owner: self.owner,
                    id,
                    start: span.start,
                    count: span.count,
                }),
        }
    }

    /// Size of the largest request that would currently succeed
    pub fn largest_free_range(&self) -> u32 {
        self.chain.largest()
    }

    /// Free ranges in ascending address order
    pub fn free_ranges(&self) -> impl Iterator<Item = &FreeNode> {
        self.chain.iter()
    }

    /// Live handles in ascending address order
    pub fn handles(&self) -> Vec<Handle> {
        match &self.registry {
            Some(registry) => registry.iter().copied().collect(),
            None => {
                let mut handles: Vec<Handle> = self
                    .handles
                    .iter()
                    .map(|(id, span)| Handle {
                        owner: self.owner,
                        id,
                        start: span.start,
                        count: span.count,
                    })
                    .collect();
                handles.sort_unstable_by_key(Handle::start);
                handles
            }
        }
    }

    /// Whether live handles are tracked in a registry
    pub fn tracks_handles(&self) -> bool {
        self.registry.is_some()
    }

    pub fn stats(&self) -> AllocationStats {
        AllocationStats {
            max_blocks: self.max_count(),
            free_blocks: self.free_count(),
            free_ranges: self.chain.len(),
            largest_free_range: self.largest_free_range(),
            live_handles: self.live_count(),
            fragmentation: self.chain.fragmentation_score(),
        }
    }

    /// Release every handle and make the whole space one free range again
    ///
    /// Outstanding handles are invalidated.
    pub fn reset(&mut self) -> Result<()> {
        self.chain.reset()?;
        self.handles.clear();
        if let Some(registry) = self.registry.as_mut() {
            registry.clear();
        }
        debug!("Reset block range allocator ({} blocks)", self.max_count());
        Ok(())
    }

    /// Verify the free chain and that free ranges and live handles tile
    /// `[0, max_blocks)` exactly
    pub fn check_invariants(&self) -> Result<()> {
        self.chain.check_invariants()?;

        let handles = self.handles();
        if let Some(registry) = &self.registry {
            if registry.len() != self.handles.len() as usize {
                return Err(AllocError::Corrupted(format!(
                    "registry holds {} handles, pool holds {}",
                    registry.len(),
                    self.handles.len()
                )));
            }
            if handles.iter().any(|handle| !self.is_live(handle)) {
                return Err(AllocError::Corrupted(
                    "registry entry without matching handle slot".to_string(),
                ));
            }
            let used = u64::from(self.max_count() - self.free_count());
            if registry.live_blocks() != used {
                return Err(AllocError::Corrupted(format!(
                    "registry holds {} blocks, {} are allocated",
                    registry.live_blocks(),
                    used
                )));
            }
        }

        let mut ranges: Vec<(u32, u32, bool)> = self
            .chain
            .iter()
            .map(|node| (node.start(), node.end(), true))
            .chain(handles.iter().map(|h| (h.start, h.end(), false)))
            .collect();
        ranges.sort_unstable_by_key(|&(start, _, _)| start);

        let mut cursor = 0u32;
        for (start, end, free) in ranges {
            if start != cursor {
                return Err(AllocError::Corrupted(format!(
                    "{} range [{}, {}) expected to start at {}",
                    if free { "free" } else { "allocated" },
                    start,
                    end,
                    cursor
                )));
            }
            cursor = end;
        }

        if cursor != self.max_count() {
            return Err(AllocError::Corrupted(format!(
                "ranges cover [0, {}) of [0, {})",
                cursor,
                self.max_count()
            )));
        }

        Ok(())
    }
}

impl BlockAllocator for BlockRangeAllocator {
    type Handle = Handle;

    fn acquire(&mut self, count: u32) -> Option<Handle> {
        BlockRangeAllocator::acquire(self, count)
    }

    fn release(&mut self, handle: Handle) -> bool {
        BlockRangeAllocator::release(self, handle)
    }

    fn free_blocks(&self) -> u32 {
        self.free_count()
    }

    fn total_blocks(&self) -> u32 {
        self.max_count()
    }

    fn fragmentation_score(&self) -> f64 {
        self.chain.fragmentation_score()
    }
}
