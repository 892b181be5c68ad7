//! Mutex-guarded allocator handle
//!
//! Split and merge touch several neighbouring nodes at once, so the whole
//! allocator sits behind a single lock.

use crate::allocator::range::{BlockRangeAllocator, Handle};
use crate::allocator::{AllocationStats, BlockAllocator};
use crate::error::Result;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;

/// Cloneable, thread-safe handle to one [`BlockRangeAllocator`]
#[derive(Debug, Clone)]
pub struct SharedAllocator {
    inner: Arc<Mutex<BlockRangeAllocator>>,
}

impl SharedAllocator {
    pub fn new(allocator: BlockRangeAllocator) -> Self {
        SharedAllocator {
            inner: Arc::new(Mutex::new(allocator)),
        }
    }

    pub fn acquire(&self, count: u32) -> Option<Handle> {
        self.inner.lock().acquire(count)
    }

    pub fn try_acquire(&self, count: u32) -> Result<Handle> {
        self.inner.lock().try_acquire(count)
    }

    pub fn release(&self, handle: Handle) -> bool {
        self.inner.lock().release(handle)
    }

    pub fn try_release(&self, handle: Handle) -> Result<()> {
        self.inner.lock().try_release(handle)
    }

    pub fn free_count(&self) -> u32 {
        self.inner.lock().free_count()
    }

    pub fn max_count(&self) -> u32 {
        self.inner.lock().max_count()
    }

    pub fn stats(&self) -> AllocationStats {
        self.inner.lock().stats()
    }

    /// Run several operations under one lock acquisition
    pub fn with<R>(&self, f: impl FnOnce(&mut BlockRangeAllocator) -> R) -> R {
        let mut guard = self.inner.lock();
        f(&mut *guard)
    }

    /// Lock the allocator for direct access
    pub fn lock(&self) -> MutexGuard<'_, BlockRangeAllocator> {
        self.inner.lock()
    }
}

impl From<BlockRangeAllocator> for SharedAllocator {
    fn from(allocator: BlockRangeAllocator) -> Self {
        Self::new(allocator)
    }
}

impl BlockAllocator for SharedAllocator {
    type Handle = Handle;

    fn acquire(&mut self, count: u32) -> Option<Handle> {
        SharedAllocator::acquire(self, count)
    }

    fn release(&mut self, handle: Handle) -> bool {
        SharedAllocator::release(self, handle)
    }

    fn free_blocks(&self) -> u32 {
        self.free_count()
    }

    fn total_blocks(&self) -> u32 {
        self.max_count()
    }

    fn fragmentation_score(&self) -> f64 {
        self.inner.lock().stats().fragmentation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AllocatorBuilder;
    use std::thread;

    #[test]
    fn test_shared_basic() {
        let alloc = AllocatorBuilder::new()
            .max_blocks(64)
            .strict_release(false)
            .build()
            .unwrap();
        let shared = SharedAllocator::new(alloc);
        let handle = shared.acquire(16).unwrap();
        assert_eq!(shared.free_count(), 48);
        assert!(shared.release(handle));
        assert!(!shared.release(handle));
        assert_eq!(shared.free_count(), 64);
    }

    #[test]
    fn test_clones_share_state() {
        let a: SharedAllocator = BlockRangeAllocator::new(64).unwrap().into();
        let b = a.clone();

        let handle = a.acquire(10).unwrap();
        assert_eq!(b.free_count(), 54);
        assert!(b.release(handle));
        assert_eq!(a.free_count(), 64);
    }

    #[test]
    fn test_with_batches_operations() {
        let shared = SharedAllocator::new(BlockRangeAllocator::new(30).unwrap());
        let handles = shared.with(|alloc| {
            (0..3)
                .map(|_| alloc.acquire(10).unwrap())
                .collect::<Vec<_>>()
        });

        assert_eq!(handles.len(), 3);
        assert_eq!(shared.free_count(), 0);
        shared.lock().check_invariants().unwrap();
    }

    #[test]
    fn test_concurrent_acquire_release() {
        let shared = SharedAllocator::new(BlockRangeAllocator::new(4096).unwrap());

        let workers: Vec<_> = (0..4)
            .map(|t| {
                let shared = shared.clone();
                thread::spawn(move || {
                    for i in 0..200u32 {
                        let count = 1 + (i + t) % 7;
                        if let Some(handle) = shared.acquire(count) {
                            assert!(shared.release(handle));
                        }
                    }
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(shared.free_count(), 4096);
        let alloc = shared.lock();
        assert_eq!(alloc.free_ranges().count(), 1);
        alloc.check_invariants().unwrap();
    }
}
