//! Fixed-capacity node pool
//!
//! Pre-sizes storage for a bounded number of live records so that splitting
//! and merging free ranges never touches the global allocator. Records are
//! addressed by [`NodeId`], an `(index, generation)` pair: the generation is
//! bumped every time a slot is released, so an id that outlived its record
//! is rejected instead of aliasing whatever reused the slot.

use crate::error::{AllocError, Result};
use crate::series::SeriesPool;
use std::ops::{Index, IndexMut};

/// Generational reference to a record stored in a [`NodePool`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    /// Slot index inside the pool
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Generation of the slot when this id was issued
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

#[derive(Debug, Clone)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Pool of same-typed records with O(1) acquire and release
///
/// Free slots are kept on a [`SeriesPool`] stack, so the most recently
/// released slot is reused first.
#[derive(Debug, Clone)]
pub struct NodePool<T> {
    slots: Vec<Slot<T>>,
    free: SeriesPool,
}

impl<T> NodePool<T> {
    /// Create a pool with room for `capacity` live records
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `capacity` is 0 and `PoolInit` if the
    /// backing storage cannot be reserved.
    pub fn new(capacity: u32) -> Result<Self> {
        if capacity == 0 {
            return Err(AllocError::InvalidArgument(
                "node pool capacity must be greater than 0",
            ));
        }

        let free = SeriesPool::new(capacity)?;

        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity as usize)
            .map_err(|e| AllocError::PoolInit(e.to_string()))?;
        slots.resize_with(capacity as usize, || Slot {
            generation: 0,
            value: None,
        });

        Ok(NodePool { slots, free })
    }

    /// Store `value` in a free slot
    ///
    /// Returns `None` when every slot is live. Callers that dimension the
    /// pool from the block count treat this as an invariant violation.
    pub fn acquire(&mut self, value: T) -> Option<NodeId> {
        let index = self.free.acquire()?;
        let slot = &mut self.slots[index as usize];
        slot.value = Some(value);

        Some(NodeId {
            index,
            generation: slot.generation,
        })
    }

    /// Free the slot behind `id`, handing back its record
    ///
    /// Returns `None` without touching the pool if `id` does not name a live
    /// record of this pool (foreign index, stale generation, double release).
    pub fn release(&mut self, id: NodeId) -> Option<T> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }

        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.release(id.index);
        Some(value)
    }

    pub fn get(&self, id: NodeId) -> Option<&T> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.value.as_ref())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut T> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.value.as_mut())
    }

    /// Number of live records
    pub fn len(&self) -> u32 {
        self.free.acquired()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> u32 {
        self.free.capacity()
    }

    /// Number of records that can still be stored
    pub fn available(&self) -> u32 {
        self.free.available()
    }

    /// Drop every live record, invalidating all outstanding ids
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            if slot.value.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
            }
        }
        self.free.reset();
    }

    /// Iterate over live records in slot order
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value.as_ref().map(|value| {
                (
                    NodeId {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    value,
                )
            })
        })
    }
}

impl<T> Index<NodeId> for NodePool<T> {
    type Output = T;

    /// # Panics
    ///
    /// Panics if `id` does not name a live record.
    fn index(&self, id: NodeId) -> &T {
        match self.get(id) {
            Some(value) => value,
            None => panic!("stale node id {:?}", id),
        }
    }
}

impl<T> IndexMut<NodeId> for NodePool<T> {
    fn index_mut(&mut self, id: NodeId) -> &mut T {
        match self.get_mut(id) {
            Some(value) => value,
            None => panic!("stale node id {:?}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_creation() {
        let pool: NodePool<u64> = NodePool::new(16).unwrap();
        assert_eq!(pool.capacity(), 16);
        assert_eq!(pool.available(), 16);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let result: Result<NodePool<u64>> = NodePool::new(0);
        assert!(matches!(result, Err(AllocError::InvalidArgument(_))));
    }

    #[test]
    fn test_acquire_and_get() {
        let mut pool = NodePool::new(4).unwrap();
        let a = pool.acquire("a").unwrap();
        let b = pool.acquire("b").unwrap();

        assert_ne!(a, b);
        assert_eq!(pool.get(a), Some(&"a"));
        assert_eq!(pool[b], "b");
        assert_eq!(pool.len(), 2);

        pool[a] = "z";
        assert_eq!(pool.get(a), Some(&"z"));
    }

    #[test]
    fn test_exhaustion_returns_none() {
        let mut pool = NodePool::new(2).unwrap();
        assert!(pool.acquire(1).is_some());
        assert!(pool.acquire(2).is_some());
        assert!(pool.acquire(3).is_none());
    }

    #[test]
    fn test_release_returns_value() {
        let mut pool = NodePool::new(2).unwrap();
        let id = pool.acquire(42u32).unwrap();

        assert_eq!(pool.release(id), Some(42));
        assert_eq!(pool.len(), 0);
        assert!(pool.get(id).is_none());
    }

    #[test]
    fn test_double_release_rejected() {
        let mut pool = NodePool::new(2).unwrap();
        let id = pool.acquire(7u32).unwrap();

        assert!(pool.release(id).is_some());
        assert!(pool.release(id).is_none());
        assert_eq!(pool.available(), 2);
    }

    #[test]
    fn test_stale_id_after_reuse() {
        let mut pool = NodePool::new(1).unwrap();
        let old = pool.acquire(1u32).unwrap();
        pool.release(old);

        let new = pool.acquire(2u32).unwrap();
        assert_eq!(old.index(), new.index());
        assert_ne!(old.generation(), new.generation());

        // The old id must not alias the new record
        assert!(pool.get(old).is_none());
        assert!(pool.release(old).is_none());
        assert_eq!(pool[new], 2);
    }

    #[test]
    fn test_foreign_index_rejected() {
        let mut small: NodePool<u32> = NodePool::new(1).unwrap();
        let mut big = NodePool::new(8).unwrap();
        let mut last = None;
        for i in 0..8u32 {
            last = big.acquire(i);
        }

        let foreign = last.unwrap();
        assert!(small.release(foreign).is_none());
    }

    #[test]
    #[should_panic(expected = "stale node id")]
    fn test_index_stale_panics() {
        let mut pool = NodePool::new(1).unwrap();
        let id = pool.acquire(1u32).unwrap();
        pool.release(id);
        let _ = pool[id];
    }

    #[test]
    fn test_clear_invalidates_ids() {
        let mut pool = NodePool::new(4).unwrap();
        let a = pool.acquire(1u32).unwrap();
        let b = pool.acquire(2u32).unwrap();

        pool.clear();

        assert!(pool.is_empty());
        assert!(pool.get(a).is_none());
        assert!(pool.get(b).is_none());
        assert_eq!(pool.available(), 4);
    }

    #[test]
    fn test_iter_live_records() {
        let mut pool = NodePool::new(4).unwrap();
        let a = pool.acquire(10u32).unwrap();
        let b = pool.acquire(20u32).unwrap();
        pool.acquire(30u32).unwrap();
        pool.release(b);

        let values: Vec<u32> = pool.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![10, 30]);
        assert_eq!(pool.iter().next().map(|(id, _)| id), Some(a));
    }
}
