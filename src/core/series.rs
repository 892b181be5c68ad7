//! Fixed-capacity pool of integer IDs
//!
//! Hands out IDs in `[0, capacity)` from a LIFO stack: the most recently
//! released ID is the next one acquired. Used as the free-slot stack of
//! [`NodePool`](crate::allocator::pool::NodePool) and usable on its own for
//! ID recycling.

use crate::error::{AllocError, Result};
use tracing::warn;

/// LIFO pool of reusable `u32` IDs
#[derive(Debug, Clone)]
pub struct SeriesPool {
    /// Free IDs, top of the stack is handed out next
    free: Vec<u32>,

    /// Acquisition state per ID
    in_use: Vec<bool>,
}

impl SeriesPool {
    /// Create a pool holding every ID in `[0, capacity)`
    ///
    /// IDs are handed out in ascending order until the first release.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `capacity` is 0 and `PoolInit` if the
    /// backing storage cannot be reserved.
    pub fn new(capacity: u32) -> Result<Self> {
        if capacity == 0 {
            return Err(AllocError::InvalidArgument(
                "series pool capacity must be greater than 0",
            ));
        }

        let len = capacity as usize;

        let mut free = Vec::new();
        free.try_reserve_exact(len)
            .map_err(|e| AllocError::PoolInit(e.to_string()))?;
        free.extend((0..capacity).rev());

        let mut in_use = Vec::new();
        in_use
            .try_reserve_exact(len)
            .map_err(|e| AllocError::PoolInit(e.to_string()))?;
        in_use.resize(len, false);

        Ok(SeriesPool { free, in_use })
    }

    /// Take an ID, or `None` if every ID is in use
    pub fn acquire(&mut self) -> Option<u32> {
        let id = self.free.pop()?;
        self.in_use[id as usize] = true;
        Some(id)
    }

    /// Return an ID to the pool
    ///
    /// Returns `false` without touching the pool if `id` is out of range or
    /// not currently acquired.
    pub fn release(&mut self, id: u32) -> bool {
        let capacity = self.capacity();
        match self.in_use.get_mut(id as usize) {
            Some(acquired) if *acquired => {
                *acquired = false;
                self.free.push(id);
                true
            }
            Some(_) => {
                warn!("Double release of series id {}", id);
                false
            }
            None => {
                warn!("Series id {} out of range (capacity {})", id, capacity);
                false
            }
        }
    }

    /// Check whether `id` is currently handed out
    pub fn is_acquired(&self, id: u32) -> bool {
        self.in_use.get(id as usize).copied().unwrap_or(false)
    }

    pub fn capacity(&self) -> u32 {
        self.in_use.len() as u32
    }

    /// Number of IDs that can still be acquired
    pub fn available(&self) -> u32 {
        self.free.len() as u32
    }

    /// Number of IDs currently handed out
    pub fn acquired(&self) -> u32 {
        self.capacity() - self.available()
    }

    /// Return every ID to the pool, restoring ascending hand-out order
    pub fn reset(&mut self) {
        let capacity = self.capacity();
        self.free.clear();
        self.free.extend((0..capacity).rev());
        self.in_use.iter_mut().for_each(|acquired| *acquired = false);
    }
}
