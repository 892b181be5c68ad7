//! Free-space chain
//!
//! Address-ordered, doubly linked list of free block ranges stored in a
//! [`NodePool`]. Allocation is best-fit with a lowest-address tie-break and
//! carves from the low end of the chosen range; release merges the range
//! with its neighbours so that no two free ranges are ever contiguous.

use crate::allocator::pool::{NodeId, NodePool};
use crate::error::{AllocError, Result};
use tracing::trace;

/// One contiguous run of free blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeNode {
    start: u32,
    count: u32,
    prev: Option<NodeId>,
    next: Option<NodeId>,
}

impl FreeNode {
    /// First block of the range
    pub fn start(&self) -> u32 {
        self.start
    }

    /// Number of blocks in the range (always > 0)
    pub fn count(&self) -> u32 {
        self.count
    }

    /// One past the last block of the range
    pub fn end(&self) -> u32 {
        self.start + self.count
    }

    /// Check if this range contains a block index
    pub fn contains(&self, block: u32) -> bool {
        block >= self.start && block < self.end()
    }
}

/// Ordered free list over `[0, max_blocks)`
#[derive(Debug, Clone)]
pub struct FreeChain {
    nodes: NodePool<FreeNode>,

    /// Lowest-addressed free node
    head: Option<NodeId>,

    /// Highest-addressed free node
    tail: Option<NodeId>,

    /// Sum of all node counts, maintained incrementally
    free_count: u32,

    max_blocks: u32,
}

impl FreeChain {
    /// Upper bound on simultaneous free nodes for a space of `max_blocks`
    ///
    /// Free nodes are pairwise non-contiguous, so every pair of neighbours
    /// is separated by at least one allocated block.
    pub fn node_capacity(max_blocks: u32) -> u32 {
        max_blocks / 2 + max_blocks % 2
    }

    /// Create a chain with a single free node spanning `[0, max_blocks)`
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `max_blocks` is 0 and `PoolInit` if node
    /// storage cannot be reserved.
    pub fn new(max_blocks: u32) -> Result<Self> {
        if max_blocks == 0 {
            return Err(AllocError::InvalidArgument(
                "max_blocks must be greater than 0",
            ));
        }

        let mut chain = FreeChain {
            nodes: NodePool::new(Self::node_capacity(max_blocks))?,
            head: None,
            tail: None,
            free_count: 0,
            max_blocks,
        };
        chain.seed()?;

        Ok(chain)
    }

    fn seed(&mut self) -> Result<()> {
        let id = self.new_node(0, self.max_blocks)?;
        self.head = Some(id);
        self.tail = Some(id);
        self.free_count = self.max_blocks;
        Ok(())
    }

    /// Drop every free node and re-seed the whole space as free
    pub fn reset(&mut self) -> Result<()> {
        self.nodes.clear();
        self.head = None;
        self.tail = None;
        self.free_count = 0;
        self.seed()
    }

    fn new_node(&mut self, start: u32, count: u32) -> Result<NodeId> {
        let node = FreeNode {
            start,
            count,
            prev: None,
            next: None,
        };

        match self.nodes.acquire(node) {
            Some(id) => Ok(id),
            None => {
                tracing::error!(
                    "Free node pool exhausted ({} nodes for {} blocks)",
                    self.nodes.capacity(),
                    self.max_blocks
                );
                if cfg!(debug_assertions) {
                    panic!("free node pool exhausted");
                }
                Err(AllocError::PoolExhausted("free nodes"))
            }
        }
    }

    /// Carve `count` blocks out of the best-fitting free node
    ///
    /// Picks the smallest node with at least `count` blocks, preferring the
    /// lowest address among equals. Returns the first block of the carved
    /// range. The chain is left untouched on error.
    pub fn acquire(&mut self, count: u32) -> Result<u32> {
        if count == 0 {
            return Err(AllocError::InvalidArgument("count must be greater than 0"));
        }

        let mut best: Option<(NodeId, u32)> = None;
        let mut largest = 0;
        let mut cursor = self.head;

        while let Some(id) = cursor {
            let node = &self.nodes[id];
            largest = largest.max(node.count);

            if node.count >= count && best.map_or(true, |(_, size)| node.count < size) {
                best = Some((id, node.count));
                if node.count == count {
                    // Nothing fits tighter, and later nodes sit higher
                    break;
                }
            }
            cursor = node.next;
        }

        let Some((id, size)) = best else {
            return Err(AllocError::OutOfSpace {
                requested: count,
                largest_free: largest,
            });
        };

        let start = self.nodes[id].start;
        if size == count {
            trace!("Consuming free node [{}, +{})", start, size);
            self.unlink(id);
        } else {
            trace!(
                "Splitting free node [{}, +{}) at {}",
                start,
                size,
                start + count
            );
            let node = &mut self.nodes[id];
            node.start += count;
            node.count -= count;
        }

        self.free_count -= count;
        Ok(start)
    }

    /// Return `[start, start + count)` to the chain, merging with neighbours
    ///
    /// # Errors
    ///
    /// Returns `UnknownHandle` (and leaves the chain untouched) if the range
    /// is empty, out of bounds, or overlaps blocks that are already free.
    pub fn release(&mut self, start: u32, count: u32) -> Result<()> {
        let end = match start.checked_add(count) {
            Some(end) if count > 0 && end <= self.max_blocks => end,
            _ => return Err(AllocError::UnknownHandle { start, count }),
        };

        let (prev, next) = self.locate(start);

        let prev_end = prev.map(|id| self.nodes[id].end());
        let next_start = next.map(|id| self.nodes[id].start);

        if prev_end.map_or(false, |prev_end| prev_end > start)
            || next_start.map_or(false, |next_start| next_start < end)
        {
            return Err(AllocError::UnknownHandle { start, count });
        }

        let joins_prev = prev_end == Some(start);
        let joins_next = next_start == Some(end);

        match (prev, next) {
            (Some(prev), Some(next)) if joins_prev && joins_next => {
                let absorbed = self.nodes[next].count;
                trace!(
                    "Bridging [{}, +{}) between neighbours into one free node",
                    start,
                    count
                );
                self.nodes[prev].count += count + absorbed;
                self.unlink(next);
            }
            (Some(prev), _) if joins_prev => {
                trace!("Extending free node up over [{}, +{})", start, count);
                self.nodes[prev].count += count;
            }
            (_, Some(next)) if joins_next => {
                trace!("Extending free node down over [{}, +{})", start, count);
                let node = &mut self.nodes[next];
                node.start = start;
                node.count += count;
            }
            _ => {
                let id = self.new_node(start, count)?;
                self.link_between(id, prev, next);
            }
        }

        self.free_count += count;
        Ok(())
    }

    /// Find the free nodes immediately below and above `start`
    ///
    /// Walks from whichever end of the chain is closer to `start`.
    fn locate(&self, start: u32) -> (Option<NodeId>, Option<NodeId>) {
        let (Some(head), Some(tail)) = (self.head, self.tail) else {
            return (None, None);
        };

        let from_head = start.saturating_sub(self.nodes[head].start);
        let from_tail = self.nodes[tail].end().saturating_sub(start);

        if from_head <= from_tail {
            let mut prev = None;
            let mut cursor = Some(head);
            while let Some(id) = cursor {
                let node = &self.nodes[id];
                if node.start > start {
                    return (prev, Some(id));
                }
                prev = Some(id);
                cursor = node.next;
            }
            (prev, None)
        } else {
            let mut next = None;
            let mut cursor = Some(tail);
            while let Some(id) = cursor {
                let node = &self.nodes[id];
                if node.start <= start {
                    return (Some(id), next);
                }
                next = Some(id);
                cursor = node.prev;
            }
            (None, next)
        }
    }

    fn link_between(&mut self, id: NodeId, prev: Option<NodeId>, next: Option<NodeId>) {
        {
            let node = &mut self.nodes[id];
            node.prev = prev;
            node.next = next;
        }

        match prev {
            Some(prev) => self.nodes[prev].next = Some(id),
            None => self.head = Some(id),
        }
        match next {
            Some(next) => self.nodes[next].prev = Some(id),
            None => self.tail = Some(id),
        }
    }

    /// Detach a node from the chain and return its slot to the pool
    fn unlink(&mut self, id: NodeId) {
        let FreeNode { prev, next, .. } = self.nodes[id];

        match prev {
            Some(prev) => self.nodes[prev].next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.nodes[next].prev = prev,
            None => self.tail = prev,
        }

        self.nodes.release(id);
    }

    /// Total number of free blocks
    pub fn free_count(&self) -> u32 {
        self.free_count
    }

    pub fn max_blocks(&self) -> u32 {
        self.max_blocks
    }

    /// Number of free nodes (fragmentation indicator)
    pub fn len(&self) -> usize {
        self.nodes.len() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Size of the largest free node, 0 when the space is full
    pub fn largest(&self) -> u32 {
        self.iter().map(FreeNode::count).max().unwrap_or(0)
    }

    /// Check whether `block` lies in a free node
    pub fn is_free(&self, block: u32) -> bool {
        self.iter()
            .take_while(|node| node.start <= block)
            .any(|node| node.contains(block))
    }

    /// Free nodes in ascending address order
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            nodes: &self.nodes,
            cursor: self.head,
        }
    }

    /// Fragmentation of the free space
    ///
    /// 0.0 when all free space is one node, approaching 1.0 when every free
    /// block is its own node.
    pub fn fragmentation_score(&self) -> f64 {
        if self.free_count == 0 {
            return 0.0;
        }

        (self.len() as f64 - 1.0) / (self.free_count as f64)
    }

    /// Verify ordering, bounds, coalescing and the free counter
    pub fn check_invariants(&self) -> Result<()> {
        let mut total = 0u32;
        let mut prev: Option<(NodeId, FreeNode)> = None;
        let mut cursor = self.head;
        let mut seen = 0usize;

        while let Some(id) = cursor {
            let node = match self.nodes.get(id) {
                Some(node) => *node,
                None => return Err(corrupted(format!("dangling link {:?}", id))),
            };

            seen += 1;
            if seen > self.len() {
                return Err(corrupted("cycle in free chain".to_string()));
            }
            if node.count == 0 {
                return Err(corrupted(format!("empty free node at {}", node.start)));
            }
            if node.end() > self.max_blocks {
                return Err(corrupted(format!(
                    "free node [{}, {}) past end {}",
                    node.start,
                    node.end(),
                    self.max_blocks
                )));
            }
            if node.prev != prev.map(|(id, _)| id) {
                return Err(corrupted(format!("broken back link at {}", node.start)));
            }
            if let Some((_, before)) = prev {
                if before.end() > node.start {
                    return Err(corrupted(format!(
                        "free nodes [{}, {}) and [{}, {}) overlap or are out of order",
                        before.start,
                        before.end(),
                        node.start,
                        node.end()
                    )));
                }
                if before.end() == node.start {
                    return Err(corrupted(format!(
                        "free nodes [{}, {}) and [{}, {}) are contiguous",
                        before.start,
                        before.end(),
                        node.start,
                        node.end()
                    )));
                }
            }

            total += node.count;
            prev = Some((id, node));
            cursor = node.next;
        }

        if seen != self.len() {
            return Err(corrupted(format!(
                "{} nodes reachable, {} live in pool",
                seen,
                self.len()
            )));
        }
        if self.tail != prev.map(|(id, _)| id) {
            return Err(corrupted("tail does not point at last node".to_string()));
        }
        if total != self.free_count {
            return Err(corrupted(format!(
                "free counter {} but nodes hold {}",
                self.free_count, total
            )));
        }

        Ok(())
    }
}

fn corrupted(detail: String) -> AllocError {
    AllocError::Corrupted(detail)
}

/// Address-ordered iterator over free nodes
pub struct Iter<'a> {
    nodes: &'a NodePool<FreeNode>,
    cursor: Option<NodeId>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a FreeNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.nodes.get(self.cursor?)?;
        self.cursor = node.next;
        Some(node)
    }
}
