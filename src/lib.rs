//! # blockrange - Contiguous Block-Range Allocation
//!
//! `blockrange` allocates ranges of fixed-size logical blocks out of a bounded
//! space of `max_blocks` blocks. Blocks are abstract indices: the caller maps
//! them onto real storage (buffer slots, record pages, tile pools).
//!
//! - **Best-fit placement** with a lowest-address tie-break, so identical
//!   call sequences always produce identical layouts
//! - **Immediate coalescing**: released ranges merge with free neighbours,
//!   no two free ranges are ever contiguous
//! - **Checked handles**: double or foreign releases are detected and
//!   reported instead of corrupting the free list
//! - **No per-call heap traffic**: node storage is sized once, up front
//!
//! ## Quick Start
//!
//! ```rust
//! use blockrange::{BlockRangeAllocator, Result};
//!
//! # fn main() -> Result<()> {
//! let mut alloc = BlockRangeAllocator::new(100)?;
//!
//! let a = alloc.acquire(10).expect("space available");
//! let b = alloc.acquire(30).expect("space available");
//! assert_eq!((a.start(), b.start()), (0, 10));
//! assert_eq!(alloc.free_count(), 60);
//!
//! assert!(alloc.release(a));
//! assert!(!alloc.contains(&a)); // already released
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use blockrange::{AllocatorConfig, BlockRangeAllocator};
//!
//! # fn main() -> blockrange::Result<()> {
//! let config = AllocatorConfig::from_toml_str("max_blocks = 4096\nstrict_release = true")?;
//! let alloc = BlockRangeAllocator::with_config(&config)?;
//! assert_eq!(alloc.max_count(), 4096);
//! # Ok(())
//! # }
//! ```

pub mod core;

// Re-export core modules internally so crate:: paths in core still work
#[allow(unused_imports)]
pub(crate) use self::core::{allocator, config, error, series};

pub use crate::core::{
    allocator::{
        chain::FreeNode, AllocationStats, BlockAllocator, BlockRangeAllocator, Handle,
        SharedAllocator,
    },
    config::{AllocatorBuilder, AllocatorConfig},
    error::{AllocError, Result},
    series::SeriesPool,
};
