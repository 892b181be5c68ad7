//! Allocation scenario tests
//!
//! Walks the allocator through fill, scattered release, best-fit reuse,
//! double release and fragmentation, checking the free layout at each step.

use blockrange::{AllocError, AllocatorBuilder, BlockRangeAllocator, Handle};

fn free_spans(alloc: &BlockRangeAllocator) -> Vec<(u32, u32)> {
    alloc.free_ranges().map(|n| (n.start(), n.end())).collect()
}

fn filled() -> (BlockRangeAllocator, Vec<Handle>) {
    // Unknown releases are reported, not panicked on, in every build
    let mut alloc = AllocatorBuilder::new()
        .max_blocks(100)
        .strict_release(false)
        .build()
        .unwrap();
    let handles: Vec<Handle> = (0..10).map(|_| alloc.acquire(10).unwrap()).collect();
    (alloc, handles)
}

#[test]
fn test_fill_in_tens() {
    let (alloc, handles) = filled();

    let starts: Vec<u32> = handles.iter().map(|h| h.start()).collect();
    assert_eq!(starts, vec![0, 10, 20, 30, 40, 50, 60, 70, 80, 90]);
    assert!(handles.iter().all(|h| h.count() == 10));
    assert_eq!(alloc.free_count(), 0);
    assert_eq!(alloc.free_ranges().count(), 0);
    alloc.check_invariants().unwrap();
}

#[test]
fn test_scattered_release() {
    let (mut alloc, handles) = filled();

    for i in [0, 7, 9, 4] {
        assert!(alloc.release(handles[i]), "release of handle {} failed", i);
        alloc.check_invariants().unwrap();
    }

    // [80, 90) is still held, so [70, 80) and [90, 100) stay apart
    assert_eq!(
        free_spans(&alloc),
        vec![(0, 10), (40, 50), (70, 80), (90, 100)]
    );
    assert_eq!(alloc.free_count(), 40);
}

#[test]
fn test_best_fit_after_merge() {
    let (mut alloc, handles) = filled();
    for i in [0, 7, 9, 4] {
        alloc.release(handles[i]);
    }

    // No single range holds 20 blocks yet
    assert!(alloc.acquire(20).is_none());

    // Releasing [80, 90) bridges [70, 80) and [90, 100)
    assert!(alloc.release(handles[8]));
    assert_eq!(free_spans(&alloc), vec![(0, 10), (40, 50), (70, 100)]);
    assert_eq!(alloc.free_count(), 50);

    let big = alloc.acquire(20).unwrap();
    assert_eq!((big.start(), big.end()), (70, 90));
    assert_eq!(free_spans(&alloc), vec![(0, 10), (40, 50), (90, 100)]);
    assert_eq!(alloc.free_count(), 30);
    alloc.check_invariants().unwrap();
}

#[test]
fn test_best_fit_picks_tightest_range() {
    let (mut alloc, handles) = filled();
    // Free [10, 30) (20 blocks) and [50, 60) (10 blocks) and [80, 100) (20 blocks)
    for i in [1, 2, 5, 8, 9] {
        alloc.release(handles[i]);
    }

    let small = alloc.acquire(6).unwrap();
    assert_eq!(small.start(), 50);

    // Tie between two 20-block ranges goes to the lower address
    let wide = alloc.acquire(15).unwrap();
    assert_eq!(wide.start(), 10);
}

#[test]
fn test_double_release() {
    let (mut alloc, handles) = filled();
    assert!(alloc.release(handles[3]));

    let free_before = alloc.free_count();
    let spans_before = free_spans(&alloc);

    assert!(!alloc.release(handles[3]));
    assert!(matches!(
        alloc.try_release(handles[3]),
        Err(AllocError::UnknownHandle { start: 30, count: 10 })
    ));

    assert_eq!(alloc.free_count(), free_before);
    assert_eq!(free_spans(&alloc), spans_before);
    assert_eq!(alloc.live_count(), 9);
}

#[test]
fn test_fragmented_request_fails() {
    let (mut alloc, handles) = filled();
    for i in (0..10).step_by(2) {
        alloc.release(handles[i]);
    }

    // 50 blocks free in total, but no range larger than 10
    assert_eq!(alloc.free_count(), 50);
    assert!(alloc.acquire(11).is_none());
    match alloc.try_acquire(11) {
        Err(AllocError::OutOfSpace {
            requested,
            largest_free,
        }) => {
            assert_eq!(requested, 11);
            assert_eq!(largest_free, 10);
        }
        other => panic!("expected OutOfSpace, got {:?}", other),
    }

    // Nothing moved
    assert_eq!(alloc.free_count(), 50);
    assert_eq!(alloc.free_ranges().count(), 5);

    // Smaller requests still succeed
    assert!(alloc.acquire(10).is_some());
}

#[test]
fn test_release_all_restores_single_range() {
    let (mut alloc, handles) = filled();
    for i in [5, 1, 8, 0, 3, 9, 2, 7, 4, 6] {
        assert!(alloc.release(handles[i]));
    }

    assert_eq!(free_spans(&alloc), vec![(0, 100)]);
    assert_eq!(alloc.free_count(), 100);
    assert_eq!(alloc.live_count(), 0);
    alloc.check_invariants().unwrap();
}
