use blockrange::{AllocatorBuilder, BlockRangeAllocator, SeriesPool};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

/// Benchmark filling the space with fixed-size requests
fn bench_fill(c: &mut Criterion) {
    let mut group = c.benchmark_group("fill_100k_blocks");

    for &count in &[1u32, 10, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let mut alloc = BlockRangeAllocator::new(100_000).unwrap();
                while let Some(handle) = alloc.acquire(count) {
                    black_box(handle);
                }
            });
        });
    }

    group.finish();
}

/// Benchmark allocation + free cycles (fragmentation test)
fn bench_alloc_free_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("alloc_free_cycle");

    for &tracked in &[true, false] {
        let label = if tracked { "tracked" } else { "untracked" };
        group.bench_function(label, |b| {
            b.iter(|| {
                let mut alloc = AllocatorBuilder::new()
                    .max_blocks(10_000)
                    .track_handles(tracked)
                    .build()
                    .unwrap();
                let mut allocations = Vec::new();

                // Allocate
                for _ in 0..100 {
                    allocations.push(alloc.acquire(10).unwrap());
                }

                // Free every other allocation
                for (i, handle) in allocations.iter().enumerate() {
                    if i % 2 == 0 {
                        alloc.release(*handle);
                    }
                }

                // Re-allocate into the holes
                for _ in 0..50 {
                    alloc.acquire(10).unwrap();
                }

                black_box(&alloc);
            });
        });
    }

    group.finish();
}

/// Benchmark best-fit search over a fragmented chain
fn bench_fragmented_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("fragmented_search");

    for &holes in &[64usize, 1_024, 8_192] {
        let mut alloc = BlockRangeAllocator::new((holes * 2) as u32 + 64).unwrap();
        let handles: Vec<_> = std::iter::from_fn(|| alloc.acquire(1)).collect();
        for handle in handles.iter().step_by(2).take(holes) {
            alloc.release(*handle);
        }
        // Free tail run: a 2-block request scans every single-block hole first
        for handle in handles.iter().rev().take(64) {
            alloc.release(*handle);
        }

        group.bench_with_input(BenchmarkId::from_parameter(holes), &holes, |b, _| {
            b.iter(|| {
                let handle = alloc.acquire(2).unwrap();
                alloc.release(black_box(handle));
            });
        });
    }

    group.finish();
}

fn bench_series_pool(c: &mut Criterion) {
    c.bench_function("series_pool_cycle", |b| {
        let mut pool = SeriesPool::new(4_096).unwrap();
        b.iter(|| {
            let id = pool.acquire().unwrap();
            pool.release(black_box(id));
        });
    });
}

criterion_group!(
    benches,
    bench_fill,
    bench_alloc_free_cycle,
    bench_fragmented_search,
    bench_series_pool
);
criterion_main!(benches);
