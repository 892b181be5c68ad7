#![no_main]
use blockrange::{BlockRangeAllocator, SharedAllocator};
use libfuzzer_sys::{arbitrary::{Arbitrary, Unstructured}, fuzz_target};
use std::thread;

#[derive(Debug, Arbitrary)]
struct WorkerOps {
    counts: Vec<u8>,
}

// Several threads acquire and release through one shared allocator
fuzz_target!(|input: &[u8]| {
    let mut u = Unstructured::new(input);

    let workers: Vec<WorkerOps> = match u.arbitrary() {
        Ok(workers) => workers,
        Err(_) => return,
    };
    if workers.is_empty() {
        return;
    }

    let shared = SharedAllocator::new(BlockRangeAllocator::new(4096).unwrap());

    let threads: Vec<_> = workers
        .into_iter()
        .take(4)
        .map(|ops| {
            let shared = shared.clone();
            thread::spawn(move || {
                let mut live = Vec::new();
                for count in ops.counts.into_iter().take(64) {
                    if count % 3 == 0 {
                        if let Some(handle) = live.pop() {
                            assert!(shared.release(handle));
                        }
                    } else if let Some(handle) = shared.acquire(u32::from(count)) {
                        live.push(handle);
                    }
                }
                for handle in live {
                    assert!(shared.release(handle));
                }
            })
        })
        .collect();

    for t in threads {
        t.join().unwrap();
    }

    assert_eq!(shared.free_count(), 4096);
    shared.lock().check_invariants().unwrap();
});
