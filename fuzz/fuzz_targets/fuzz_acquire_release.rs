#![no_main]
use blockrange::{AllocatorBuilder, Handle};
use libfuzzer_sys::{arbitrary::{Arbitrary, Unstructured}, fuzz_target};

#[derive(Debug, Arbitrary)]
enum Op {
    Acquire(u16),
    Release(u16),
    ReleaseTwice(u16),
    Reset,
}

fuzz_target!(|input: &[u8]| {
    let mut u = Unstructured::new(input);

    let max_blocks: u16 = match u.arbitrary() {
        Ok(n) => n,
        Err(_) => return,
    };
    let ops: Vec<Op> = match u.arbitrary() {
        Ok(ops) => ops,
        Err(_) => return,
    };

    let built = AllocatorBuilder::new()
        .max_blocks(u32::from(max_blocks))
        .strict_release(false)
        .build();
    let mut alloc = match built {
        Ok(alloc) => alloc,
        Err(_) => return,
    };
    let mut live: Vec<Handle> = Vec::new();

    for op in ops.iter().take(512) {
        match *op {
            Op::Acquire(count) => {
                if let Some(handle) = alloc.acquire(u32::from(count)) {
                    live.push(handle);
                }
            }
            Op::Release(pick) if !live.is_empty() => {
                let handle = live.swap_remove(pick as usize % live.len());
                assert!(alloc.release(handle));
            }
            Op::ReleaseTwice(pick) if !live.is_empty() => {
                let handle = live.swap_remove(pick as usize % live.len());
                assert!(alloc.release(handle));
                assert!(!alloc.release(handle));
            }
            Op::Reset => {
                alloc.reset().unwrap();
                for handle in live.drain(..) {
                    assert!(!alloc.release(handle));
                }
            }
            _ => {}
        }

        let held: u32 = live.iter().map(Handle::count).sum();
        assert_eq!(alloc.free_count() + held, u32::from(max_blocks));
        alloc.check_invariants().unwrap();
    }
});
