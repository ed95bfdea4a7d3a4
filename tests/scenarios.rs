// Black-box scenario tests driven purely through the public API.

use allocbench::best_fit::BestFitAllocator;
use allocbench::mkc::MkcAllocator;
use allocbench::os::PAGE_SIZE;

// S1 — Best-Fit tight split: freeing a block and re-requesting the same
// size must reuse exactly the hole just vacated.
#[test]
fn s1_best_fit_tight_split() {
    let mut a = BestFitAllocator::create(4096).unwrap();
    let p1 = a.alloc(32);
    let p2 = a.alloc(32);
    assert!(!p1.is_null() && !p2.is_null());
    a.free(p1);
    let p3 = a.alloc(32);
    assert_eq!(p1, p3);
}

// S2 — Best-Fit coalesce after 1000 frees: 1001 equal-sized blocks
// allocated then freed in allocation order must end up as one free block
// spanning the whole region.
#[test]
fn s2_best_fit_coalesce_after_thousand_frees() {
    let region = 1100 * 64;
    let mut a = BestFitAllocator::create(region).unwrap();
    let mut pointers = Vec::new();
    for _ in 0..=1000 {
        let p = a.alloc(32);
        assert!(!p.is_null());
        pointers.push(p);
    }
    for &p in &pointers {
        a.free(p);
    }
    assert_eq!(a.free_memory(), region);
}

// S3 — MKC small-class reuse: freeing the sole occupant of a class page
// and re-requesting the same size must return the same address.
#[test]
fn s3_mkc_small_class_reuse() {
    let mut a = MkcAllocator::create(2 * PAGE_SIZE).unwrap();
    let p1 = a.alloc(10);
    assert!(!p1.is_null());
    a.free(p1);
    let p2 = a.alloc(10);
    assert_eq!(p1, p2);
}

// S4 — MKC class boundary: 16 → class 0, 17 → class 1, 2048 → class 7,
// 2049 → the large path.
#[test]
fn s4_mkc_class_boundary() {
    let mut a = MkcAllocator::create(9 * PAGE_SIZE).unwrap();
    let p16 = a.alloc(16);
    let p17 = a.alloc(17);
    let p2048 = a.alloc(2048);
    let p2049 = a.alloc(2049);
    assert!(!p16.is_null() && !p17.is_null() && !p2048.is_null() && !p2049.is_null());
}

// S5 — MKC large block: a 3-page allocation must not corrupt state, and a
// subsequent 5-page request against the remaining pages either succeeds
// distinctly or fails cleanly.
#[test]
fn s5_mkc_large_block() {
    let mut a = MkcAllocator::create(9 * PAGE_SIZE).unwrap();
    let p1 = a.alloc(3 * PAGE_SIZE - 1);
    assert!(!p1.is_null());
    let p2 = a.alloc(5 * PAGE_SIZE);
    if !p2.is_null() {
        assert_ne!(p1, p2);
    }
}

// S6 — utilization under uniform random workload: a long run of
// allocate-only requests against a fixed region must never panic or loop,
// for either allocator.
#[test]
fn s6_uniform_workload_never_panics() {
    use allocbench::harness::{run, WorkloadConfig};

    let config = WorkloadConfig {
        num_operations: 100_000,
        max_block_size: 128,
        region_size: 4 * 1024 * 1024,
        seed: 1_234_567,
    };
    assert!(run::<BestFitAllocator>(&config).is_ok());
    assert!(run::<MkcAllocator>(&config).is_ok());
}
