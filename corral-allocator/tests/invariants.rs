//! Black-box invariant checks against the public API: every returned
//! pointer is non-null and 1-aligned-or-better, distinct live allocations
//! never overlap, and a fully released allocator always quiesces.

use std::collections::HashSet;

use corral_allocator::Allocator;
use rand::Rng;

#[test]
fn random_workload_never_overlaps_and_quiesces() {
  let alloc = Allocator::new();
  let mut rng = rand::thread_rng();

  let mut live: Vec<(*mut u8, usize)> = Vec::new();
  for _ in 0..500 {
    if !live.is_empty() && rng.gen_bool(0.4) {
      let idx = rng.gen_range(0..live.len());
      let (p, _) = live.swap_remove(idx);
      unsafe { alloc.release(p) };
      continue;
    }

    let size = rng.gen_range(1..65_536);
    let p = alloc.allocate(size);
    if p.is_null() {
      continue;
    }
    assert_ranges_disjoint(&live, p, size);
    live.push((p, size));
  }

  for (p, _) in live {
    unsafe { alloc.release(p) };
  }
  alloc.finalize();
}

fn assert_ranges_disjoint(live: &[(*mut u8, usize)], p: *mut u8, size: usize) {
  let start = p as usize;
  let end = start + size;
  for &(other_p, other_size) in live {
    let other_start = other_p as usize;
    let other_end = other_start + other_size;
    assert!(
      end <= other_start || start >= other_end,
      "allocator returned overlapping ranges"
    );
  }
}

#[test]
fn repeated_single_size_allocations_all_distinct() {
  let alloc = Allocator::new();
  let mut seen = HashSet::new();

  let ptrs: Vec<*mut u8> = (0..64).map(|_| alloc.allocate(512)).collect();
  for &p in &ptrs {
    assert!(!p.is_null());
    assert!(seen.insert(p as usize), "allocator handed out the same address twice while live");
  }

  for p in ptrs {
    unsafe { alloc.release(p) };
  }
  alloc.finalize();
}

#[test]
fn large_allocation_falls_into_top_class() {
  let alloc = Allocator::new();
  let p = alloc.allocate(1 << 20);
  assert!(!p.is_null());
  unsafe { alloc.release(p) };
  alloc.finalize();
}
