//! Concurrent stress scenario mirroring the source program's pthread
//! worker-thread harness: many threads repeatedly allocate a batch of
//! randomly sized blocks, hold them briefly, then release them, all
//! against one shared allocator.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use corral_allocator::Allocator;
use rand::Rng;

const WORKERS: usize = 50;
const ROUNDS: usize = 10;
const BATCH: usize = 8;
const MAX_SIZE: usize = 4096;

#[test]
fn concurrent_allocate_release_survives_and_quiesces() {
  let alloc = Arc::new(Allocator::new());

  let handles: Vec<_> = (0..WORKERS)
    .map(|_| {
      let alloc = Arc::clone(&alloc);
      thread::spawn(move || {
        let mut rng = rand::thread_rng();
        for _ in 0..ROUNDS {
          let sizes: Vec<usize> = (0..BATCH).map(|_| rng.gen_range(1..MAX_SIZE)).collect();
          let ptrs: Vec<*mut u8> = sizes.iter().map(|&s| alloc.allocate(s)).collect();

          for (&p, &s) in ptrs.iter().zip(sizes.iter()) {
            if p.is_null() {
              continue;
            }
            // SAFETY: `p` is a fresh allocation of at least `s` bytes,
            // exclusively owned by this thread until released below.
            unsafe { std::ptr::write_bytes(p, 0x5A, s) };
          }

          thread::sleep(Duration::from_micros(50));

          for p in ptrs {
            if p.is_null() {
              continue;
            }
            // SAFETY: `p` came from this same allocator and is released
            // exactly once, here.
            unsafe { alloc.release(p) };
          }
        }
      })
    })
    .collect();

  for h in handles {
    h.join().expect("worker thread panicked");
  }

  alloc.finalize();
}
