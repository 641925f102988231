use core::fmt;
use core::ptr;
use std::sync::Mutex;

use crate::grower::ArenaGrower;
use crate::list::{FreeList, HeapList};
use crate::segment::{Segment, State, HEADER_SIZE, MAGIC};
use crate::size_class::{destination_index, source_index, FREE_MIN, NUM_CLASSES};

/// A thread-safe segregated free-list allocator growing its arena from the
/// OS program break.
///
/// Every public entry point (`allocate`, `release`, `finalize`) takes the
/// same internal lock on entry and releases it on exit (?5); there is no
/// lock-free fast path and no per-thread caching. Share an `Allocator`
/// across threads the ordinary way, with `std::sync::Arc`.
pub struct Allocator {
  inner: Mutex<Inner>,
}

struct Inner {
  heap: HeapList,
  free_lists: [FreeList; NUM_CLASSES],
  grower: ArenaGrower,
  arena_bytes: usize,
}

// SAFETY: every pointer `Inner` touches lives in arena memory owned
// exclusively by this allocator and is only ever accessed while the
// allocator's mutex is held.
unsafe impl Send for Inner {}

impl Allocator {
  /// Builds a new allocator, carving the sentinel list heads out of a
  /// one-time, exact (non-chunk-rounded) break extension (?4.7).
  ///
  /// # Panics
  /// Panics if the very first extension request to the OS fails; there is
  /// no sensible fallback for an allocator that cannot even obtain its own
  /// bookkeeping storage.
  pub fn new() -> Self {
    let grower = ArenaGrower::new();
    let sentinel_bytes = (NUM_CLASSES + 1) * HEADER_SIZE;
    let base = grower
      .extend_exact(sentinel_bytes)
      .expect("failed to obtain initial sentinel storage from the OS");

    // SAFETY: `base` points at `sentinel_bytes` bytes of fresh, writable
    // memory from the grower, large enough for `NUM_CLASSES + 1` headers.
    let heap_sentinel = unsafe { Segment::init_sentinel(base) };
    let free_lists = core::array::from_fn(|i| unsafe {
      let at = base.add(HEADER_SIZE * (i + 1));
      FreeList::new(Segment::init_sentinel(at))
    });

    Self {
      inner: Mutex::new(Inner {
        heap: HeapList::new(heap_sentinel),
        free_lists,
        grower,
        arena_bytes: sentinel_bytes,
      }),
    }
  }

  /// Allocates `size` bytes, returning a payload pointer or null.
  ///
  /// Returns null for `size == 0` and when the arena cannot be grown any
  /// further; both are silent, recoverable failures (?7 category 1 and 2).
  pub fn allocate(&self, size: usize) -> *mut u8 {
    if size == 0 {
      return ptr::null_mut();
    }
    let need = (size + HEADER_SIZE).max(FREE_MIN);

    let mut inner = self.inner.lock().unwrap();
    match inner.acquire_candidate(need) {
      Some(candidate) => inner.split_and_mark_allocated(candidate, need),
      None => ptr::null_mut(),
    }
  }

  /// Returns a payload pointer previously obtained from [`Allocator::allocate`]
  /// to the allocator. `ptr` being null is a no-op.
  ///
  /// # Safety
  /// `ptr` must either be null or a payload pointer returned by this same
  /// allocator's `allocate` and not already released. Violations are
  /// detected via magic-tag and state assertions when feasible, but this is
  /// a caller contract, not a guarantee (?7 category 3).
  pub unsafe fn release(&self, ptr: *mut u8) {
    if ptr.is_null() {
      return;
    }
    // SAFETY: forwarded from the caller's contract above.
    let seg = unsafe { Segment::from_payload(ptr) };
    let mut inner = self.inner.lock().unwrap();
    // SAFETY: `seg` is a valid, currently-allocated segment per the
    // caller's contract.
    unsafe { inner.release_segment(seg) };
  }

  /// Verifies quiescence: every free list but the last is empty, the last
  /// holds exactly one segment, and the heap list holds exactly one
  /// non-sentinel FREE segment. Intended only for test shutdown (?4.6).
  ///
  /// # Panics
  /// Panics on any invariant violation -- this is a debug-only check, not a
  /// recoverable runtime path.
  pub fn finalize(&self) {
    let inner = self.inner.lock().unwrap();
    for (i, list) in inner.free_lists.iter().enumerate().take(NUM_CLASSES - 1) {
      assert!(
        list.is_empty(),
        "finalize: free list {i} is not empty; outstanding allocation or leak"
      );
    }

    let last = &inner.free_lists[NUM_CLASSES - 1];
    assert!(
      last.is_singleton(),
      "finalize: expected exactly one free segment in the top class"
    );
    // SAFETY: `is_singleton` just confirmed this node is a real, linked
    // segment, not the sentinel.
    unsafe {
      assert_eq!((*last.first().as_ptr()).magic, MAGIC, "finalize: corrupted top-class segment");
    }

    assert!(
      inner.heap.is_singleton(),
      "finalize: expected exactly one segment on the heap list"
    );
    let node = inner.heap.first();
    // SAFETY: `is_singleton` just confirmed this node is a real segment.
    unsafe {
      assert_eq!((*node.as_ptr()).state, State::Free, "finalize: surviving segment is not FREE");
      assert_eq!((*node.as_ptr()).magic, MAGIC, "finalize: corrupted heap-list segment");
    }
  }

  /// Total bytes obtained from the OS so far, including the one-time
  /// sentinel bootstrap block.
  pub fn arena_bytes(&self) -> usize {
    self.inner.lock().unwrap().arena_bytes
  }
}

impl Default for Allocator {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Debug for Allocator {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let inner = self.inner.lock().unwrap();
    let free_bytes: usize = inner
      .free_lists
      .iter()
      .flat_map(|list| list.iter())
      .map(|seg| unsafe { (*seg.as_ptr()).size })
      .sum();
    let occupancy: Vec<usize> = inner.free_lists.iter().map(|list| list.len()).collect();

    f.debug_struct("Allocator")
      .field("arena_bytes", &inner.arena_bytes)
      .field("allocated_bytes", &(inner.arena_bytes - free_bytes))
      .field("free_list_occupancy", &occupancy)
      .finish_non_exhaustive()
  }
}

impl Inner {
  /// Steps 3-6 of ?4.4: locate or manufacture a candidate segment, already
  /// detached from whichever free list (if any) it came from.
  fn acquire_candidate(&mut self, need: usize) -> Option<core::ptr::NonNull<Segment>> {
    let src = source_index(need);
    if src < NUM_CLASSES - 1 {
      if let Some(seg) = self.free_lists[src].pop() {
        return Some(seg);
      }
    }

    let last = &self.free_lists[NUM_CLASSES - 1];
    if let Some(seg) = last.find_fit(need) {
      // SAFETY: `seg` came from this same list via `find_fit`.
      unsafe { last.remove(seg) };
      return Some(seg);
    }

    self.extend_for(need)
  }

  /// Step 6: grow the arena and hand back the fresh region as a candidate,
  /// already linked into the heap list but deliberately absent from any
  /// free list.
  fn extend_for(&mut self, need: usize) -> Option<core::ptr::NonNull<Segment>> {
    let (start, granted) = self.grower.extend(need).ok()?;
    self.arena_bytes += granted;
    // SAFETY: `start` points at `granted` fresh bytes from the grower.
    let seg = unsafe { Segment::init_free(start, granted) };
    // SAFETY: `seg` is a freshly initialized, unlinked segment; its
    // address is higher than every previously granted segment (the break
    // only grows), so the front of the descending list is the right spot.
    unsafe { self.heap.push_front(seg) };
    Some(seg)
  }

  /// Step 7-8 of ?4.4: decide whether to split `candidate`, mark the
  /// caller's portion ALLOCATED, and return its payload pointer.
  fn split_and_mark_allocated(&mut self, candidate: core::ptr::NonNull<Segment>, need: usize) -> *mut u8 {
    unsafe {
      let candidate_size = (*candidate.as_ptr()).size;
      let remainder = candidate_size - need;

      if remainder < FREE_MIN {
        (*candidate.as_ptr()).state = State::Allocated;
      } else {
        let remainder_ptr = candidate.as_ptr().cast::<u8>().add(need);
        let remainder_seg = Segment::init_free(remainder_ptr, remainder);
        self.heap.insert_before(candidate, remainder_seg);

        (*candidate.as_ptr()).size = need;
        (*candidate.as_ptr()).state = State::Allocated;

        let dst = destination_index(remainder);
        self.free_lists[dst].push(remainder_seg);
      }

      Segment::payload_ptr(candidate)
    }
  }

  /// ?4.5: coalesce `seg` with any FREE physical neighbors and file the
  /// surviving segment onto its destination free list.
  ///
  /// # Safety
  /// `seg` must be a currently-ALLOCATED segment belonging to this
  /// allocator.
  unsafe fn release_segment(&mut self, seg: core::ptr::NonNull<Segment>) {
    unsafe {
      assert_eq!(
        (*seg.as_ptr()).magic,
        MAGIC,
        "release: corrupted or invalid segment header"
      );
      assert_eq!(
        (*seg.as_ptr()).state,
        State::Allocated,
        "release: double free, or release of a pointer this allocator never returned"
      );

      let mut surviving = seg;

      // Coalesce with the higher physical neighbor (listed immediately
      // before `seg` in the descending heap list).
      let hi = self.heap.prev(surviving);
      if (*hi.as_ptr()).state == State::Free {
        assert_eq!(
          Segment::addr(hi),
          Segment::addr(surviving) + (*surviving.as_ptr()).size,
          "release: heap-list adjacency invariant violated"
        );
        let hi_dst = destination_index((*hi.as_ptr()).size);
        self.free_lists[hi_dst].remove(hi);
        self.heap.remove(hi);
        (*surviving.as_ptr()).size += (*hi.as_ptr()).size;
      }

      // Coalesce with the lower physical neighbor (listed immediately
      // after `seg`); on merge, `lo` becomes the surviving node since it
      // keeps its own heap-list position.
      let lo = self.heap.next(surviving);
      if (*lo.as_ptr()).state == State::Free {
        assert_eq!(
          Segment::addr(surviving),
          Segment::addr(lo) + (*lo.as_ptr()).size,
          "release: heap-list adjacency invariant violated"
        );
        let lo_dst = destination_index((*lo.as_ptr()).size);
        self.heap.remove(surviving);
        self.free_lists[lo_dst].remove(lo);
        (*lo.as_ptr()).size += (*surviving.as_ptr()).size;
        surviving = lo;
      }

      (*surviving.as_ptr()).state = State::Free;
      let dst = destination_index((*surviving.as_ptr()).size);
      self.free_lists[dst].push(surviving);
    }
  }
}
