//! The in-band segment header and the raw layout shared by every segment,
//! real or sentinel.

use core::ptr::{self, NonNull};

/// Corruption probe checked on every release and at `finalize`. A single
/// constant gates all non-sentinel states; `state` itself is the actual
/// discriminator (see the spec's design notes on dual-magic sentinels).
pub(crate) const MAGIC: u32 = 0xC0A1_FEED;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum State {
  Free,
  Allocated,
  Sentinel,
}

/// In-band header embedded at the start of every segment, including the
/// dummy list-head segments used as sentinels.
///
/// `heap_{prev,next}` thread the registry described in ?4.2; `free_{prev,next}`
/// thread whichever size-class list currently owns the segment (meaningful
/// only while `state != Allocated`).
#[repr(C)]
pub(crate) struct Segment {
  pub(crate) heap_prev: *mut Segment,
  pub(crate) heap_next: *mut Segment,
  pub(crate) free_prev: *mut Segment,
  pub(crate) free_next: *mut Segment,
  pub(crate) size: usize,
  pub(crate) state: State,
  pub(crate) magic: u32,
}

/// Total header size, in bytes; also the allocator's payload alignment
/// boundary since segments are laid out back to back.
pub(crate) const HEADER_SIZE: usize = core::mem::size_of::<Segment>();

impl Segment {
  /// Writes a FREE segment header at `at`, covering `size` bytes including
  /// the header. List linkages are left null; the caller inserts the
  /// segment into the heap list (and, if applicable, a free list) itself.
  ///
  /// # Safety
  /// `at` must point to at least `size` bytes of writable memory obtained
  /// from the arena grower, and `size >= HEADER_SIZE`.
  pub(crate) unsafe fn init_free(at: *mut u8, size: usize) -> NonNull<Segment> {
    let raw = at.cast::<Segment>();
    unsafe {
      ptr::write(
        raw,
        Segment {
          heap_prev: ptr::null_mut(),
          heap_next: ptr::null_mut(),
          free_prev: ptr::null_mut(),
          free_next: ptr::null_mut(),
          size,
          state: State::Free,
          magic: MAGIC,
        },
      );
      NonNull::new_unchecked(raw)
    }
  }

  /// Writes a SENTINEL header at `at`, self-linked on both lists so an
  /// empty list is simply a sentinel pointing at itself.
  ///
  /// # Safety
  /// `at` must point to at least `HEADER_SIZE` bytes of writable memory.
  pub(crate) unsafe fn init_sentinel(at: *mut u8) -> NonNull<Segment> {
    let raw = at.cast::<Segment>();
    unsafe {
      let seg = NonNull::new_unchecked(raw);
      ptr::write(
        raw,
        Segment {
          heap_prev: raw,
          heap_next: raw,
          free_prev: raw,
          free_next: raw,
          size: 0,
          state: State::Sentinel,
          magic: 0,
        },
      );
      seg
    }
  }

  /// Payload start for a segment: the first byte after the header.
  #[inline]
  pub(crate) fn payload_ptr(seg: NonNull<Segment>) -> *mut u8 {
    unsafe { seg.as_ptr().cast::<u8>().add(HEADER_SIZE) }
  }

  /// Recovers the segment header from a payload pointer previously handed
  /// out by [`Segment::payload_ptr`].
  ///
  /// # Safety
  /// `ptr` must have been returned by a prior [`Segment::payload_ptr`] call
  /// on a still-live segment.
  pub(crate) unsafe fn from_payload(ptr: *mut u8) -> NonNull<Segment> {
    unsafe { NonNull::new_unchecked(ptr.sub(HEADER_SIZE).cast::<Segment>()) }
  }

  #[inline]
  pub(crate) fn addr(seg: NonNull<Segment>) -> usize {
    seg.as_ptr() as usize
  }
}
