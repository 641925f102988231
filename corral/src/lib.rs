#![doc = include_str!("../README.md")]
#![deny(missing_docs)]

use core::ops::{Deref, DerefMut};
use core::ptr::NonNull;

pub use corral_allocator::{Allocator, Error};

/// A block of arena memory, released back to its owning [`Allocator`]
/// automatically when dropped.
///
/// Borrows the allocator for its own lifetime, so a block can never outlive
/// the allocator it would need to release into.
pub struct AllocatedBlock<'a> {
  ptr: NonNull<u8>,
  len: usize,
  allocator: &'a Allocator,
}

impl<'a> AllocatedBlock<'a> {
  /// Wraps a raw allocation in an RAII guard.
  ///
  /// # Safety
  /// `ptr` must be a non-null payload pointer of at least `len` bytes,
  /// obtained from `allocator` and not already wrapped or released.
  unsafe fn new(ptr: NonNull<u8>, len: usize, allocator: &'a Allocator) -> Self {
    Self { ptr, len, allocator }
  }

  /// Number of bytes available in this block.
  pub fn len(&self) -> usize {
    self.len
  }

  /// `true` if this block has zero length.
  pub fn is_empty(&self) -> bool {
    self.len == 0
  }
}

impl Deref for AllocatedBlock<'_> {
  type Target = [u8];

  fn deref(&self) -> &[u8] {
    // SAFETY: `ptr` and `len` were established by `new`'s caller contract
    // and this block holds exclusive access to that range until dropped.
    unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
  }
}

impl DerefMut for AllocatedBlock<'_> {
  fn deref_mut(&mut self) -> &mut [u8] {
    // SAFETY: see `Deref::deref`.
    unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
  }
}

impl Drop for AllocatedBlock<'_> {
  fn drop(&mut self) {
    // SAFETY: `self.ptr` was obtained from `self.allocator` and is released
    // exactly once, here, as this guard is consumed.
    unsafe { self.allocator.release(self.ptr.as_ptr()) };
  }
}

/// Convenience methods for allocating RAII-guarded blocks directly.
pub trait AllocatorExt {
  /// Allocates `size` bytes, returning a guard that releases itself on
  /// drop, or `None` if the arena is exhausted.
  fn alloc_block(&self, size: usize) -> Option<AllocatedBlock<'_>>;
}

impl AllocatorExt for Allocator {
  fn alloc_block(&self, size: usize) -> Option<AllocatedBlock<'_>> {
    let raw = self.allocate(size);
    let ptr = NonNull::new(raw)?;
    // SAFETY: `raw` is a live allocation of exactly `size` bytes from
    // `self`, returned fresh this call and not yet wrapped.
    Some(unsafe { AllocatedBlock::new(ptr, size, self) })
  }
}
