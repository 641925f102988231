//! Arena growth via the POSIX program break (`sbrk`).
//!
//! This mirrors the source program's direct `sbrk()` calls rather than
//! approximating the "classical data-segment break adjustment" described in
//! the spec with a portable memory-mapping primitive. Every call into this
//! module happens while the allocator's global lock is held, so concurrent
//! callers never race each other on the break.

use crate::error::Error;

/// Fixed chunk granularity for arena growth requests.
pub(crate) const SBRK_CHUNK: usize = 1 << 18; // 256 KiB

#[cfg(not(unix))]
compile_error!("corral-allocator requires a unix target exposing sbrk(2)");

/// Issues `sbrk`-based extension requests against the process break.
///
/// # Safety contract
/// All methods assume the caller is holding the allocator's own lock, so
/// this grower is the only thing moving the break for the lifetime of the
/// owning `Allocator`. Sharing a process break with another allocator (the
/// system allocator included, if it also grows via `brk`) is outside what
/// this type can make safe; it exists for a self-contained allocator that
/// owns the break for as long as it runs.
pub(crate) struct ArenaGrower {
  _private: (),
}

impl ArenaGrower {
  pub(crate) const fn new() -> Self {
    Self { _private: () }
  }

  /// Extends the break by exactly `bytes`, with no chunk rounding.
  ///
  /// Used exactly once, at bootstrap, to carve the sentinel list heads
  /// before any segment exists (see `Allocator::new`).
  pub(crate) fn extend_exact(&self, bytes: usize) -> Result<*mut u8, Error> {
    self.raw_sbrk(bytes)
  }

  /// Extends the break by `requested` bytes rounded up to a multiple of
  /// [`SBRK_CHUNK`]. Returns the previous break (start of the newly granted
  /// region) and the actual number of bytes granted.
  pub(crate) fn extend(&self, requested: usize) -> Result<(*mut u8, usize), Error> {
    let granted = round_up(requested, SBRK_CHUNK);
    let ptr = self.raw_sbrk(granted)?;
    Ok((ptr, granted))
  }

  fn raw_sbrk(&self, bytes: usize) -> Result<*mut u8, Error> {
    // SAFETY: `bytes` is always a small multiple of a segment or chunk size
    // here, well within `intptr_t` range, and never negative -- the arena
    // only grows, matching the allocator's "never returned to the OS"
    // contract.
    let prev = unsafe { libc::sbrk(bytes as libc::intptr_t) };
    if prev as isize == -1 {
      return Err(Error::ArenaExhausted { requested: bytes });
    }
    Ok(prev as *mut u8)
  }
}

const fn round_up(n: usize, chunk: usize) -> usize {
  (n + chunk - 1) / chunk * chunk
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn round_up_exact_multiple_is_unchanged() {
    assert_eq!(round_up(SBRK_CHUNK, SBRK_CHUNK), SBRK_CHUNK);
  }

  #[test]
  fn round_up_rounds_to_next_chunk() {
    assert_eq!(round_up(1, SBRK_CHUNK), SBRK_CHUNK);
    assert_eq!(round_up(SBRK_CHUNK + 1, SBRK_CHUNK), 2 * SBRK_CHUNK);
  }
}
