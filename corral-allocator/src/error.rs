use std::fmt;

/// Failure modes surfaced by the allocator's internal growth path.
///
/// This type never crosses the public `Allocator::allocate` boundary: callers
/// see a null pointer on exhaustion, exactly as the spec's "address or null"
/// contract describes. It exists so the growth path itself can propagate
/// failures with `?` instead of threading `Option` through several private
/// helpers.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
  /// The OS refused to extend the program break by the requested amount.
  ArenaExhausted {
    /// Number of bytes that were requested from the arena grower.
    requested: usize,
  },
}

impl fmt::Display for Error {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::ArenaExhausted { requested } => {
        write!(f, "failed to extend the arena by {requested} bytes")
      }
    }
  }
}

impl std::error::Error for Error {}
