use thiserror::Error;

/// Failures surfaced by the checked allocator operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
  /// One or more operation slots are unset.
  #[error("invalid allocator or allocator function pointers")]
  InvalidAllocator,
  /// The underlying primitive could not satisfy the request.
  #[error("failed to allocate {size} bytes")]
  AllocationFailed { size: usize },
  /// `count * element_size` does not fit in `usize`.
  #[error("zero-allocation of {count} elements of {element_size} bytes overflows")]
  SizeOverflow { count: usize, element_size: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
