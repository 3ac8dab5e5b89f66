use std::ptr::NonNull;

use crate::align::HEADER_SIZE;

/// Handle to one size-tracked allocation.
///
/// The raw block returned by the heap primitive starts with a `usize`
/// header holding the caller-requested size; the payload handed out to
/// callers begins right after it:
///
/// ```text
///   raw ──► ┌────────────┬──────────────────────────┐
///           │ size: N    │      N payload bytes     │
///           └────────────┴──────────────────────────┘
///                        ▲
///                        └── payload (returned to caller)
/// ```
///
/// All pointer arithmetic between the two addresses lives here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackedBlock {
  raw: NonNull<usize>,
  size: usize,
}

impl TrackedBlock {
  /// Installs the size header at the start of a freshly obtained raw block.
  ///
  /// # Safety
  ///
  /// `raw` must point to at least `HEADER_SIZE + size` writable bytes,
  /// aligned for `usize`.
  pub unsafe fn install(
    raw: NonNull<u8>,
    size: usize,
  ) -> Self {
    let raw = raw.cast::<usize>();
    unsafe { raw.as_ptr().write(size) };
    Self { raw, size }
  }

  /// Recovers the block that owns `payload` by reading the header before it.
  ///
  /// # Safety
  ///
  /// `payload` must have been produced by [`TrackedBlock::payload`] and its
  /// block must not have been released.
  pub unsafe fn from_payload(payload: NonNull<u8>) -> Self {
    let raw = unsafe { payload.sub(HEADER_SIZE) }.cast::<usize>();
    let size = unsafe { raw.as_ptr().read() };
    Self { raw, size }
  }

  /// Tracked (caller-requested) size in bytes.
  pub fn size(&self) -> usize {
    self.size
  }

  /// Start of the raw block, as the heap primitive returned it.
  pub fn raw(&self) -> NonNull<u8> {
    self.raw.cast()
  }

  /// First payload byte.
  pub fn payload(&self) -> NonNull<u8> {
    unsafe { self.raw.cast::<u8>().add(HEADER_SIZE) }
  }
}
