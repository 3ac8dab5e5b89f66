use std::mem;

/// Width of the hidden size header that precedes every size-tracked payload.
pub const HEADER_SIZE: usize = mem::size_of::<usize>();

/// Rounds `$value` up to the machine word, returning `None` on overflow.
///
/// # Examples
///
/// ```rust
/// use std::mem;
/// use plugalloc::align;
///
/// match mem::size_of::<usize>() {
///     8 => assert_eq!(align!(13), Some(16)), // 64 bit machine.
///     4 => assert_eq!(align!(11), Some(12)), // 32 bit machine.
///     _ => {},
/// };
/// assert_eq!(align!(usize::MAX), None);
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    ($value as usize)
      .checked_add(::std::mem::size_of::<usize>() - 1)
      .map(|v| v & !(::std::mem::size_of::<usize>() - 1))
  };
}

/// Number of raw bytes the size-tracked backend requests for a payload of
/// `size` bytes: one header word plus the payload, rounded up to the word.
pub fn raw_request(size: usize) -> Option<usize> {
  HEADER_SIZE.checked_add(size).and_then(|total| align!(total))
}

/// Byte count of `count` elements of `element_size` bytes each.
pub fn array_bytes(
  count: usize,
  element_size: usize,
) -> Option<usize> {
  count.checked_mul(element_size)
}
