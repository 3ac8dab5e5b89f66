//! Size-tracked backend for targets whose heap offers only allocate/free.
//!
//! Each allocation carries a hidden `usize` header with the requested size
//! (see [`TrackedBlock`]), which is what lets `reallocate` know how many
//! bytes to copy and `deallocate` find the raw block again.

use std::cmp;
use std::ffi::c_void;
use std::marker::PhantomData;
use std::ptr::{self, NonNull};

use crate::align;
use crate::allocator::Backend;
use crate::block::TrackedBlock;
use crate::fault_injection;

/// Raw allocate/free pair provided by the target.
///
/// # Safety
///
/// `raw_allocate` must return null or a block of at least `size` bytes
/// aligned for `usize`; `raw_free` must accept any block it returned.
pub unsafe trait RawHeap {
  unsafe fn raw_allocate(size: usize) -> *mut u8;

  unsafe fn raw_free(pointer: NonNull<u8>);
}

/// `malloc`/`free` from the C library, used without `realloc`/`calloc`.
pub struct LibcHeap;

unsafe impl RawHeap for LibcHeap {
  unsafe fn raw_allocate(size: usize) -> *mut u8 {
    unsafe { libc::malloc(size) as *mut u8 }
  }

  unsafe fn raw_free(pointer: NonNull<u8>) {
    unsafe { libc::free(pointer.as_ptr() as *mut c_void) }
  }
}

/// Emulates the full allocator contract on top of a [`RawHeap`].
pub struct SizeTracked<H = LibcHeap>(PhantomData<H>);

impl<H: RawHeap> SizeTracked<H> {
  fn allocate_block(size: usize) -> Option<TrackedBlock> {
    let request = align::raw_request(size)?;
    let raw = NonNull::new(unsafe { H::raw_allocate(request) })?;
    Some(unsafe { TrackedBlock::install(raw, size) })
  }

  unsafe fn release(block: TrackedBlock) {
    unsafe { H::raw_free(block.raw()) }
  }
}

/// Size recorded for a live payload returned by a size-tracked allocator.
///
/// # Safety
///
/// `pointer` must be a live payload from [`SizeTracked`].
pub unsafe fn tracked_size(pointer: NonNull<u8>) -> usize {
  unsafe { TrackedBlock::from_payload(pointer) }.size()
}

unsafe impl<H: RawHeap> Backend for SizeTracked<H> {
  unsafe fn allocate(
    size: usize,
    _state: *mut c_void,
  ) -> *mut u8 {
    if fault_injection::maybe_fail() {
      return ptr::null_mut();
    }
    match Self::allocate_block(size) {
      Some(block) => block.payload().as_ptr(),
      None => ptr::null_mut(),
    }
  }

  unsafe fn deallocate(
    pointer: *mut u8,
    _state: *mut c_void,
  ) {
    let Some(payload) = NonNull::new(pointer) else {
      return;
    };
    unsafe { Self::release(TrackedBlock::from_payload(payload)) }
  }

  unsafe fn reallocate(
    pointer: *mut u8,
    size: usize,
    _state: *mut c_void,
  ) -> *mut u8 {
    if fault_injection::maybe_fail() {
      return ptr::null_mut();
    }
    let Some(payload) = NonNull::new(pointer) else {
      return match Self::allocate_block(size) {
        Some(block) => block.payload().as_ptr(),
        None => ptr::null_mut(),
      };
    };
    let old = unsafe { TrackedBlock::from_payload(payload) };

    if old.size() == size {
      return pointer;
    }

    let Some(new) = Self::allocate_block(size) else {
      tracing::trace!(old_size = old.size(), new_size = size, "tracked reallocation failed");
      return ptr::null_mut();
    };

    let copied = cmp::min(old.size(), size);
    unsafe {
      ptr::copy_nonoverlapping(old.payload().as_ptr(), new.payload().as_ptr(), copied);
      Self::release(old);
    }
    tracing::trace!(old_size = old.size(), new_size = size, copied, "tracked reallocation");

    new.payload().as_ptr()
  }

  unsafe fn zero_allocate(
    count: usize,
    element_size: usize,
    _state: *mut c_void,
  ) -> *mut u8 {
    if fault_injection::maybe_fail() {
      return ptr::null_mut();
    }
    let Some(size) = align::array_bytes(count, element_size) else {
      return ptr::null_mut();
    };
    let Some(block) = Self::allocate_block(size) else {
      return ptr::null_mut();
    };
    unsafe { block.payload().as_ptr().write_bytes(0, size) };
    block.payload().as_ptr()
  }
}
