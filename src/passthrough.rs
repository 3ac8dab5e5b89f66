use std::ffi::c_void;
use std::ptr;

use crate::allocator::Backend;
use crate::fault_injection;

/// Forwards every operation to the host's `malloc` family, ignoring `state`.
///
/// A resize to zero bytes asks `realloc` for one byte instead, so a null
/// result always means the original block is still live.
pub struct PassThrough;

unsafe impl Backend for PassThrough {
  unsafe fn allocate(
    size: usize,
    _state: *mut c_void,
  ) -> *mut u8 {
    if fault_injection::maybe_fail() {
      return ptr::null_mut();
    }
    unsafe { libc::malloc(size) as *mut u8 }
  }

  unsafe fn deallocate(
    pointer: *mut u8,
    _state: *mut c_void,
  ) {
    unsafe { libc::free(pointer as *mut c_void) }
  }

  unsafe fn reallocate(
    pointer: *mut u8,
    size: usize,
    _state: *mut c_void,
  ) -> *mut u8 {
    if fault_injection::maybe_fail() {
      return ptr::null_mut();
    }
    unsafe { libc::realloc(pointer as *mut c_void, size.max(1)) as *mut u8 }
  }

  unsafe fn zero_allocate(
    count: usize,
    element_size: usize,
    _state: *mut c_void,
  ) -> *mut u8 {
    if fault_injection::maybe_fail() {
      return ptr::null_mut();
    }
    unsafe { libc::calloc(count, element_size) as *mut u8 }
  }
}
