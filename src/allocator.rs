use std::ffi::c_void;
use std::ptr::{self, NonNull};

use crate::align;
use crate::error::{Error, Result};

pub type AllocateFn = unsafe fn(size: usize, state: *mut c_void) -> *mut u8;
pub type DeallocateFn = unsafe fn(pointer: *mut u8, state: *mut c_void);
pub type ReallocateFn = unsafe fn(pointer: *mut u8, size: usize, state: *mut c_void) -> *mut u8;
pub type ZeroAllocateFn =
  unsafe fn(count: usize, element_size: usize, state: *mut c_void) -> *mut u8;

/// An allocation strategy that can be bound into an [`Allocator`].
///
/// Every function receives the allocator's opaque `state` verbatim and
/// reports failure with a null pointer.
///
/// # Safety
///
/// Implementors must honor the usual allocator contract: `allocate`,
/// `reallocate` and `zero_allocate` return null or a live block of at least
/// the requested size, `deallocate` accepts null as a no-op,
/// `reallocate(null, n)` behaves as `allocate(n)`, a null from
/// `reallocate` leaves the original block valid (this includes `n == 0`),
/// and `zero_allocate` returns zero-filled memory or null (never an
/// undersized block on `count * element_size` overflow).
///
/// The functions must be sound for any `state` value, since
/// [`Allocator::from_backend`] is safe. Strategies that interpret `state`
/// are bound with [`Allocator::from_raw_parts`] instead.
pub unsafe trait Backend {
  unsafe fn allocate(
    size: usize,
    state: *mut c_void,
  ) -> *mut u8;

  unsafe fn deallocate(
    pointer: *mut u8,
    state: *mut c_void,
  );

  unsafe fn reallocate(
    pointer: *mut u8,
    size: usize,
    state: *mut c_void,
  ) -> *mut u8;

  unsafe fn zero_allocate(
    count: usize,
    element_size: usize,
    state: *mut c_void,
  ) -> *mut u8;
}

/// A pluggable allocator: four operation slots plus an opaque state handle.
///
/// The value is usable only while every slot is set (see
/// [`Allocator::is_valid`]). `state` is owned by whoever supplied it; the
/// allocator merely forwards it to each slot.
#[derive(Debug, Clone, Copy)]
pub struct Allocator {
  pub(crate) allocate: Option<AllocateFn>,
  pub(crate) deallocate: Option<DeallocateFn>,
  pub(crate) reallocate: Option<ReallocateFn>,
  pub(crate) zero_allocate: Option<ZeroAllocateFn>,
  pub(crate) state: *mut c_void,
}

/// The four operations of a valid allocator, unpacked.
#[derive(Clone, Copy)]
struct Slots {
  allocate: AllocateFn,
  deallocate: DeallocateFn,
  reallocate: ReallocateFn,
  zero_allocate: ZeroAllocateFn,
}

impl Default for Allocator {
  fn default() -> Self {
    Self::zero_initialized()
  }
}

impl Allocator {
  /// An allocator with every slot unset. Never valid; meant as a
  /// placeholder for storage that is initialized later.
  pub const fn zero_initialized() -> Self {
    Self {
      allocate: None,
      deallocate: None,
      reallocate: None,
      zero_allocate: None,
      state: ptr::null_mut(),
    }
  }

  /// Binds the four functions of backend `B` together with `state`.
  pub fn from_backend<B: Backend>(state: *mut c_void) -> Self {
    Self {
      allocate: Some(B::allocate),
      deallocate: Some(B::deallocate),
      reallocate: Some(B::reallocate),
      zero_allocate: Some(B::zero_allocate),
      state,
    }
  }

  /// Builds an allocator from individual slots, any of which may be unset.
  ///
  /// # Safety
  ///
  /// The set slots must honor the [`Backend`] contract when called with
  /// `state`. The checked methods trust whatever they return.
  pub const unsafe fn from_raw_parts(
    allocate: Option<AllocateFn>,
    deallocate: Option<DeallocateFn>,
    reallocate: Option<ReallocateFn>,
    zero_allocate: Option<ZeroAllocateFn>,
    state: *mut c_void,
  ) -> Self {
    Self {
      allocate,
      deallocate,
      reallocate,
      zero_allocate,
      state,
    }
  }

  /// Same operations, different state handle.
  ///
  /// # Safety
  ///
  /// The operations must honor the [`Backend`] contract with the new
  /// `state`.
  pub unsafe fn with_state(
    self,
    state: *mut c_void,
  ) -> Self {
    Self { state, ..self }
  }

  /// The opaque state forwarded to every slot.
  pub fn state(&self) -> *mut c_void {
    self.state
  }

  pub fn is_valid(&self) -> bool {
    self.slots().is_ok()
  }

  /// Whether both allocators carry the same four operations.
  pub fn same_operations(
    &self,
    other: &Allocator,
  ) -> bool {
    same_fn(self.allocate, other.allocate, |a, b| ptr::fn_addr_eq(a, b))
      && same_fn(self.deallocate, other.deallocate, |a, b| ptr::fn_addr_eq(a, b))
      && same_fn(self.reallocate, other.reallocate, |a, b| ptr::fn_addr_eq(a, b))
      && same_fn(self.zero_allocate, other.zero_allocate, |a, b| ptr::fn_addr_eq(a, b))
  }

  /// Allocates `size` uninitialized bytes.
  pub fn allocate(
    &self,
    size: usize,
  ) -> Result<NonNull<u8>> {
    let slots = self.slots()?;
    let pointer = unsafe { (slots.allocate)(size, self.state) };
    NonNull::new(pointer).ok_or(Error::AllocationFailed { size })
  }

  /// Releases `pointer`. Null is accepted and ignored by the backend.
  ///
  /// # Safety
  ///
  /// `pointer` must be null or a live block obtained from an allocator with
  /// the same operations, and must not be used afterwards.
  pub unsafe fn deallocate(
    &self,
    pointer: *mut u8,
  ) -> Result<()> {
    let slots = self.slots()?;
    unsafe { (slots.deallocate)(pointer, self.state) };
    Ok(())
  }

  /// Resizes `pointer` to `size` bytes. On failure the original block is
  /// still owned by the caller, including when `size` is zero.
  ///
  /// # Safety
  ///
  /// Same requirements as [`Allocator::deallocate`]; on success `pointer`
  /// must no longer be used.
  pub unsafe fn reallocate(
    &self,
    pointer: *mut u8,
    size: usize,
  ) -> Result<NonNull<u8>> {
    let slots = self.slots()?;
    let pointer = unsafe { (slots.reallocate)(pointer, size, self.state) };
    NonNull::new(pointer).ok_or(Error::AllocationFailed { size })
  }

  /// Allocates `count * element_size` zero-filled bytes.
  pub fn zero_allocate(
    &self,
    count: usize,
    element_size: usize,
  ) -> Result<NonNull<u8>> {
    let slots = self.slots()?;
    let size = align::array_bytes(count, element_size).ok_or(Error::SizeOverflow {
      count,
      element_size,
    })?;
    let pointer = unsafe { (slots.zero_allocate)(count, element_size, self.state) };
    NonNull::new(pointer).ok_or(Error::AllocationFailed { size })
  }

  /// The single validity gate: all four slots, or `InvalidAllocator`.
  fn slots(&self) -> Result<Slots> {
    match (self.allocate, self.deallocate, self.reallocate, self.zero_allocate) {
      (Some(allocate), Some(deallocate), Some(reallocate), Some(zero_allocate)) => Ok(Slots {
        allocate,
        deallocate,
        reallocate,
        zero_allocate,
      }),
      _ => Err(Error::InvalidAllocator),
    }
  }
}

fn same_fn<F: Copy>(
  a: Option<F>,
  b: Option<F>,
  eq: impl Fn(F, F) -> bool,
) -> bool {
  match (a, b) {
    (Some(a), Some(b)) => eq(a, b),
    (None, None) => true,
    _ => false,
  }
}

/// Validity check that also accepts an absent allocator (always invalid).
pub fn allocator_is_valid(allocator: Option<&Allocator>) -> bool {
  allocator.is_some_and(Allocator::is_valid)
}

/// Resizes `pointer`, releasing it if the resize fails.
///
/// With an invalid `allocator` nothing can release `pointer`: it is leaked,
/// the error state records why, and `InvalidAllocator` is returned.
///
/// # Safety
///
/// `pointer` must be null or a live block owned by `allocator`'s
/// operations. After this call returns, `pointer` must not be used again
/// unless the allocator was invalid.
pub unsafe fn reallocf(
  pointer: *mut u8,
  size: usize,
  allocator: &Allocator,
) -> Result<NonNull<u8>> {
  let Ok(slots) = allocator.slots() else {
    return Err(leak(pointer));
  };

  let new_pointer = unsafe { (slots.reallocate)(pointer, size, allocator.state) };
  match NonNull::new(new_pointer) {
    Some(new_pointer) => Ok(new_pointer),
    None => {
      unsafe { (slots.deallocate)(pointer, allocator.state) };
      Err(Error::AllocationFailed { size })
    }
  }
}

fn leak(pointer: *mut u8) -> Error {
  const MESSAGE: &str = "reallocf(): invalid allocator or allocator function pointers, memory leaked";

  if cfg!(feature = "report-error-handling-errors") {
    tracing::error!(?pointer, "{}", MESSAGE);
  }
  crate::set_error_msg!(MESSAGE);
  Error::InvalidAllocator
}

#[cfg(test)]
mod tests {
  use std::cell::Cell;

  use super::*;
  use crate::error_state;
  use crate::passthrough::PassThrough;
  use crate::tracked::SizeTracked;

  /// Call log threaded through the allocator `state`.
  #[derive(Default)]
  struct Calls {
    deallocations: Cell<usize>,
    last_freed: Cell<usize>,
  }

  unsafe fn calls<'a>(state: *mut c_void) -> &'a Calls {
    unsafe { &*(state as *const Calls) }
  }

  unsafe fn stub_allocate(
    size: usize,
    _state: *mut c_void,
  ) -> *mut u8 {
    unsafe { libc::malloc(size) as *mut u8 }
  }

  unsafe fn stub_deallocate(
    pointer: *mut u8,
    state: *mut c_void,
  ) {
    let calls = unsafe { calls(state) };
    calls.deallocations.set(calls.deallocations.get() + 1);
    calls.last_freed.set(pointer as usize);
    unsafe { libc::free(pointer as *mut c_void) };
  }

  unsafe fn failing_reallocate(
    _pointer: *mut u8,
    _size: usize,
    _state: *mut c_void,
  ) -> *mut u8 {
    ptr::null_mut()
  }

  unsafe fn stub_reallocate(
    pointer: *mut u8,
    size: usize,
    _state: *mut c_void,
  ) -> *mut u8 {
    unsafe { libc::realloc(pointer as *mut c_void, size) as *mut u8 }
  }

  unsafe fn stub_zero_allocate(
    count: usize,
    element_size: usize,
    _state: *mut c_void,
  ) -> *mut u8 {
    unsafe { libc::calloc(count, element_size) as *mut u8 }
  }

  fn stub(
    reallocate: ReallocateFn,
    calls: &Calls,
  ) -> Allocator {
    Allocator {
      allocate: Some(stub_allocate),
      deallocate: Some(stub_deallocate),
      reallocate: Some(reallocate),
      zero_allocate: Some(stub_zero_allocate),
      state: calls as *const Calls as *mut c_void,
    }
  }

  #[test]
  fn test_zero_initialized_is_invalid() {
    let allocator = Allocator::zero_initialized();

    assert!(!allocator.is_valid());
    assert!(allocator.state().is_null());
    assert!(!Allocator::default().is_valid());
    assert!(!allocator_is_valid(None));
    assert!(!allocator_is_valid(Some(&allocator)));
  }

  #[test]
  fn test_single_missing_slot_is_invalid() {
    let full = Allocator::from_backend::<PassThrough>(ptr::null_mut());
    assert!(full.is_valid());
    assert!(allocator_is_valid(Some(&full)));

    let variants = [
      Allocator { allocate: None, ..full },
      Allocator { deallocate: None, ..full },
      Allocator { reallocate: None, ..full },
      Allocator { zero_allocate: None, ..full },
    ];

    for allocator in variants {
      assert!(!allocator.is_valid());
      assert_eq!(allocator.allocate(8), Err(Error::InvalidAllocator));
      assert_eq!(allocator.zero_allocate(1, 8), Err(Error::InvalidAllocator));
      assert_eq!(
        unsafe { allocator.reallocate(ptr::null_mut(), 8) },
        Err(Error::InvalidAllocator)
      );
      assert_eq!(
        unsafe { allocator.deallocate(ptr::null_mut()) },
        Err(Error::InvalidAllocator)
      );
    }
  }

  #[test]
  fn test_same_operations() {
    let a = Allocator::from_backend::<PassThrough>(ptr::null_mut());
    let mut marker = 0u8;
    let b = unsafe { a.with_state(&mut marker as *mut u8 as *mut c_void) };

    assert!(a.same_operations(&b));
    assert!(!a.same_operations(&Allocator::zero_initialized()));
    assert!(!a.same_operations(&Allocator { reallocate: Some(failing_reallocate), ..a }));
    assert!(Allocator::zero_initialized().same_operations(&Allocator::default()));
  }

  #[test]
  fn test_state_is_forwarded() {
    let calls = Calls::default();
    let allocator = stub(stub_reallocate, &calls);

    let pointer = allocator.allocate(32).unwrap();
    unsafe { allocator.deallocate(pointer.as_ptr()) }.unwrap();

    assert_eq!(calls.deallocations.get(), 1);
    assert_eq!(calls.last_freed.get(), pointer.as_ptr() as usize);
    assert_eq!(allocator.state(), &calls as *const Calls as *mut c_void);
  }

  #[test]
  fn test_from_raw_parts_checks_every_slot() {
    let calls = Calls::default();
    let state = &calls as *const Calls as *mut c_void;

    let full = unsafe {
      Allocator::from_raw_parts(
        Some(stub_allocate),
        Some(stub_deallocate),
        Some(stub_reallocate),
        Some(stub_zero_allocate),
        state,
      )
    };
    assert!(full.is_valid());

    let missing_zero = unsafe {
      Allocator::from_raw_parts(
        Some(stub_allocate),
        Some(stub_deallocate),
        Some(stub_reallocate),
        None,
        state,
      )
    };
    assert!(!missing_zero.is_valid());
    assert_eq!(missing_zero.allocate(8), Err(Error::InvalidAllocator));
    assert_eq!(calls.deallocations.get(), 0);
  }

  #[test]
  fn test_zero_allocate_overflow_is_rejected() {
    let allocator = Allocator::from_backend::<PassThrough>(ptr::null_mut());

    assert_eq!(
      allocator.zero_allocate(usize::MAX, 2),
      Err(Error::SizeOverflow { count: usize::MAX, element_size: 2 })
    );
  }

  #[test]
  fn test_reallocf_frees_on_failure() {
    let calls = Calls::default();
    let allocator = stub(failing_reallocate, &calls);

    let original = allocator.allocate(64).unwrap();
    let result = unsafe { reallocf(original.as_ptr(), 128, &allocator) };

    assert_eq!(result, Err(Error::AllocationFailed { size: 128 }));
    assert_eq!(calls.deallocations.get(), 1);
    assert_eq!(calls.last_freed.get(), original.as_ptr() as usize);
  }

  #[test]
  fn test_reallocf_success_keeps_new_block() {
    let calls = Calls::default();
    let allocator = stub(stub_reallocate, &calls);

    let original = allocator.allocate(16).unwrap();
    unsafe { original.as_ptr().write_bytes(0x5A, 16) };

    let grown = unsafe { reallocf(original.as_ptr(), 256, &allocator) }.unwrap();

    assert_eq!(calls.deallocations.get(), 0);
    let bytes = unsafe { std::slice::from_raw_parts(grown.as_ptr(), 16) };
    assert!(bytes.iter().all(|&b| b == 0x5A));

    unsafe { allocator.deallocate(grown.as_ptr()) }.unwrap();
    assert_eq!(calls.deallocations.get(), 1);
  }

  #[test]
  fn test_reallocf_invalid_allocator_leaves_pointer_alone() {
    error_state::reset_error();
    let mut canary = vec![0xC3u8; 64];

    let invalid = Allocator {
      reallocate: None,
      ..Allocator::from_backend::<PassThrough>(ptr::null_mut())
    };
    let result = unsafe { reallocf(canary.as_mut_ptr(), 128, &invalid) };

    assert_eq!(result, Err(Error::InvalidAllocator));
    assert!(canary.iter().all(|&b| b == 0xC3));
    assert_eq!(canary.len(), 64);

    let state = error_state::get_error_state().unwrap();
    assert!(state.message.contains("memory leaked"));
    error_state::reset_error();
  }

  #[test]
  fn test_reallocf_zero_initialized() {
    error_state::reset_error();
    let mut canary = [0x7Eu8; 8];

    let result = unsafe { reallocf(canary.as_mut_ptr(), 4, &Allocator::zero_initialized()) };

    assert_eq!(result, Err(Error::InvalidAllocator));
    assert_eq!(canary, [0x7Eu8; 8]);
    assert!(error_state::error_is_set());
    error_state::reset_error();
  }

  #[test]
  fn test_reallocf_to_zero_on_both_backends() {
    for allocator in [
      Allocator::from_backend::<PassThrough>(ptr::null_mut()),
      Allocator::from_backend::<SizeTracked>(ptr::null_mut()),
    ] {
      let pointer = allocator.allocate(32).unwrap();
      unsafe { pointer.as_ptr().write_bytes(0x99, 32) };

      let resized = unsafe { reallocf(pointer.as_ptr(), 0, &allocator) }.unwrap();

      unsafe { allocator.deallocate(resized.as_ptr()) }.unwrap();
    }
  }
}
