//! Process-wide default allocator.

use std::ptr;
use std::sync::OnceLock;

use parking_lot::RwLock;

use crate::allocator::{AllocateFn, Allocator, DeallocateFn, ReallocateFn, ZeroAllocateFn};
use crate::DefaultBackend;

/// The operation slots of an allocator, without its state.
#[derive(Debug, Clone, Copy)]
struct Operations {
  allocate: Option<AllocateFn>,
  deallocate: Option<DeallocateFn>,
  reallocate: Option<ReallocateFn>,
  zero_allocate: Option<ZeroAllocateFn>,
}

impl Operations {
  fn of(allocator: &Allocator) -> Self {
    Self {
      allocate: allocator.allocate,
      deallocate: allocator.deallocate,
      reallocate: allocator.reallocate,
      zero_allocate: allocator.zero_allocate,
    }
  }

  fn bind(self) -> Allocator {
    Allocator {
      allocate: self.allocate,
      deallocate: self.deallocate,
      reallocate: self.reallocate,
      zero_allocate: self.zero_allocate,
      state: ptr::null_mut(),
    }
  }
}

/// Holds a default allocator that can be read and overridden wholesale.
///
/// Only the four operations are stored; state handles are dropped on
/// [`set`](AllocatorRegistry::set) and every [`get`](AllocatorRegistry::get)
/// hands out a copy with a null state. Reads and overrides are serialized
/// by a read/write lock, so a reader never observes a half-replaced set of
/// operations.
#[derive(Debug)]
pub struct AllocatorRegistry {
  operations: RwLock<Operations>,
}

impl Default for AllocatorRegistry {
  fn default() -> Self {
    Self::new(&default_backend())
  }
}

impl AllocatorRegistry {
  /// Registry seeded with `initial`'s operations. An invalid `initial` is
  /// stored as-is; callers validate what they get back.
  pub fn new(initial: &Allocator) -> Self {
    Self {
      operations: RwLock::new(Operations::of(initial)),
    }
  }

  pub fn get(&self) -> Allocator {
    self.operations.read().bind()
  }

  /// Replaces the stored operations with `candidate`'s.
  ///
  /// Returns `false`, leaving the registry unchanged, if `candidate` is not
  /// valid.
  pub fn set(
    &self,
    candidate: &Allocator,
  ) -> bool {
    if !candidate.is_valid() {
      tracing::debug!("rejected invalid default allocator candidate");
      return false;
    }
    *self.operations.write() = Operations::of(candidate);
    tracing::debug!("default allocator overridden");
    true
  }

  /// Restores the build-time default backend.
  pub fn reset(&self) {
    *self.operations.write() = Operations::of(&default_backend());
  }
}

/// The backend selected at build time, with a null state.
pub fn default_backend() -> Allocator {
  Allocator::from_backend::<DefaultBackend>(ptr::null_mut())
}

static GLOBAL_REGISTRY: OnceLock<AllocatorRegistry> = OnceLock::new();

/// The process-wide registry, created on first use.
pub fn global_registry() -> &'static AllocatorRegistry {
  GLOBAL_REGISTRY.get_or_init(AllocatorRegistry::default)
}

/// Copy of the process-wide default allocator.
pub fn get_default_allocator() -> Allocator {
  global_registry().get()
}

/// Overrides the process-wide default allocator. See [`AllocatorRegistry::set`].
pub fn set_default_allocator(candidate: &Allocator) -> bool {
  global_registry().set(candidate)
}
