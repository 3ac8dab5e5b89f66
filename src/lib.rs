//! # plugalloc - Pluggable Allocator Values
//!
//! This crate bundles the four basic allocation operations into one value,
//! [`Allocator`], so that code which needs memory can be handed *a strategy*
//! instead of calling `malloc` directly. Swapping the strategy (host heap,
//! arena, pool, a target without `realloc`) never touches the call sites.
//!
//! ## Overview
//!
//! ```text
//!   Allocator Value:
//!
//!   ┌──────────────────────────────────────────────────────────────┐
//!   │  allocate(size, state)                 -> *mut u8 | null      │
//!   │  deallocate(pointer, state)                                   │
//!   │  reallocate(pointer, size, state)      -> *mut u8 | null      │
//!   │  zero_allocate(count, elem, state)     -> *mut u8 | null      │
//!   │  state: *mut c_void  (opaque, forwarded to every slot)        │
//!   └──────────────────────────────────────────────────────────────┘
//!
//!   Valid only when all four slots are set.
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   plugalloc
//!   ├── align        - Checked size arithmetic (align!, header width)
//!   ├── allocator    - Allocator value, Backend trait, reallocf
//!   ├── block        - Size-tracked block handle (internal)
//!   ├── error        - Error type
//!   ├── error_state  - Per-thread error state for diagnostics
//!   ├── fault_injection - Countdown forcing default-backend failures
//!   ├── passthrough  - Backend forwarding to malloc/free/realloc/calloc
//!   ├── registry     - Process-wide default allocator
//!   └── tracked      - Backend emulating realloc over malloc/free only
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use plugalloc::get_default_allocator;
//!
//! let allocator = get_default_allocator();
//!
//! let pointer = allocator.allocate(64).unwrap();
//! unsafe {
//!     pointer.as_ptr().write_bytes(0, 64);
//!     let pointer = allocator.reallocate(pointer.as_ptr(), 128).unwrap();
//!     allocator.deallocate(pointer.as_ptr()).unwrap();
//! }
//! ```
//!
//! ## Backends
//!
//! Two strategies implement [`Backend`]; the `size-tracked` feature picks
//! which one becomes [`DefaultBackend`]:
//!
//! - [`PassThrough`] forwards to the C library's `malloc` family.
//! - [`SizeTracked`] needs only a raw allocate/free pair and keeps the
//!   requested size in a header word in front of each payload:
//!
//! ```text
//!   ┌────────────┬──────────────────────────┐
//!   │ size: N    │      N payload bytes     │
//!   └────────────┴──────────────────────────┘
//!                ▲
//!                └── pointer returned to the caller
//!
//!   reallocate(p, M):  M == N  -> p
//!                      M != N  -> new block, copy min(N, M), free old
//! ```
//!
//! ## Safety
//!
//! Allocators hand out raw memory. Releasing or resizing a pointer is
//! `unsafe`: it must come from an allocator with the same operations.

pub mod align;
pub mod allocator;
mod block;
pub mod error;
pub mod error_state;
pub mod fault_injection;
pub mod passthrough;
pub mod registry;
pub mod tracked;

pub use allocator::{Allocator, Backend, allocator_is_valid, reallocf};
pub use error::{Error, Result};
pub use passthrough::PassThrough;
pub use registry::{AllocatorRegistry, get_default_allocator, global_registry, set_default_allocator};
pub use tracked::{LibcHeap, RawHeap, SizeTracked, tracked_size};

/// Backend installed as the process-wide default.
#[cfg(not(feature = "size-tracked"))]
pub type DefaultBackend = PassThrough;

/// Backend installed as the process-wide default.
#[cfg(feature = "size-tracked")]
pub type DefaultBackend = SizeTracked<LibcHeap>;
