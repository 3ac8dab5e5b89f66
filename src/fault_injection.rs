//! Countdown that makes the default backends fail on a chosen call.
//!
//! Lets callers exercise their out-of-memory paths without a custom
//! allocator. The countdown is per thread; it is consulted by `allocate`,
//! `reallocate` and `zero_allocate` of [`PassThrough`](crate::PassThrough)
//! and [`SizeTracked`](crate::SizeTracked), never by `deallocate`.
//! Without the `fault-injection` feature nothing ever fails.

use std::cell::Cell;

/// Countdown value meaning "never fail".
pub const NEVER_FAIL: i64 = -1;

/// Countdown value meaning "fail the next call".
pub const FAIL_NOW: i64 = 0;

thread_local! {
  static COUNT: Cell<i64> = const { Cell::new(NEVER_FAIL) };
}

/// Lets `count` checked calls succeed and fails the one after them.
/// Any negative value disables injection.
pub fn set_count(count: i64) {
  COUNT.set(if count < 0 { NEVER_FAIL } else { count });
}

/// Remaining calls before the injected failure, or [`NEVER_FAIL`].
pub fn count() -> i64 {
  COUNT.get()
}

/// Consumes one step of the countdown; `true` means the caller must fail.
pub fn maybe_fail() -> bool {
  if !cfg!(feature = "fault-injection") {
    return false;
  }
  match COUNT.get() {
    NEVER_FAIL => false,
    FAIL_NOW => {
      COUNT.set(NEVER_FAIL);
      tracing::debug!("injected allocation failure");
      true
    }
    remaining => {
      COUNT.set(remaining - 1);
      false
    }
  }
}
