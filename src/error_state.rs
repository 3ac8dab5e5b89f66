//! Per-thread error state.
//!
//! The allocator layer reports human-readable diagnostics here (for example
//! when `reallocf` has to leak a block). Callers inspect and clear it.

use std::cell::RefCell;
use std::fmt;

/// Longest message kept in the error state, in bytes.
pub const ERROR_MESSAGE_MAX_LENGTH: usize = 768;

/// Last error reported on this thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorState {
  pub message: String,
  pub file: &'static str,
  pub line: u32,
}

impl fmt::Display for ErrorState {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(f, "{}, at {}:{}", self.message, self.file, self.line)
  }
}

thread_local! {
  static ERROR_STATE: RefCell<Option<ErrorState>> = const { RefCell::new(None) };
}

/// Records `message` as this thread's error state.
///
/// Overwriting a state that was never reset is reported as a warning when
/// `report-error-handling-errors` is enabled.
pub fn set_error_state(
  message: &str,
  file: &'static str,
  line: u32,
) {
  let message = truncate(message, ERROR_MESSAGE_MAX_LENGTH).to_owned();

  ERROR_STATE.with_borrow_mut(|state| {
    if let Some(previous) = state.as_ref() {
      if cfg!(feature = "report-error-handling-errors") && previous.message != message {
        tracing::warn!(
          previous = %previous,
          new = %message,
          "error state overwritten before it was reset"
        );
      }
    }
    *state = Some(ErrorState { message, file, line });
  });
}

/// Records `$msg` with the caller's file and line.
#[macro_export]
macro_rules! set_error_msg {
  ($msg:expr) => {
    $crate::error_state::set_error_state($msg, file!(), line!())
  };
}

/// Copy of this thread's error state, if one is set.
pub fn get_error_state() -> Option<ErrorState> {
  ERROR_STATE.with_borrow(|state| state.clone())
}

pub fn error_is_set() -> bool {
  ERROR_STATE.with_borrow(|state| state.is_some())
}

/// Clears this thread's error state.
pub fn reset_error() {
  ERROR_STATE.with_borrow_mut(|state| *state = None);
}

fn truncate(
  message: &str,
  max: usize,
) -> &str {
  if message.len() <= max {
    return message;
  }
  let mut end = max;
  while !message.is_char_boundary(end) {
    end -= 1;
  }
  &message[..end]
}
