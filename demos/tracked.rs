use std::ptr;

use plugalloc::{
  Allocator, SizeTracked, error_state, get_default_allocator, reallocf, set_default_allocator,
  tracked_size,
};

/// Prints a labelled allocation with its tracked size.
unsafe fn print_block(
  label: &str,
  pointer: ptr::NonNull<u8>,
) {
  println!(
    "[{}] address = {:?}, tracked size = {}",
    label,
    pointer,
    unsafe { tracked_size(pointer) },
  );
}

fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::TRACE)
    .init();

  // --------------------------------------------------------------------
  // 1) Install the size-tracked backend as the process-wide default.
  // --------------------------------------------------------------------
  let tracked = Allocator::from_backend::<SizeTracked>(ptr::null_mut());
  assert!(set_default_allocator(&tracked));
  let allocator = get_default_allocator();
  println!("\n[1] Default allocator now tracks sizes in a header word");

  unsafe {
    // ------------------------------------------------------------------
    // 2) Allocate 100 bytes and fill them with a pattern.
    // ------------------------------------------------------------------
    let first = allocator.allocate(100).unwrap();
    for i in 0..100 {
      first.as_ptr().add(i).write(i as u8);
    }
    print_block("2", first);

    // ------------------------------------------------------------------
    // 3) Shrink to 50, then grow to 200. The first 50 bytes survive.
    // ------------------------------------------------------------------
    let shrunk = allocator.reallocate(first.as_ptr(), 50).unwrap();
    print_block("3a", shrunk);
    let grown = allocator.reallocate(shrunk.as_ptr(), 200).unwrap();
    print_block("3b", grown);
    println!(
      "[3] byte 49 after resizing = {}",
      grown.as_ptr().add(49).read()
    );

    // ------------------------------------------------------------------
    // 4) Resizing to the current size hands back the same pointer.
    // ------------------------------------------------------------------
    let same = allocator.reallocate(grown.as_ptr(), 200).unwrap();
    println!("\n[4] same-size reallocate returned same pointer? {}", same == grown);

    // ------------------------------------------------------------------
    // 5) zero_allocate returns cleared memory.
    // ------------------------------------------------------------------
    let zeroed = allocator.zero_allocate(8, 4).unwrap();
    print_block("5", zeroed);

    // ------------------------------------------------------------------
    // 6) reallocf with an invalid allocator leaks and reports it.
    // ------------------------------------------------------------------
    let result = reallocf(zeroed.as_ptr(), 64, &Allocator::zero_initialized());
    println!("\n[6] reallocf with invalid allocator -> {:?}", result);
    if let Some(state) = error_state::get_error_state() {
      println!("[6] error state: {}", state);
    }
    error_state::reset_error();

    allocator.deallocate(zeroed.as_ptr()).unwrap();
    allocator.deallocate(same.as_ptr()).unwrap();
  }

  println!("\n[7] End of example.");
}
