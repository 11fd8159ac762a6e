use std::io::Read;

use libc::sbrk;
use sfalloc::{Allocator, SbrkMemory};

/// Waits until the user presses ENTER.
/// Useful when you want to inspect memory state with tools like `pmap`, `htop`,
/// `gdb`, or just visually track how allocations change the program break.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

/// Prints the current program break using `sbrk(0)`.
/// The program break is the upper boundary of the heap managed via brk/sbrk.
unsafe fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break (sbrk(0)) = {:?}",
    label,
    std::process::id(),
    unsafe { sbrk(0) },
  );
}

/// Prints the size and address of a just-returned allocation alongside the
/// current program break, mirroring the bump-allocator demo this one is
/// descended from.
unsafe fn print_alloc(label: &str, n: usize, addr: *mut u8) {
  println!(
    "{label}: requested {n} bytes, address = {:?}, program break = {:?}",
    addr,
    unsafe { sbrk(0) }
  );
}

fn main() {
  // Unlike a bump allocator, this allocator tracks freed blocks in 20
  // segregated size-class lists and reuses them on a later alloc.
  let mut a = Allocator::new(SbrkMemory::new());

  unsafe {
    print_program_break("start");
    a.init().expect("init should not fail against a live sbrk heap");
    print_program_break("after init");
    block_until_enter_pressed();

    // ------------------------------------------------------------------
    // 1) Allocate 64 bytes and write through the pointer to show it's
    //    usable memory, not just an address.
    // ------------------------------------------------------------------
    let first = a.alloc(64);
    println!("\n[1] Allocate 64 bytes");
    print_alloc("[1]", 64, first);
    (first as *mut u64).write(0xDEADBEEF);
    println!("[1] Value written to first = 0x{:X}", (first as *mut u64).read());
    block_until_enter_pressed();

    // ------------------------------------------------------------------
    // 2) Allocate 12 bytes. Small requests like this are head-placed:
    //    the allocation sits at the low end of whatever free block served
    //    it, leaving a free remainder above it.
    // ------------------------------------------------------------------
    let second = a.alloc(12);
    println!("\n[2] Allocate 12 bytes (head placement)");
    print_alloc("[2]", 12, second);
    std::ptr::write_bytes(second, 0xAB, 12);
    println!("[2] Initialized second with 0xAB");
    block_until_enter_pressed();

    // ------------------------------------------------------------------
    // 3) Free the first block, then allocate something that fits in its
    //    slot. A segregated free-list allocator reuses freed memory; a
    //    bump allocator never could.
    // ------------------------------------------------------------------
    a.free(first);
    println!("\n[3] Freed first ({first:?})");
    let third = a.alloc(8);
    println!(
      "[3] third == first? {} ({third:?} vs {first:?})",
      if third == first { "yes, the freed block was reused" } else { "no, allocated elsewhere" }
    );
    block_until_enter_pressed();

    // ------------------------------------------------------------------
    // 4) Grow `second` repeatedly with realloc. The first grow pays for a
    //    128-byte slack reservation; a second, small grow right after
    //    should be absorbed by that slack without touching the oracle.
    // ------------------------------------------------------------------
    print_program_break("before realloc sequence");
    let grown_once = a.realloc(second, 32);
    print_program_break("after first realloc(32)");
    let before_second_grow = sbrk(0);
    let grown_twice = a.realloc(grown_once, 48);
    let after_second_grow = sbrk(0);
    println!(
      "\n[4] second realloc moved the break? {}",
      if before_second_grow == after_second_grow { "no (absorbed by slack)" } else { "yes" }
    );
    print_alloc("[4]", 48, grown_twice);
    block_until_enter_pressed();

    // ------------------------------------------------------------------
    // 5) Allocate something large enough to trigger tail placement, then
    //    a small allocation: the small one should land at a lower address
    //    than the large one, since large requests are placed at the high
    //    end of their chosen block.
    // ------------------------------------------------------------------
    let big = a.alloc(4000);
    println!("\n[5] Allocate 4000 bytes (tail placement)");
    print_alloc("[5] big", 4000, big);
    let small = a.alloc(16);
    print_alloc("[5] small", 16, small);
    println!(
      "[5] small < big? {} (large allocations reserve the high end of their block)",
      small < big
    );
    block_until_enter_pressed();

    // ------------------------------------------------------------------
    // 6) End of demo.
    // ------------------------------------------------------------------
    a.free(grown_twice);
    a.free(big);
    a.free(small);
    println!("\n[6] End of walkthrough. Process will exit; sbrk's break never shrinks back.");
  }
}
