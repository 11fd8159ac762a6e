//! # sfalloc - A Segregated-Fit Heap Allocator
//!
//! This crate provides a **segregated free-list allocator** (also called an
//! explicit-list, size-class allocator) implementing the classic three
//! operation interface — `init`, `alloc`, `free`, `realloc` — on top of a
//! single contiguous heap region whose upper bound is extended by a
//! monotonically growing break pointer.
//!
//! ## Overview
//!
//! Unlike a bump allocator, this allocator reuses freed memory. Free blocks
//! are indexed by size class in a fixed array of doubly-linked lists, so a
//! fitting block can usually be found in close to constant time instead of
//! walking the whole heap:
//!
//! ```text
//!   Segregated free lists (20 size classes):
//!
//!   class 0  [16,32)   : empty
//!   class 1  [32,64)   : head -> [B1] -> [B2] -> null
//!   class 2  [64,128)  : head -> [B3] -> null
//!   ...
//!   class 19 [2^19, ..): head -> [huge block] -> null
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   sfalloc
//!   ├── align      - Alignment macros (align!, align_to!)
//!   ├── block      - Header/footer packing and physical-block navigation
//!   ├── freelist   - The segregated size-class index (insert/remove/find_fit)
//!   ├── mem        - The external "memory system" oracle (sbrk + mock)
//!   ├── engine     - Coalescing and splitting
//!   └── allocator  - Public operations: init/alloc/free/realloc
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sfalloc::{Allocator, MockMemory};
//!
//! let mut a = Allocator::new(MockMemory::new());
//! a.init().unwrap();
//!
//! unsafe {
//!     let p = a.alloc(64);
//!     assert!(!p.is_null());
//!     a.free(p);
//! }
//! ```
//!
//! ## How It Works
//!
//! Every block, allocated or free, carries a boundary-tag header and footer:
//!
//! ```text
//!   ┌────────┬───────────────────────────────┬────────┐
//!   │ header │            payload            │ footer │
//!   │ 4 bytes│    (or pred/succ links when    │ 4 bytes│
//!   │        │        the block is free)      │        │
//!   └────────┴───────────────────────────────┴────────┘
//! ```
//!
//! The header/footer word packs the block's size (a multiple of 8) into its
//! upper bits, with the low two bits holding the allocation flag and a
//! *reallocation tag* used to reserve slack space behind a block that has
//! recently grown via `realloc`, so repeated small grows don't each pay for
//! a fresh heap extension.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: no synchronization primitives.
//! - **No defragmentation**: coalescing is opportunistic (on free/extend),
//!   never proactive or background.
//! - **No return-to-OS**: the break pointer only grows.
//! - **8-byte alignment only**: no support for over-aligned allocations.
//!
//! ## Safety
//!
//! This crate is inherently unsafe: it manages a heap as a single byte
//! buffer with raw-pointer accessors. All allocation and deallocation
//! operations require `unsafe` blocks at the call site.

pub mod align;
pub mod block;
mod engine;
pub mod freelist;
pub mod mem;
mod allocator;

pub use allocator::{Allocator, AllocError};
pub use mem::{MemorySystem, SbrkMemory, MockMemory};
