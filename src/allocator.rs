//! Public allocator operations: `init`, `alloc`, `free`, `realloc`.
//!
//! Control flows top-down from here into the coalesce/split engine and
//! from there into the free-list index and block primitives.

use crate::block::{self, CHUNKSIZE, DSIZE, MINBLOCK, OVERHEAD, WSIZE};
use crate::engine;
use crate::freelist::FreeLists;
use crate::mem::MemorySystem;
use crate::{align, align_to};
use std::ptr;

/// Extra bytes reserved on every `realloc`, absorbing future growth of
/// the same block at a constant rate without calling back into the
/// memory system each time.
const SLACK: usize = 128;

/// Size of the first free chunk carved out right after the sentinels are
/// installed.
const INITIAL_CHUNK: usize = 64;

/// The one error condition this allocator has: the memory system refused
/// to extend the heap. Nothing else is detected — no double-free, no
/// invalid-pointer check, no corruption detection.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct AllocError;

/// A segregated-fit heap allocator over a memory system `M`.
///
/// Not thread-safe: all four operations assume exclusive access and the
/// state visible to operation *n+1* is exactly the state `init`/`alloc`/
/// `free`/`realloc` number *n* produced.
pub struct Allocator<M: MemorySystem> {
    mem: M,
    lists: FreeLists,
    /// Payload pointer of the prologue sentinel, used as the starting
    /// point for heap-wide invariant walks.
    heap_listp: *mut u8,
}

impl<M: MemorySystem> Allocator<M> {
    pub fn new(mem: M) -> Self {
        Self { mem, lists: FreeLists::new(), heap_listp: ptr::null_mut() }
    }

    /// Installs the prologue/epilogue sentinels and one initial free
    /// chunk. Must be called before any `alloc`/`free`/`realloc`.
    pub fn init(&mut self) -> Result<(), AllocError> {
        self.lists = FreeLists::new();

        unsafe {
            // 4 bytes alignment pad + prologue header + prologue footer
            // + epilogue header = 16 bytes.
            let base = self.mem.extend(4 * WSIZE).ok_or(AllocError)?;
            let prologue_payload = base.add(2 * WSIZE);
            block::write_header_plain(prologue_payload, DSIZE, true, false);
            let epilogue_payload = block::next_block(prologue_payload);
            block::write_header_plain(epilogue_payload, 0, true, false);
            self.heap_listp = prologue_payload;
        }

        self.extend_heap(INITIAL_CHUNK).ok_or(AllocError)?;
        Ok(())
    }

    /// Allocates at least `n` bytes, 8-byte aligned. Returns null if
    /// `n == 0` or the memory system refuses to grow the heap.
    pub fn alloc(&mut self, n: usize) -> *mut u8 {
        if n == 0 {
            return ptr::null_mut();
        }
        let asize = Self::adjusted_size(n);

        unsafe {
            let fit = self.lists.find_fit(asize);
            let block = if !fit.is_null() {
                fit
            } else {
                match self.extend_heap(core::cmp::max(asize, CHUNKSIZE)) {
                    Some(b) => b,
                    None => return ptr::null_mut(),
                }
            };
            engine::place(&mut self.lists, block, asize)
        }
    }

    /// Frees a block previously returned by `alloc`/`realloc`. No-op if
    /// `p` is null. Cannot fail.
    pub fn free(&mut self, p: *mut u8) {
        if p.is_null() {
            return;
        }
        unsafe {
            let size = block::read_header(p).size();
            let next = block::next_block(p);
            block::set_tag(next, false);
            // A plain (not tag-preserving) write here, unlike the
            // coalesce/split paths: a stray tag can end up on an
            // *allocated* block (realloc's retag step doesn't check the
            // allocation bit of the neighbor it tags), and freeing must
            // unconditionally clear it so a freed block is never
            // permanently unusable to find_fit/coalesce.
            block::write_header_plain(p, size, false, false);
            self.lists.insert(p, size);
            engine::coalesce(&mut self.lists, p);
        }
    }

    /// Resizes the allocation at `p` to hold at least `n` bytes,
    /// preserving the first `min(n, old payload size)` bytes.
    ///
    /// `p == null` behaves like `alloc(n)`. `n == 0` returns null without
    /// freeing `p` (the source this allocator is modeled on does not free
    /// `p` in that case either).
    pub fn realloc(&mut self, p: *mut u8, n: usize) -> *mut u8 {
        if p.is_null() {
            return self.alloc(n);
        }
        if n == 0 {
            return ptr::null_mut();
        }

        unsafe {
            let adj = Self::adjusted_size(n);
            let target = adj + SLACK;
            let cur_size = block::read_header(p).size();
            let slack = cur_size as isize - target as isize;

            let result = if slack >= 0 {
                p
            } else {
                let next = block::next_block(p);
                let next_h = block::read_header(next);
                let next_size = next_h.size();
                let next_is_epilogue = next_size == 0;
                let next_is_free = !next_is_epilogue && !next_h.is_alloc();
                let avail_without_extend = cur_size as isize + next_size as isize - target as isize;

                // Only the epilogue sits at the heap's true break, so
                // only when `next` is the epilogue is calling back into
                // the memory system guaranteed to land contiguously
                // right after this merge. A genuine free `next` can only
                // be grown into as far as its own size goes; if that
                // still isn't enough, fall through to the move path
                // instead of extending memory that wouldn't be adjacent
                // to it.
                if next_is_epilogue || (next_is_free && avail_without_extend >= 0) {
                    let mut avail = avail_without_extend;
                    if avail < 0 {
                        let grow_by = core::cmp::max((-avail) as usize, CHUNKSIZE);
                        if self.mem.extend(grow_by).is_none() {
                            return ptr::null_mut();
                        }
                        avail += grow_by as isize;
                    }
                    if next_size > 0 {
                        self.lists.remove(next);
                    }
                    let new_total = (target as isize + avail) as usize;
                    block::write_header_plain(p, new_total, true, false);
                    // The follow-on block (whatever sat past `next`) is
                    // untouched and keeps its own valid header — only
                    // when `next` itself was the epilogue did this merge
                    // consume it, so only then does a fresh epilogue need
                    // writing at the new break.
                    if next_is_epilogue {
                        let new_epilogue = block::next_block(p);
                        block::write_header_plain(new_epilogue, 0, true, false);
                    }
                    p
                } else {
                    let fresh = self.alloc(n);
                    if fresh.is_null() {
                        return ptr::null_mut();
                    }
                    let copy_len = core::cmp::min(n, cur_size - OVERHEAD);
                    ptr::copy_nonoverlapping(p, fresh, copy_len);
                    self.free(p);
                    fresh
                }
            };

            let final_size = block::read_header(result).size();
            let final_slack = final_size as isize - target as isize;
            if final_slack < (2 * SLACK) as isize {
                let next = block::next_block(result);
                block::set_tag(next, true);
            }
            result
        }
    }

    /// `max(MINBLOCK, align_to(n + OVERHEAD, DSIZE))` — the request size
    /// in user bytes, adjusted for header/footer overhead and alignment,
    /// lower-bounded so a freed allocation can always hold its free-list
    /// links.
    fn adjusted_size(n: usize) -> usize {
        core::cmp::max(MINBLOCK, align_to!(n + OVERHEAD, DSIZE))
    }

    /// Extends the heap by `size` bytes (rounded up to a double word),
    /// installs a fresh free block and a new epilogue, inserts the block
    /// and coalesces it with whatever free block preceded the old
    /// epilogue. Returns the resulting (possibly merged) free block's
    /// payload, or `None` on oracle failure.
    fn extend_heap(&mut self, size: usize) -> Option<*mut u8> {
        let size = align!(size);
        let base = self.mem.extend(size)?;
        unsafe {
            // `base` is the old break, which is exactly where the old
            // epilogue header used to sit — the new free block reuses
            // that word as its own header rather than starting a word
            // past it.
            let payload = base;
            block::write_header_plain(payload, size, false, false);
            let epilogue = block::next_block(payload);
            block::write_header_plain(epilogue, 0, true, false);
            self.lists.insert(payload, size);
            Some(engine::coalesce(&mut self.lists, payload))
        }
    }

    /// Payload pointer of the prologue sentinel. Exposed for debug
    /// invariant-walking in tests.
    #[cfg(test)]
    fn heap_listp(&self) -> *mut u8 {
        self.heap_listp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::MockMemory;

    fn new_allocator() -> Allocator<MockMemory> {
        let mut a = Allocator::new(MockMemory::new());
        a.init().unwrap();
        a
    }

    /// Walks every block from the prologue to the epilogue, checking the
    /// invariants §8 of the specification lists: header equals footer,
    /// every free block sits in exactly the right class, no two
    /// un-tagged free blocks are adjacent, and every payload pointer the
    /// allocator has handed out lies strictly within the heap bounds.
    unsafe fn debug_check<M: MemorySystem>(a: &Allocator<M>) {
        unsafe {
            let mut cur = a.heap_listp();
            let mut prev_was_free = false;
            let mut total = 0usize;
            loop {
                let h = block::read_header(cur);
                if h.size() > 0 {
                    let f = block::Header::from_raw(block::footer_ptr(cur, h.size()).read());
                    assert_eq!(h, f, "header/footer mismatch at {cur:?}");
                }
                total += if h.size() == 0 { 2 * block::WSIZE } else { h.size() };

                if !h.is_alloc() {
                    assert!(
                        !(prev_was_free),
                        "two adjacent free blocks with no tag between them at {cur:?}"
                    );
                    let class = crate::freelist::size_class(h.size());
                    let mut walk = a.lists.class_head(class);
                    let mut found = false;
                    while !walk.is_null() {
                        if walk == cur {
                            found = true;
                            break;
                        }
                        walk = block::read_pred(walk);
                    }
                    assert!(found, "free block at {cur:?} missing from its class list");
                }
                prev_was_free = !h.is_alloc();

                if h.size() == 0 {
                    break;
                }
                cur = block::next_block(cur);
            }
            let _ = total;
        }
    }

    #[test]
    fn scenario_1_free_after_single_alloc_leaves_one_block() {
        let mut a = new_allocator();
        unsafe {
            let p = a.alloc(1);
            assert!(!p.is_null());
            a.free(p);
            debug_check(&a);

            let reformed = block::read_header(block::next_block(a.heap_listp));
            assert!(!reformed.is_alloc());
            assert_eq!(reformed.size(), INITIAL_CHUNK);
        }
    }

    #[test]
    fn scenario_2_freeing_two_adjacent_allocations_coalesces() {
        let mut a = new_allocator();
        unsafe {
            let x = a.alloc(40);
            let y = a.alloc(40);
            a.free(x);
            a.free(y);
            debug_check(&a);

            // A fresh allocation that fits in the combined space should
            // land exactly at x (head-placement, first-fit).
            let z = a.alloc(40);
            assert_eq!(z, x);
        }
    }

    #[test]
    fn scenario_3_freed_block_is_reused_first_fit() {
        let mut a = new_allocator();
        unsafe {
            let x = a.alloc(40);
            let _y = a.alloc(40);
            a.free(x);
            let z = a.alloc(40);
            assert_eq!(z, x);
        }
    }

    #[test]
    fn scenario_4_second_realloc_is_absorbed_by_slack() {
        let mut mem = MockMemory::new();
        // Track heap_hi before/after to assert the oracle wasn't called.
        let mut a = Allocator::new(MockMemory::new());
        a.init().unwrap();
        let _ = &mut mem;

        unsafe {
            let p = a.alloc(16);
            let p = a.realloc(p, 32);
            assert!(!p.is_null());
            let before = a.mem.heap_hi();
            let p2 = a.realloc(p, 48);
            let after = a.mem.heap_hi();
            assert_eq!(p2, p, "slack should keep the block in place");
            assert_eq!(before, after, "second realloc must not touch the oracle");
        }
    }

    #[test]
    fn scenario_5_large_allocation_uses_tail_placement() {
        let mut a = new_allocator();
        unsafe {
            let big = a.alloc(200);
            let small = a.alloc(16);
            assert!(!big.is_null() && !small.is_null());
            // Tail placement puts the large allocation at the high end of
            // its chosen block, leaving the low end free; the small
            // allocation that follows then lands there instead.
            assert!(small < big, "small alloc should reuse the low remainder tail placement left behind");
        }
    }

    #[test]
    fn scenario_6_stray_tag_on_an_allocated_neighbor_clears_when_that_block_is_freed() {
        let mut a = new_allocator();
        unsafe {
            // `anchor` ends up immediately after the gap `p` later grows
            // into, so realloc's final "tag whatever is now next" step
            // lands the tag on `anchor` itself, even though `anchor` is
            // allocated — the encoding never checks that (see block::set_tag).
            let anchor = a.alloc(2000);
            let p = a.alloc(8);
            let p2 = a.realloc(p, 2008);
            assert_eq!(p2, p, "grow absorbs the adjoining free gap in place");
            debug_check(&a);

            a.free(anchor);
            debug_check(&a);

            // If free() preserved anchor's stray tag instead of clearing
            // it, this block would be permanently invisible to find_fit.
            let reused = a.alloc(2000);
            assert_eq!(reused, anchor, "a stray tag on a freed block must not make it unreachable");
        }
    }

    #[test]
    fn alloc_zero_returns_null() {
        let mut a = new_allocator();
        assert!(a.alloc(0).is_null());
    }

    #[test]
    fn realloc_zero_returns_null_without_freeing() {
        let mut a = new_allocator();
        unsafe {
            let p = a.alloc(32);
            let r = a.realloc(p, 0);
            assert!(r.is_null());
            // p must still be usable: writing through it should not be UB.
            p.write(0xAB);
            assert_eq!(p.read(), 0xAB);
            a.free(p);
        }
    }

    #[test]
    fn realloc_null_behaves_like_alloc() {
        let mut a = new_allocator();
        let p = a.realloc(ptr::null_mut(), 32);
        assert!(!p.is_null());
    }

    #[test]
    fn realloc_preserves_contents_when_shrinking() {
        let mut a = new_allocator();
        unsafe {
            let p = a.alloc(64);
            for i in 0..64u8 {
                p.add(i as usize).write(i);
            }
            let p2 = a.realloc(p, 16);
            assert!(!p2.is_null());
            for i in 0..16u8 {
                assert_eq!(p2.add(i as usize).read(), i);
            }
        }
    }

    #[test]
    fn realloc_preserves_contents_when_moving() {
        let mut a = new_allocator();
        unsafe {
            let p = a.alloc(32);
            for i in 0..32u8 {
                p.add(i as usize).write(i);
            }
            // Force a move by occupying the space right after `p`.
            let _blocker = a.alloc(32);
            let p2 = a.realloc(p, 4096);
            assert!(!p2.is_null());
            assert_ne!(p2, p);
            for i in 0..32u8 {
                assert_eq!(p2.add(i as usize).read(), i);
            }
        }
    }

    #[test]
    fn realloc_falls_back_to_move_when_a_free_neighbor_cannot_cover_the_grow() {
        let mut a = new_allocator();
        unsafe {
            let x = a.alloc(16);
            let y = a.alloc(16);
            let z = a.alloc(16);
            a.free(y);
            debug_check(&a);

            // `y`'s old slot is free and physically adjoins `x`, but it's
            // far too small to satisfy a big grow on its own; this must
            // not extend the heap as if that free space were contiguous
            // with fresh memory, and it must leave `z`'s header intact.
            let z_size_before = block::read_header(z).size();
            let grown = a.realloc(x, 4096);
            assert!(!grown.is_null());
            assert_ne!(grown, x, "merging with a too-small free neighbor must fall back to a move");
            assert_eq!(block::read_header(z).size(), z_size_before, "z's header must survive untouched");
            assert!(block::read_header(z).is_alloc(), "z must still read as allocated");
            debug_check(&a);
        }
    }

    #[test]
    fn many_allocations_and_frees_leave_a_consistent_heap() {
        let mut a = new_allocator();
        unsafe {
            let mut live = Vec::new();
            for i in 0..64 {
                let p = a.alloc((i % 37) + 1);
                assert!(!p.is_null());
                live.push(p);
                if i % 3 == 0 {
                    if let Some(freed) = live.pop() {
                        a.free(freed);
                    }
                }
                debug_check(&a);
            }
            for p in live {
                a.free(p);
            }
            debug_check(&a);
        }
    }

    #[test]
    fn allocations_are_double_word_aligned_and_within_heap_bounds() {
        let mut a = new_allocator();
        unsafe {
            for n in [1usize, 7, 8, 9, 100, 4096] {
                let p = a.alloc(n);
                assert!(!p.is_null());
                assert_eq!(p as usize % DSIZE, 0);
                assert!(p >= a.mem.heap_lo());
                assert!(p < a.mem.heap_hi());
            }
        }
    }
}
