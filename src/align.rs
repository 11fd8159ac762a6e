//! Alignment macros used throughout the allocator.
//!
//! The allocator works in two fixed granularities regardless of the host
//! machine's native word size: a 4-byte **word** (the header/footer slot)
//! and an 8-byte **double word** (the payload alignment guarantee). Unlike
//! a generic `align_to!(value, align_of::<usize>())` helper, these
//! constants are fixed by the block encoding itself, not by the platform.

/// Rounds `value` up to the next multiple of `align`, which must be a
/// power of two.
///
/// # Examples
///
/// ```rust
/// use sfalloc::align_to;
///
/// assert_eq!(align_to!(13, 8), 16);
/// assert_eq!(align_to!(16, 8), 16);
/// assert_eq!(align_to!(1, 4), 4);
/// ```
#[macro_export]
macro_rules! align_to {
    ($value:expr, $align:expr) => {
        (($value) + ($align) - 1) & !(($align) - 1)
    };
}

/// Rounds `value` up to the next multiple of the double-word size (8
/// bytes) — the granularity every block size in this allocator is kept to.
///
/// # Examples
///
/// ```rust
/// use sfalloc::align;
///
/// assert_eq!(align!(9), 16);
/// assert_eq!(align!(16), 16);
/// ```
#[macro_export]
macro_rules! align {
    ($value:expr) => {
        $crate::align_to!($value, $crate::block::DSIZE)
    };
}
