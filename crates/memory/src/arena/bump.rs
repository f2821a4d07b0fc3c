//! Fixed-buffer bump arena
//!
//! # Safety
//!
//! Single-threaded bump allocation over a borrowed byte span:
//! - `Cell` cursor, no synchronization (the arena is deliberately `!Sync`)
//! - allocation is padding + pointer advancement, nothing else
//! - individual deallocation is a no-op; only a bulk reset reclaims space
//!
//! ## Invariants
//!
//! - `0 <= head <= len` at all times
//! - `head` only moves forward between resets
//! - returned pointers lie within `[base, base + len)` and never overlap

use core::cell::Cell;
use core::marker::PhantomData;
use core::ptr::{self, NonNull};

use crate::allocator::{AllocFlags, Allocator, fail_or_null, validate_align};
use crate::error::{AllocResult, MemoryError};
use crate::utils::{copy_and_zero, padding_needed};

/// Bump allocator over a single caller-owned buffer.
///
/// The arena borrows its buffer (a stack array, a heap block, a slab — any
/// `&mut [u8]`) and never owns memory: dropping the arena releases nothing,
/// and the buffer outlives it by construction.
///
/// Allocation computes the padding that aligns the current position, checks
/// the remaining space, and advances the head. Frees are no-ops. The only
/// reclamation is [`AllocFlags::FREE_ALL`] (or [`Arena::reset`]), which
/// rewinds the head to zero and invalidates every previously returned
/// pointer at once.
///
/// A shrinking reallocation returns the same pointer without rewinding the
/// head: the arena never reclaims individually, even backwards.
///
/// # Examples
///
/// ```
/// use keel_memory::allocator::Allocator;
/// use keel_memory::arena::Arena;
///
/// let mut buf = [0u8; 128];
/// let arena = Arena::new(&mut buf);
///
/// // SAFETY: sizes and alignment are valid; the pointer is not used after
/// // the arena goes away.
/// let ptr = unsafe { arena.allocate(10, 1) }?;
/// assert!(!ptr.as_ptr().is_null());
/// assert_eq!(arena.head(), 10);
/// # Ok::<(), keel_memory::MemoryError>(())
/// ```
pub struct Arena<'buf> {
    base: NonNull<u8>,
    len: usize,
    head: Cell<usize>,
    _owner: PhantomData<&'buf mut [u8]>,
}

impl<'buf> Arena<'buf> {
    /// Creates an arena over a caller-owned buffer.
    pub fn new(buf: &'buf mut [u8]) -> Self {
        let len = buf.len();
        // SAFETY: slice data pointers are never null.
        let base = unsafe { NonNull::new_unchecked(buf.as_mut_ptr()) };

        Self {
            base,
            len,
            head: Cell::new(0),
            _owner: PhantomData,
        }
    }

    /// Transient view over a raw buffer, used by the slab arena to bump
    /// within its active slab and commit the head back on success.
    ///
    /// # Safety
    ///
    /// `base` must be valid for reads and writes of `len` bytes for the
    /// lifetime of the view, with `head <= len`, and nothing else may touch
    /// the region `[base + head, base + len)` while the view is alive.
    pub(crate) unsafe fn slab_view(base: NonNull<u8>, len: usize, head: usize) -> Arena<'static> {
        debug_assert!(head <= len);

        Arena {
            base,
            len,
            head: Cell::new(head),
            _owner: PhantomData,
        }
    }

    /// Current offset of the high-water mark.
    #[inline]
    pub fn head(&self) -> usize {
        self.head.get()
    }

    /// Total buffer size.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.len
    }

    /// Bytes still available (ignoring any padding a request may need).
    #[inline]
    pub fn remaining(&self) -> usize {
        self.len - self.head.get()
    }

    /// Rewinds the head to zero.
    ///
    /// Equivalent to reallocating with [`AllocFlags::FREE_ALL`].
    ///
    /// # Safety
    ///
    /// Invalidates every pointer previously returned by this arena; the
    /// caller must not use any of them afterwards.
    #[inline]
    pub unsafe fn reset(&self) {
        self.head.set(0);
    }
}

// SAFETY: allocation advances the Cell cursor within the borrowed buffer,
// returned regions never overlap, growth is routed through the shared
// copy_and_zero helper, and no path panics. `Cell` makes the type !Sync,
// which is the intended single-threaded discipline.
unsafe impl Allocator for Arena<'_> {
    unsafe fn reallocate(
        &self,
        ptr: *mut u8,
        old_size: usize,
        new_size: usize,
        align: usize,
        flags: AllocFlags,
    ) -> AllocResult<*mut u8> {
        validate_align(align)?;

        if flags.contains(AllocFlags::FREE_ALL) {
            self.head.set(0);
            return Ok(ptr::null_mut());
        }

        // Individual frees are no-ops: no per-allocation bookkeeping exists.
        if new_size == 0 {
            return Ok(ptr::null_mut());
        }

        // Shrinks are in-place; space is never reclaimed, not even backwards.
        if !ptr.is_null() && new_size <= old_size {
            return Ok(ptr);
        }

        let head = self.head.get();
        let addr = self.base.as_ptr() as usize + head;
        let padding = padding_needed(addr, align);

        let needed = padding
            .checked_add(new_size)
            .ok_or_else(|| MemoryError::size_overflow("arena bump"))?;
        if needed > self.len - head {
            return fail_or_null(flags, || {
                MemoryError::arena_exhausted(new_size, self.len - head)
            });
        }

        self.head.set(head + needed);

        // SAFETY: head + padding + new_size <= len was just checked, so the
        // destination region lies within the borrowed buffer and past every
        // previously returned region.
        let dst = unsafe { self.base.as_ptr().add(head + padding) };

        // SAFETY: dst is writable for new_size bytes; ptr (if non-null) is a
        // prior arena region of old_size bytes strictly below dst.
        unsafe { copy_and_zero(dst, new_size, ptr, old_size, !flags.contains(AllocFlags::NON_ZERO)) };

        Ok(dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::is_aligned_ptr;

    #[test]
    fn fresh_arena_starts_at_zero() {
        let mut buf = [0u8; 32];
        let arena = Arena::new(&mut buf);

        assert_eq!(arena.head(), 0);
        assert_eq!(arena.capacity(), 32);
        assert_eq!(arena.remaining(), 32);
    }

    #[test]
    fn sequential_allocations_advance_the_head() {
        let mut buf = [0u8; 128];
        let arena = Arena::new(&mut buf);

        // SAFETY: valid sizes, alignment 1 never pads.
        unsafe {
            arena.allocate(10, 1).unwrap();
            assert_eq!(arena.head(), 10);

            arena.allocate(20, 1).unwrap();
            assert_eq!(arena.head(), 30);

            arena.allocate(30, 1).unwrap();
            assert_eq!(arena.head(), 60);
        }
    }

    #[test]
    fn allocations_are_zeroed_over_dirty_buffers() {
        let mut buf = [0xFFu8; 128];
        let arena = Arena::new(&mut buf);

        // SAFETY: valid fresh-allocation pattern.
        unsafe {
            let ptr = arena.allocate(13, 1).unwrap();
            let bytes = core::slice::from_raw_parts(ptr.as_ptr(), 13);
            assert!(bytes.iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn non_zero_flag_skips_the_fill() {
        let mut buf = [0xFFu8; 64];
        let arena = Arena::new(&mut buf);

        // SAFETY: valid fresh-allocation pattern.
        unsafe {
            let ptr = arena
                .allocate_with(8, 1, AllocFlags::NON_ZERO)
                .unwrap();
            let bytes = core::slice::from_raw_parts(ptr, 8);
            assert!(bytes.iter().all(|&b| b == 0xFF));
        }
    }

    #[test]
    fn respects_requested_alignment() {
        for align in [1usize, 4, 16, 32, 64] {
            let mut buf = [0u8; 256];
            let arena = Arena::new(&mut buf);

            // SAFETY: valid fresh-allocation pattern.
            unsafe {
                let ptr = arena.allocate(13, align).unwrap();
                assert!(is_aligned_ptr(ptr.as_ptr(), align));
            }
        }
    }

    #[test]
    fn exhaustion_fails_and_no_panic_masks_it() {
        let mut buf = [0u8; 128];
        let arena = Arena::new(&mut buf);

        // SAFETY: valid fresh-allocation patterns.
        unsafe {
            let loud = arena.allocate(129, 1);
            assert!(matches!(loud, Err(MemoryError::ArenaExhausted { .. })));

            let masked = arena
                .allocate_with(129, 1, AllocFlags::NO_PANIC)
                .unwrap();
            assert!(masked.is_null());
        }

        // A failed request leaves the head untouched.
        assert_eq!(arena.head(), 0);
    }

    #[test]
    fn free_is_a_no_op_and_free_all_rewinds() {
        let mut buf = [0u8; 128];
        let arena = Arena::new(&mut buf);

        // SAFETY: valid allocate/free patterns on this arena.
        unsafe {
            let first = arena.allocate(10, 1).unwrap();
            assert_eq!(arena.head(), 10);

            arena.free(first.as_ptr(), 10, 1);
            assert_eq!(arena.head(), 10);

            let second = arena.allocate(20, 1).unwrap();
            assert_eq!(arena.head(), 30);

            arena.free(second.as_ptr(), 20, 1);
            assert_eq!(arena.head(), 30);

            arena.free_all().unwrap();
            assert_eq!(arena.head(), 0);
        }
    }

    #[test]
    fn growth_copies_and_zero_fills() {
        let mut buf = [0xFFu8; 128];
        let arena = Arena::new(&mut buf);

        // SAFETY: the old pointer is passed with its true size and not used
        // after reallocation.
        unsafe {
            let ptr = arena.allocate(4, 1).unwrap();
            ptr.as_ptr().write_bytes(0xAB, 4);

            let grown = arena
                .reallocate(ptr.as_ptr(), 4, 12, 1, AllocFlags::empty())
                .unwrap();
            let bytes = core::slice::from_raw_parts(grown, 12);
            assert_eq!(&bytes[..4], &[0xAB; 4]);
            assert_eq!(&bytes[4..], &[0x00; 8]);

            // Growth consumed fresh arena space for the whole new region.
            assert_eq!(arena.head(), 16);
        }
    }

    #[test]
    fn shrink_returns_the_same_pointer() {
        let mut buf = [0u8; 128];
        let arena = Arena::new(&mut buf);

        // SAFETY: shrink is in-place by contract.
        unsafe {
            let ptr = arena.allocate(32, 1).unwrap();
            let head = arena.head();

            let shrunk = arena
                .reallocate(ptr.as_ptr(), 32, 8, 1, AllocFlags::empty())
                .unwrap();
            assert_eq!(shrunk, ptr.as_ptr());
            assert_eq!(arena.head(), head);
        }
    }

    #[test]
    fn invalid_alignment_is_always_loud() {
        let mut buf = [0u8; 32];
        let arena = Arena::new(&mut buf);

        // SAFETY: the call fails validation before touching memory.
        let result = unsafe {
            arena.reallocate(ptr::null_mut(), 0, 8, 5, AllocFlags::NO_PANIC)
        };
        assert!(matches!(result, Err(MemoryError::InvalidAlignment { .. })));
    }
}
