//! Growable slab arena
//!
//! Composes bump arenas to get growth while keeping bump-allocation speed
//! per slab: a chain of heap-allocated fixed-size buffers, each managed as a
//! bump arena, growing by one slab whenever the active one cannot satisfy a
//! request.
//!
//! ## Invariants
//!
//! - the slab chain is never empty after construction
//! - the active slab is always the last one
//! - `head <= active.len` at all times
//! - every slab is allocated from, and released to, the backing allocator

use core::cell::{Cell, RefCell};
use core::ptr::{self, NonNull};

use crate::allocator::{AllocFlags, Allocator, fail_or_null, validate_align};
use crate::array::DynArray;
use crate::error::{AllocResult, MemoryError};
use crate::utils::{MIB, copy_and_zero};

use super::Arena;

/// Alignment floor for slab buffers; keeps any request's padding small and
/// matches `max_align_t`-class guarantees.
const SLAB_ALIGN: usize = 16;

/// Configuration for [`SlabArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlabConfig {
    /// Default size of each slab; requests larger than this get a slab of
    /// exactly their own size.
    pub slab_size: usize,
}

impl Default for SlabConfig {
    fn default() -> Self {
        Self {
            slab_size: 8 * MIB,
        }
    }
}

impl SlabConfig {
    /// Default configuration (8 MiB slabs).
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default slab size.
    #[must_use]
    pub fn with_slab_size(mut self, slab_size: usize) -> Self {
        debug_assert!(slab_size > 0);
        self.slab_size = slab_size;
        self
    }

    /// Small slabs (64 KiB), for tests and modest workloads.
    pub fn small() -> Self {
        Self::new().with_slab_size(64 * 1024)
    }

    /// Large slabs (64 MiB), for bulk processing.
    pub fn large() -> Self {
        Self::new().with_slab_size(64 * MIB)
    }
}

/// One owned buffer in the chain.
#[derive(Debug, Clone, Copy)]
struct Slab {
    ptr: NonNull<u8>,
    len: usize,
    align: usize,
}

/// Growable chain of bump-managed slabs over a backing allocator.
///
/// Allocation first tries the active slab bump-style; only when it does not
/// fit does the arena grow, by appending a slab sized
/// `max(request, slab_size)` — the remainder of a nearly-full slab is never
/// wasted eagerly, and allocation stays O(1) amortized.
///
/// [`AllocFlags::FREE_ALL`] releases every slab except the first back to the
/// backing allocator and rewinds the head; keeping one slab alive avoids an
/// empty-chain state. Individual frees are no-ops, as in any bump arena.
/// Dropping the arena releases every slab (and the chain bookkeeping itself)
/// through the backing allocator.
///
/// # Examples
///
/// ```
/// use keel_memory::allocator::{Allocator, SYSTEM_ALLOC};
/// use keel_memory::arena::{SlabArena, SlabConfig};
///
/// let arena = SlabArena::with_config(&SYSTEM_ALLOC, SlabConfig::small())?;
/// // SAFETY: valid size/alignment; the pointer is not used after the arena
/// // is dropped.
/// let ptr = unsafe { arena.allocate(256, 8) }?;
/// assert!(!ptr.as_ptr().is_null());
/// assert_eq!(arena.slab_count(), 1);
/// # Ok::<(), keel_memory::MemoryError>(())
/// ```
pub struct SlabArena<'a> {
    slabs: RefCell<DynArray<'a, Slab>>,
    head: Cell<usize>,
    backing: &'a dyn Allocator,
    config: SlabConfig,
}

impl<'a> SlabArena<'a> {
    /// Creates a slab arena with the default configuration, allocating the
    /// first slab eagerly.
    pub fn new(backing: &'a dyn Allocator) -> AllocResult<Self> {
        Self::with_config(backing, SlabConfig::default())
    }

    /// Creates a slab arena with the given configuration.
    pub fn with_config(backing: &'a dyn Allocator, config: SlabConfig) -> AllocResult<Self> {
        let mut slabs = DynArray::new(backing);
        let first = Self::new_slab(backing, config.slab_size, SLAB_ALIGN)?;
        if let Err(err) = slabs.push(first) {
            // SAFETY: the slab was just allocated with these parameters and
            // never escaped.
            unsafe { backing.free(first.ptr.as_ptr(), first.len, first.align) };
            return Err(err);
        }

        Ok(Self {
            slabs: RefCell::new(slabs),
            head: Cell::new(0),
            backing,
            config,
        })
    }

    fn new_slab(backing: &dyn Allocator, len: usize, align: usize) -> AllocResult<Slab> {
        // NON_ZERO: slab contents are zeroed per-allocation as they are
        // handed out, so pre-zeroing whole slabs would be double work.
        // SAFETY: fresh-allocation pattern against the backing allocator.
        let raw = unsafe { backing.allocate_with(len, align, AllocFlags::NON_ZERO)? };
        let ptr = NonNull::new(raw).ok_or_else(|| MemoryError::allocation_failed(len, align))?;

        Ok(Slab { ptr, len, align })
    }

    /// Number of slabs currently owned.
    pub fn slab_count(&self) -> usize {
        self.slabs.borrow().len()
    }

    /// Current offset within the active slab.
    #[inline]
    pub fn head(&self) -> usize {
        self.head.get()
    }

    /// The configured default slab size.
    #[inline]
    pub fn slab_size(&self) -> usize {
        self.config.slab_size
    }

    /// The allocator slabs are drawn from and released to.
    #[inline]
    pub fn backing(&self) -> &'a dyn Allocator {
        self.backing
    }

    fn active_slab(&self) -> Slab {
        let slabs = self.slabs.borrow();
        debug_assert!(!slabs.is_empty());
        slabs[slabs.len() - 1]
    }

    /// Releases every slab except the first and rewinds the head.
    fn release_tail_slabs(&self) -> AllocResult<()> {
        let mut slabs = self.slabs.borrow_mut();
        while slabs.len() > 1 {
            let slab = slabs.pop()?;
            // SAFETY: the slab was allocated from the backing allocator with
            // exactly these parameters; FREE_ALL invalidates all pointers
            // into it by contract.
            unsafe { self.backing.free(slab.ptr.as_ptr(), slab.len, slab.align) };
        }
        self.head.set(0);
        Ok(())
    }

    /// Grows the chain by one slab sized `max(size, slab_size)` and places
    /// the pending allocation at its start.
    unsafe fn grow(
        &self,
        ptr: *mut u8,
        old_size: usize,
        new_size: usize,
        align: usize,
        flags: AllocFlags,
    ) -> AllocResult<*mut u8> {
        let slab_len = new_size.max(self.config.slab_size);
        let slab = match Self::new_slab(self.backing, slab_len, align.max(SLAB_ALIGN)) {
            Ok(slab) => slab,
            Err(err) => return fail_or_null(flags, move || err),
        };

        if let Err(err) = self.slabs.borrow_mut().push(slab) {
            // SAFETY: the slab never escaped; release it before reporting.
            unsafe { self.backing.free(slab.ptr.as_ptr(), slab.len, slab.align) };
            return fail_or_null(flags, move || err);
        }

        self.head.set(new_size);

        let dst = slab.ptr.as_ptr();
        // SAFETY: dst is the start of a fresh slab of at least new_size
        // bytes; ptr (if non-null) is a region in an earlier slab, per the
        // caller contract, and cannot overlap.
        unsafe { copy_and_zero(dst, new_size, ptr, old_size, !flags.contains(AllocFlags::NON_ZERO)) };

        Ok(dst)
    }
}

// SAFETY: allocation either bumps within the active slab (through a
// transient Arena view whose head is committed back on success) or appends
// a new slab; regions never overlap, growth goes through the shared
// copy_and_zero helper, and no path panics. Cell/RefCell make the type
// !Sync, the intended single-threaded discipline.
unsafe impl Allocator for SlabArena<'_> {
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
            self.release_tail_slabs()?;
            return Ok(ptr::null_mut());
        }

        // Individual frees are no-ops, as in any bump arena.
        if new_size == 0 {
            return Ok(ptr::null_mut());
        }

        // Shrinks are in-place; no backward reclamation.
        if !ptr.is_null() && new_size <= old_size {
            return Ok(ptr);
        }

        // Try the active slab first; NO_PANIC turns its exhaustion into a
        // quiet null so a full slab is the grow signal, not a failure.
        let active = self.active_slab();
        // SAFETY: the active slab is live for the duration of this call and
        // only this view touches [head, len) (single-threaded, no reentry).
        let view = unsafe { Arena::slab_view(active.ptr, active.len, self.head.get()) };
        // SAFETY: same contract as our own caller's.
        let bumped =
            unsafe { view.reallocate(ptr, old_size, new_size, align, flags | AllocFlags::NO_PANIC)? };
        if !bumped.is_null() {
            self.head.set(view.head());
            return Ok(bumped);
        }

        // SAFETY: same contract as our own caller's.
        unsafe { self.grow(ptr, old_size, new_size, align, flags) }
    }
}

impl Drop for SlabArena<'_> {
    fn drop(&mut self) {
        let slabs = self.slabs.get_mut();
        for slab in slabs.iter() {
            // SAFETY: each slab was allocated from the backing allocator
            // with exactly these parameters; nothing uses them after drop.
            unsafe { self.backing.free(slab.ptr.as_ptr(), slab.len, slab.align) };
        }
        // The chain bookkeeping itself is returned to the backing allocator
        // by DynArray's own drop.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::SYSTEM_ALLOC;
    use crate::utils::is_aligned_ptr;

    #[test]
    fn starts_with_exactly_one_slab() {
        let arena = SlabArena::with_config(&SYSTEM_ALLOC, SlabConfig::small()).unwrap();

        assert_eq!(arena.slab_count(), 1);
        assert_eq!(arena.head(), 0);
        assert!(core::ptr::addr_eq(
            arena.backing() as *const dyn Allocator,
            &raw const SYSTEM_ALLOC
        ));
    }

    #[test]
    fn grows_by_one_slab_when_the_active_one_is_full() {
        let arena = SlabArena::new(&SYSTEM_ALLOC).unwrap();

        // SAFETY: valid fresh-allocation patterns; pointers die with the
        // arena.
        unsafe {
            arena.allocate(6 * MIB, 1).unwrap();
            assert_eq!(arena.slab_count(), 1);

            arena.allocate(6 * MIB, 1).unwrap();
            assert_eq!(arena.slab_count(), 2);
        }
    }

    #[test]
    fn oversized_requests_get_their_own_slab() {
        let arena = SlabArena::with_config(&SYSTEM_ALLOC, SlabConfig::small()).unwrap();

        // SAFETY: valid fresh-allocation pattern.
        unsafe {
            // Larger than the configured slab size: the new slab is sized to
            // the request exactly.
            arena.allocate(256 * 1024, 1).unwrap();
        }
        assert_eq!(arena.slab_count(), 2);
        assert_eq!(arena.head(), 256 * 1024);
    }

    #[test]
    fn a_nearly_full_slab_is_not_wasted_eagerly() {
        let arena =
            SlabArena::with_config(&SYSTEM_ALLOC, SlabConfig::new().with_slab_size(1024)).unwrap();

        // SAFETY: valid fresh-allocation patterns.
        unsafe {
            arena.allocate(1000, 1).unwrap();
            assert_eq!(arena.slab_count(), 1);

            // Doesn't fit the remainder: grow.
            arena.allocate(512, 1).unwrap();
            assert_eq!(arena.slab_count(), 2);
            assert_eq!(arena.head(), 512);
        }
    }

    #[test]
    fn allocations_are_zeroed_and_aligned() {
        let arena = SlabArena::with_config(&SYSTEM_ALLOC, SlabConfig::small()).unwrap();

        for align in [1usize, 8, 64, 256] {
            // SAFETY: valid fresh-allocation pattern.
            unsafe {
                let ptr = arena.allocate(37, align).unwrap();
                assert!(is_aligned_ptr(ptr.as_ptr(), align));
                let bytes = core::slice::from_raw_parts(ptr.as_ptr(), 37);
                assert!(bytes.iter().all(|&b| b == 0));
            }
        }
    }

    #[test]
    fn free_all_keeps_exactly_one_slab() {
        let arena =
            SlabArena::with_config(&SYSTEM_ALLOC, SlabConfig::new().with_slab_size(1024)).unwrap();

        // SAFETY: valid patterns; free_all invalidates the pointers and the
        // test does not reuse them.
        unsafe {
            arena.allocate(1000, 1).unwrap();
            arena.allocate(1000, 1).unwrap();
            arena.allocate(1000, 1).unwrap();
            assert_eq!(arena.slab_count(), 3);

            arena.free_all().unwrap();
        }

        assert_eq!(arena.slab_count(), 1);
        assert_eq!(arena.head(), 0);

        // SAFETY: the retained slab serves fresh allocations again.
        unsafe {
            arena.allocate(64, 1).unwrap();
        }
        assert_eq!(arena.head(), 64);
        assert_eq!(arena.slab_count(), 1);
    }

    #[test]
    fn growth_reallocation_copies_across_slabs() {
        let arena =
            SlabArena::with_config(&SYSTEM_ALLOC, SlabConfig::new().with_slab_size(256)).unwrap();

        // SAFETY: the old pointer is passed with its true size and not used
        // after reallocation.
        unsafe {
            let ptr = arena.allocate(200, 1).unwrap();
            ptr.as_ptr().write_bytes(0xCD, 200);

            // Does not fit the remainder of the 256-byte slab: the grown
            // region lands at the start of a new slab.
            let grown = arena
                .reallocate(ptr.as_ptr(), 200, 240, 1, AllocFlags::empty())
                .unwrap();
            assert_eq!(arena.slab_count(), 2);

            let bytes = core::slice::from_raw_parts(grown, 240);
            assert_eq!(&bytes[..200], &[0xCD; 200]);
            assert_eq!(&bytes[200..], &[0x00; 40]);
        }
    }

    #[test]
    fn free_is_a_no_op() {
        let arena = SlabArena::with_config(&SYSTEM_ALLOC, SlabConfig::small()).unwrap();

        // SAFETY: valid allocate/free patterns.
        unsafe {
            let ptr = arena.allocate(100, 1).unwrap();
            assert_eq!(arena.head(), 100);

            arena.free(ptr.as_ptr(), 100, 1);
            assert_eq!(arena.head(), 100);
        }
    }
}
