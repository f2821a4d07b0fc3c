//! System heap backend
//!
//! A thin adapter over the platform's aligned heap allocation
//! (`std::alloc`). This is the allocator every thread starts with in the
//! ambient context, and the usual backing allocator for slab arenas.

use std::alloc::{self, Layout};
use std::ptr;

use super::{AllocFlags, Allocator, fail_or_null, validate_align};
use crate::error::{AllocResult, MemoryError};
use crate::utils::copy_and_zero;

/// Alignment floor applied to every request.
///
/// Matches the guarantee of common `malloc` implementations and keeps
/// allocator metadata from ever being under-aligned.
pub(crate) const MIN_ALIGN: usize = 2 * size_of::<*const ()>();

/// Adapter over the platform's aligned heap allocation.
///
/// Every request is floored to [`MIN_ALIGN`] and sized to the
/// alignment-rounded byte count. Reallocation always moves: a new block is
/// allocated, `min(old, new)` bytes are copied, the tail is zero-filled per
/// [`AllocFlags::NON_ZERO`], and the old block is freed.
///
/// Does not support [`AllocFlags::FREE_ALL`]; the heap has no bulk-release
/// notion.
///
/// # Thread Safety
///
/// The system heap itself is thread-safe; this stateless adapter is `Copy`,
/// `Send`, and `Sync`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemAllocator;

/// Process-wide instance, used as the default for the ambient context and
/// for backing slab arenas.
pub static SYSTEM_ALLOC: SystemAllocator = SystemAllocator::new();

impl SystemAllocator {
    /// Creates a new system allocator. Zero-cost; the type holds no state.
    #[inline]
    pub const fn new() -> Self {
        SystemAllocator
    }

    /// Layout for a block of `size` bytes at the floored alignment.
    ///
    /// The block size is `size` rounded up to the alignment, so alloc and
    /// free sites reconstruct identical layouts from (size, align) pairs.
    fn block_layout(size: usize, align: usize) -> AllocResult<Layout> {
        let rounded = size
            .checked_add(align - 1)
            .map(|s| s & !(align - 1))
            .filter(|&s| s <= isize::MAX as usize)
            .ok_or_else(|| MemoryError::size_overflow("system heap block rounding"))?;

        Layout::from_size_align(rounded, align)
            .map_err(|_| MemoryError::invalid_alignment(align))
    }
}

// SAFETY: delegates to the platform heap; pointers come from `alloc::alloc`
// with layouts reconstructed identically on the free path, growth is routed
// through the shared copy_and_zero helper, and no path panics.
unsafe impl Allocator for SystemAllocator {
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
            return Err(MemoryError::unsupported_operation(
                "free_all on the system heap",
            ));
        }

        let align = align.max(MIN_ALIGN);

        // Reconstructed up front: it succeeded when the block was made, and
        // resolving it before any new allocation keeps the error paths
        // leak-free.
        let old_layout = if !ptr.is_null() && old_size > 0 {
            Some(Self::block_layout(old_size, align)?)
        } else {
            None
        };

        if new_size == 0 {
            if let Some(layout) = old_layout {
                // SAFETY: ptr was allocated by this adapter with the same
                // (old_size, align) pair, so the layout reconstructs exactly.
                unsafe { alloc::dealloc(ptr, layout) };
            }
            return Ok(ptr::null_mut());
        }

        let layout = Self::block_layout(new_size, align)?;
        // SAFETY: layout has nonzero, overflow-checked size.
        let new_ptr = unsafe { alloc::alloc(layout) };
        if new_ptr.is_null() {
            return fail_or_null(flags, || MemoryError::allocation_failed(new_size, align));
        }

        // SAFETY: new_ptr is writable for new_size bytes (block is at least
        // that large); ptr is readable for old_size bytes per the caller
        // contract; distinct blocks never overlap.
        unsafe { copy_and_zero(new_ptr, new_size, ptr, old_size, !flags.contains(AllocFlags::NON_ZERO)) };

        if let Some(layout) = old_layout {
            // SAFETY: same layout reconstruction as the free path above.
            unsafe { alloc::dealloc(ptr, layout) };
        }

        Ok(new_ptr)
    }
}
