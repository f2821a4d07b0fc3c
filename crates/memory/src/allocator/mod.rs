//! The uniform allocation contract and its backends
//!
//! Everything in this crate allocates through one polymorphic operation,
//! [`Allocator::reallocate`], which generalizes C's `realloc`:
//!
//! - `new_size == 0` requests a free and returns a null pointer
//! - a null `ptr` with `old_size == 0` requests a fresh allocation
//! - anything else moves an existing allocation to a new size
//!
//! The convenience wrappers ([`Allocator::allocate`], [`Allocator::free`],
//! [`Allocator::free_all`]) are derived from `reallocate` with fixed argument
//! patterns; they are not separate contracts.
//!
//! Backends are trait objects behind `&dyn Allocator`, so any allocator can
//! back any container: the system heap, a fixed-buffer bump arena, or a
//! growable slab arena compose transparently.
//!
//! # Safety
//!
//! The trait is `unsafe` to implement and its methods are `unsafe` to call.
//! The two contract-wide obligations, which no backend can check for the
//! caller, are:
//!
//! - the allocator must outlive every call made through any reference to it
//! - every call must pass the *true* previous size (and alignment) of `ptr`;
//!   the interface does not track sizes

use core::ptr::{self, NonNull};

mod context;
mod system;

pub use context::{
    ContextAlloc, ContextTempAlloc, ScopedAlloc, context_alloc, context_temp_alloc, with_alloc,
};
pub use system::{SYSTEM_ALLOC, SystemAllocator};

pub use crate::error::{AllocResult, MemoryError};

bitflags::bitflags! {
    /// Behavior flags for [`Allocator::reallocate`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AllocFlags: u8 {
        /// Bulk-release everything the allocator owns. Only arena-style
        /// backends support this; others reject it with
        /// [`MemoryError::UnsupportedOperation`].
        const FREE_ALL = 0x1;
        /// Skip the default zero-fill of newly extended bytes.
        const NON_ZERO = 0x2;
        /// Report an allocation failure as a null return instead of an
        /// error. Has no effect on caller bugs (bad alignment, unsupported
        /// operations), which always fail loudly.
        const NO_PANIC = 0x4;
    }
}

/// Allocator contract: one reallocate operation, everything else derived.
///
/// # Safety
///
/// Implementors must ensure that:
/// - returned pointers are non-null, aligned to the requested alignment,
///   and valid for `new_size` bytes of reads and writes
/// - bytes in `[old_size, new_size)` are zeroed on growth unless
///   [`AllocFlags::NON_ZERO`] was passed
/// - a successful reallocation invalidates the old pointer
/// - failures are returned as errors (or null under
///   [`AllocFlags::NO_PANIC`]); implementations never panic themselves
pub unsafe trait Allocator {
    /// Reallocates `ptr` from `old_size` to `new_size` bytes.
    ///
    /// Mirrors C `realloc`, generalized: `new_size == 0` frees and returns
    /// `Ok(null)`; a null `ptr` with `old_size == 0` freshly allocates.
    /// `align` must be a nonzero power of two and must match the alignment
    /// the allocation chain started with.
    ///
    /// # Safety
    ///
    /// - `ptr` must be null or a live allocation of exactly `old_size`
    ///   bytes previously returned by this allocator
    /// - the allocator must outlive the returned pointer's last use
    ///
    /// # Errors
    ///
    /// [`MemoryError::InvalidAlignment`] for a bad `align` (never masked),
    /// [`MemoryError::UnsupportedOperation`] for [`AllocFlags::FREE_ALL`] on
    /// a backend without bulk release, and
    /// [`MemoryError::AllocationFailed`] / [`MemoryError::ArenaExhausted`]
    /// when memory runs out (masked to `Ok(null)` by
    /// [`AllocFlags::NO_PANIC`]).
    unsafe fn reallocate(
        &self,
        ptr: *mut u8,
        old_size: usize,
        new_size: usize,
        align: usize,
        flags: AllocFlags,
    ) -> AllocResult<*mut u8>;

    /// Allocates `size` bytes aligned to `align`.
    ///
    /// Derived from [`Allocator::reallocate`] with a null pointer and zero
    /// old size. `size` must be nonzero.
    ///
    /// # Safety
    ///
    /// Same contract as [`Allocator::reallocate`].
    unsafe fn allocate(&self, size: usize, align: usize) -> AllocResult<NonNull<u8>> {
        debug_assert!(size > 0);

        // SAFETY: fresh-allocation argument pattern; caller upholds the
        // reallocate contract.
        let raw = unsafe { self.reallocate(ptr::null_mut(), 0, size, align, AllocFlags::empty())? };
        NonNull::new(raw).ok_or_else(|| MemoryError::allocation_failed(size, align))
    }

    /// Allocates with explicit flags, returning a raw (possibly null under
    /// [`AllocFlags::NO_PANIC`]) pointer.
    ///
    /// # Safety
    ///
    /// Same contract as [`Allocator::reallocate`].
    unsafe fn allocate_with(
        &self,
        size: usize,
        align: usize,
        flags: AllocFlags,
    ) -> AllocResult<*mut u8> {
        // SAFETY: fresh-allocation argument pattern; caller upholds the
        // reallocate contract.
        unsafe { self.reallocate(ptr::null_mut(), 0, size, align, flags) }
    }

    /// Frees an allocation of `size` bytes.
    ///
    /// Derived from [`Allocator::reallocate`] with `new_size == 0`. `align`
    /// must match the alignment the allocation was made with (Rust's
    /// deallocation contract, unlike C's `free`, requires it).
    ///
    /// # Safety
    ///
    /// - `ptr` must be null or a live allocation of exactly `size` bytes
    ///   from this allocator; it must not be used afterwards
    unsafe fn free(&self, ptr: *mut u8, size: usize, align: usize) {
        // Release through a valid argument pattern is infallible on every
        // backend; a defect here is unrecoverable anyway.
        // SAFETY: free argument pattern; caller upholds the contract.
        let _ = unsafe { self.reallocate(ptr, size, 0, align, AllocFlags::empty()) };
    }

    /// Bulk-releases everything this allocator owns.
    ///
    /// # Safety
    ///
    /// Invalidates every pointer previously returned by this allocator;
    /// the caller must not use any of them afterwards.
    ///
    /// # Errors
    ///
    /// [`MemoryError::UnsupportedOperation`] on backends without bulk
    /// release (e.g. the system heap).
    unsafe fn free_all(&self) -> AllocResult<()> {
        // SAFETY: bulk-release argument pattern; caller guarantees no
        // outstanding pointers are used again.
        unsafe {
            self.reallocate(ptr::null_mut(), 0, 0, 1, AllocFlags::FREE_ALL)
                .map(|_| ())
        }
    }
}

/// Rejects alignments that are not nonzero powers of two.
///
/// Violations are caller bugs: the resulting error is never masked by
/// [`AllocFlags::NO_PANIC`].
#[inline]
pub(crate) fn validate_align(align: usize) -> AllocResult<()> {
    if align == 0 || !align.is_power_of_two() {
        return Err(MemoryError::invalid_alignment(align));
    }
    Ok(())
}

/// Converts an allocation failure into `Ok(null)` under
/// [`AllocFlags::NO_PANIC`]; otherwise constructs and returns the error.
///
/// Takes a closure so the masked path never constructs (and never logs)
/// the error.
#[inline]
pub(crate) fn fail_or_null(
    flags: AllocFlags,
    err: impl FnOnce() -> MemoryError,
) -> AllocResult<*mut u8> {
    if flags.contains(AllocFlags::NO_PANIC) {
        Ok(ptr::null_mut())
    } else {
        Err(err())
    }
}
