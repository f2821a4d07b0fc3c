//! Utility functions and helpers for keel-memory
//!
//! This module provides common utilities used throughout the crate:
//! - Memory alignment helpers
//! - Size constants
//! - The shared copy-and-zero primitive backing every allocator's growth path

use core::ptr;

/// One kibibyte.
pub const KIB: usize = 1024;

/// One mebibyte.
pub const MIB: usize = 1024 * 1024;

/// Aligns a value up to the nearest multiple of alignment
///
/// # Examples
/// ```
/// use keel_memory::utils::align_up;
///
/// assert_eq!(align_up(7, 8), 8);
/// assert_eq!(align_up(8, 8), 8);
/// assert_eq!(align_up(9, 8), 16);
/// ```
#[inline(always)]
pub const fn align_up(value: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

/// Aligns a value down to the nearest multiple of alignment
///
/// # Examples
/// ```
/// use keel_memory::utils::align_down;
///
/// assert_eq!(align_down(7, 8), 0);
/// assert_eq!(align_down(9, 8), 8);
/// ```
#[inline(always)]
pub const fn align_down(value: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    value & !(alignment - 1)
}

/// Checks if a value is aligned to the given alignment
///
/// # Examples
/// ```
/// use keel_memory::utils::is_aligned;
///
/// assert!(is_aligned(16, 8));
/// assert!(!is_aligned(17, 8));
/// ```
#[inline(always)]
pub const fn is_aligned(value: usize, alignment: usize) -> bool {
    debug_assert!(alignment.is_power_of_two());
    value & (alignment - 1) == 0
}

/// Calculates padding needed to align a value
///
/// # Examples
/// ```
/// use keel_memory::utils::padding_needed;
///
/// assert_eq!(padding_needed(7, 8), 1);
/// assert_eq!(padding_needed(8, 8), 0);
/// ```
#[inline(always)]
pub const fn padding_needed(value: usize, alignment: usize) -> usize {
    align_up(value, alignment) - value
}

/// Check if a pointer is properly aligned
#[inline(always)]
pub fn is_aligned_ptr<T>(ptr: *const T, alignment: usize) -> bool {
    is_aligned(ptr as usize, alignment)
}

/// Copies the surviving bytes of a reallocation and zero-fills the rest.
///
/// This is the one place that implements the interface-wide growth rule:
/// bytes in `[src_size, dst_size)` come out zeroed unless the caller opted
/// out (`zero_tail == false`, i.e. `NON_ZERO` was set). Every backend routes
/// its growth path through here rather than reimplementing the fill.
///
/// Copies `min(src_size, dst_size)` bytes, so a shrinking reallocation never
/// reads past the destination.
///
/// # Safety
///
/// - `dst` must be valid for writes of `dst_size` bytes
/// - `src` must be valid for reads of `min(src_size, dst_size)` bytes, or
///   null with `src_size == 0`
/// - the regions must not overlap
pub(crate) unsafe fn copy_and_zero(
    dst: *mut u8,
    dst_size: usize,
    src: *const u8,
    src_size: usize,
    zero_tail: bool,
) {
    debug_assert!(!dst.is_null());
    debug_assert!(src_size == 0 || !src.is_null());

    let copied = src_size.min(dst_size);
    if copied > 0 {
        // SAFETY: src is readable for `copied` bytes and dst writable for
        // `dst_size >= copied` bytes per the caller contract; no overlap.
        unsafe {
            ptr::copy_nonoverlapping(src, dst, copied);
        }
    }

    if zero_tail && dst_size > copied {
        // SAFETY: dst is writable for dst_size bytes; [copied, dst_size) is
        // the freshly exposed tail.
        unsafe {
            ptr::write_bytes(dst.add(copied), 0, dst_size - copied);
        }
    }
}

/// Bounds check that fails fast through the diagnostics channel.
///
/// The check is always evaluated by default; the `unchecked` cargo feature
/// compiles it down to a `debug_assert!`.
macro_rules! check_bounds {
    ($cond:expr, $($arg:tt)*) => {
        #[cfg(not(feature = "unchecked"))]
        {
            if !$cond {
                $crate::utils::bounds_failure(core::format_args!($($arg)*));
            }
        }
        #[cfg(feature = "unchecked")]
        {
            debug_assert!($cond, $($arg)*);
        }
    };
}

pub(crate) use check_bounds;

/// Terminal path for bounds-check failures: report once, then abort.
#[cold]
#[inline(never)]
pub(crate) fn bounds_failure(msg: core::fmt::Arguments<'_>) -> ! {
    #[cfg(feature = "logging")]
    tracing::error!(code = "MEM:SLICE:BOUNDS", "{msg}");

    panic!("bounds check failure: {msg}");
}
