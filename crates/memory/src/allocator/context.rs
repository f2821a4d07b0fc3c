//! Ambient allocator context
//!
//! Thread-local "current" and "temporary" allocator slots for code that does
//! not thread an allocator through explicitly. Every thread starts with the
//! system heap in the current slot and a lazily created per-thread slab
//! arena in the temporary slot.
//!
//! [`ScopedAlloc`] swaps a slot for the duration of a lexical scope and
//! restores the previous value unconditionally on every exit path — early
//! return and unwind included — and nests correctly, each guard restoring
//! exactly what it displaced.
//!
//! # Safety
//!
//! The slots hold lifetime-erased pointers. Installing a non-`'static`
//! allocator is safe because the guard restores the slot before the
//! allocator's lifetime ends; what remains on the caller is the contract
//! every [`Allocator`] call already carries: the allocator behind the slot
//! must be live at call time. Allocations obtained through the ambient
//! handles must not outlive the scope that installed their allocator.

use core::cell::Cell;
use core::marker::PhantomData;

use super::{AllocFlags, Allocator};
use crate::arena::{SlabArena, SlabConfig};
use crate::error::AllocResult;
use crate::utils::MIB;

use super::system::SYSTEM_ALLOC;

/// Default slab size of the per-thread temporary arena.
const TEMP_SLAB_SIZE: usize = 4 * MIB;

thread_local! {
    static CURRENT: Cell<*const dyn Allocator> = Cell::new({
        let default: &'static dyn Allocator = &SYSTEM_ALLOC;
        default as *const dyn Allocator
    });

    static TEMP_OVERRIDE: Cell<Option<*const dyn Allocator>> = const { Cell::new(None) };

    static TEMP_ARENA: SlabArena<'static> = SlabArena::with_config(
        &SYSTEM_ALLOC,
        SlabConfig::new().with_slab_size(TEMP_SLAB_SIZE),
    )
    .expect("failed to reserve the per-thread temporary arena");
}

/// Erases the lifetime of an allocator reference for slot storage.
///
/// Sound to call; the stored pointer may only be dereferenced while the
/// original lifetime is live, which [`ScopedAlloc`] guarantees for the
/// window the pointer spends in a slot.
fn erase<'a>(alloc: &'a dyn Allocator) -> *const dyn Allocator {
    let ptr = alloc as *const (dyn Allocator + 'a);
    // SAFETY: fat-pointer layout does not depend on the trait object's
    // lifetime parameter; liveness at dereference time is upheld by the
    // guard discipline documented above.
    unsafe {
        core::mem::transmute::<*const (dyn Allocator + 'a), *const (dyn Allocator + 'static)>(ptr)
    }
}

/// Handle to the thread's current ambient allocator.
///
/// A zero-sized delegate: each call reads the slot and forwards, so the
/// handle itself can be captured for `'static` (e.g. inside a
/// [`DynArray`](crate::array::DynArray)) while the slot contents change
/// underneath it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextAlloc;

/// Handle to the thread's temporary ambient allocator.
///
/// Resolves to the per-thread slab arena unless a [`ScopedAlloc::temp`]
/// override is active. The owner of a cycle (a frame, a request) is expected
/// to bulk-free it once per cycle via [`Allocator::free_all`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextTempAlloc;

/// The thread's current ambient allocator.
pub fn context_alloc() -> &'static ContextAlloc {
    &ContextAlloc
}

/// The thread's temporary ambient allocator.
pub fn context_temp_alloc() -> &'static ContextTempAlloc {
    &ContextTempAlloc
}

// SAFETY: forwards to whichever allocator is installed in the slot; the
// slot always holds a pointer that is live under the guard discipline, and
// the delegate adds no behavior of its own.
unsafe impl Allocator for ContextAlloc {
    unsafe fn reallocate(
        &self,
        ptr: *mut u8,
        old_size: usize,
        new_size: usize,
        align: usize,
        flags: AllocFlags,
    ) -> AllocResult<*mut u8> {
        let target = CURRENT.with(Cell::get);
        // SAFETY: the slot holds either the static system allocator or a
        // guard-installed allocator whose scope is still open; the caller
        // upholds the reallocate contract.
        unsafe { (*target).reallocate(ptr, old_size, new_size, align, flags) }
    }
}

// SAFETY: as for ContextAlloc; the default target is the per-thread
// temporary arena, which lives until thread exit.
unsafe impl Allocator for ContextTempAlloc {
    unsafe fn reallocate(
        &self,
        ptr: *mut u8,
        old_size: usize,
        new_size: usize,
        align: usize,
        flags: AllocFlags,
    ) -> AllocResult<*mut u8> {
        match TEMP_OVERRIDE.with(Cell::get) {
            // SAFETY: as for the current slot.
            Some(target) => unsafe { (*target).reallocate(ptr, old_size, new_size, align, flags) },
            None => TEMP_ARENA.with(|arena| {
                // SAFETY: the arena is owned by this thread's TLS and the
                // caller upholds the reallocate contract.
                unsafe { arena.reallocate(ptr, old_size, new_size, align, flags) }
            }),
        }
    }
}

enum Saved {
    Current(*const dyn Allocator),
    Temp(Option<*const dyn Allocator>),
}

/// Scoped override of an ambient allocator slot.
///
/// Swaps the slot on construction and restores the displaced value when
/// dropped. Restoration runs on every exit path, so nested overrides unwind
/// in construction order even across panics.
///
/// # Examples
///
/// ```
/// use keel_memory::allocator::{ScopedAlloc, context_alloc};
/// use keel_memory::arena::Arena;
/// use keel_memory::array::DynArray;
///
/// let mut buf = [0u8; 4096];
/// let arena = Arena::new(&mut buf);
///
/// {
///     let _scope = ScopedAlloc::new(&arena);
///
///     // Ambient allocations now land in the arena.
///     let mut values = DynArray::new(context_alloc());
///     values.push(1u32)?;
///     assert!(arena.head() > 0);
/// }
/// // Scope closed: the previous allocator is back.
/// # Ok::<(), keel_memory::MemoryError>(())
/// ```
#[must_use = "the override lasts only as long as the guard is alive"]
pub struct ScopedAlloc<'a> {
    saved: Saved,
    _scope: PhantomData<&'a dyn Allocator>,
}

impl<'a> ScopedAlloc<'a> {
    /// Installs `alloc` as the thread's current allocator until the guard
    /// drops.
    pub fn new(alloc: &'a dyn Allocator) -> Self {
        let prev = CURRENT.with(|slot| slot.replace(erase(alloc)));
        Self {
            saved: Saved::Current(prev),
            _scope: PhantomData,
        }
    }

    /// Installs `alloc` as the thread's temporary allocator until the guard
    /// drops.
    pub fn temp(alloc: &'a dyn Allocator) -> Self {
        let prev = TEMP_OVERRIDE.with(|slot| slot.replace(Some(erase(alloc))));
        Self {
            saved: Saved::Temp(prev),
            _scope: PhantomData,
        }
    }
}

impl Drop for ScopedAlloc<'_> {
    fn drop(&mut self) {
        match self.saved {
            Saved::Current(prev) => CURRENT.with(|slot| slot.set(prev)),
            Saved::Temp(prev) => TEMP_OVERRIDE.with(|slot| slot.set(prev)),
        }
    }
}

/// Runs `f` with `alloc` installed as the thread's current allocator.
pub fn with_alloc<R>(alloc: &dyn Allocator, f: impl FnOnce() -> R) -> R {
    let _scope = ScopedAlloc::new(alloc);
    f()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;

    #[test]
    fn threads_start_on_the_system_heap() {
        let ambient = context_alloc();

        // SAFETY: valid allocate/free patterns through the delegate.
        unsafe {
            let ptr = ambient.allocate(64, 8).unwrap();
            ambient.free(ptr.as_ptr(), 64, 8);
        }
    }

    #[test]
    fn scoped_override_redirects_ambient_allocations() {
        let mut buf = [0u8; 1024];
        let arena = Arena::new(&mut buf);

        {
            let _scope = ScopedAlloc::new(&arena);

            // SAFETY: the arena outlives the scope and the pointer.
            unsafe {
                context_alloc().allocate(32, 8).unwrap();
            }
            assert_eq!(arena.head(), 32);
        }

        // Back on the system heap: the arena stays untouched.
        // SAFETY: valid allocate/free pattern.
        unsafe {
            let ptr = context_alloc().allocate(32, 8).unwrap();
            context_alloc().free(ptr.as_ptr(), 32, 8);
        }
        assert_eq!(arena.head(), 32);
    }

    #[test]
    fn nested_overrides_restore_in_order() {
        let mut outer_buf = [0u8; 512];
        let mut inner_buf = [0u8; 512];
        let outer = Arena::new(&mut outer_buf);
        let inner = Arena::new(&mut inner_buf);

        {
            let _outer_scope = ScopedAlloc::new(&outer);
            {
                let _inner_scope = ScopedAlloc::new(&inner);
                // SAFETY: inner outlives its scope.
                unsafe {
                    context_alloc().allocate(16, 1).unwrap();
                }
                assert_eq!(inner.head(), 16);
                assert_eq!(outer.head(), 0);
            }

            // Inner scope closed: ambient is the outer arena again.
            // SAFETY: outer outlives its scope.
            unsafe {
                context_alloc().allocate(16, 1).unwrap();
            }
            assert_eq!(outer.head(), 16);
            assert_eq!(inner.head(), 16);
        }
    }

    #[test]
    fn override_is_restored_across_unwind() {
        let mut buf = [0u8; 256];
        let arena = Arena::new(&mut buf);

        let unwound = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _scope = ScopedAlloc::new(&arena);
            panic!("boom");
        }));
        assert!(unwound.is_err());

        // The slot must be back on the system heap despite the panic.
        // SAFETY: valid allocate/free pattern.
        unsafe {
            let ptr = context_alloc().allocate(16, 1).unwrap();
            context_alloc().free(ptr.as_ptr(), 16, 1);
        }
        assert_eq!(arena.head(), 0);
    }

    #[test]
    fn with_alloc_scopes_the_closure() {
        let mut buf = [0u8; 256];
        let arena = Arena::new(&mut buf);

        let head = with_alloc(&arena, || {
            // SAFETY: the arena outlives the closure.
            unsafe {
                context_alloc().allocate(24, 8).unwrap();
            }
            arena.head()
        });
        assert_eq!(head, 24);
    }

    #[test]
    fn temp_slot_defaults_to_the_thread_arena() {
        let temp = context_temp_alloc();

        // SAFETY: the temporary arena lives until thread exit; free_all
        // invalidates the pointer, which is not used again.
        unsafe {
            let ptr = temp.allocate(128, 16).unwrap();
            assert!(!ptr.as_ptr().is_null());

            temp.free_all().unwrap();
        }
    }

    #[test]
    fn temp_slot_can_be_overridden() {
        let mut buf = [0u8; 256];
        let arena = Arena::new(&mut buf);

        {
            let _scope = ScopedAlloc::temp(&arena);
            // SAFETY: the arena outlives the scope.
            unsafe {
                context_temp_alloc().allocate(48, 1).unwrap();
            }
            assert_eq!(arena.head(), 48);
        }

        // Override gone: the per-thread arena handles temp traffic again.
        // SAFETY: the temporary arena lives until thread exit.
        unsafe {
            context_temp_alloc().allocate(16, 1).unwrap();
        }
        assert_eq!(arena.head(), 48);
    }
}
