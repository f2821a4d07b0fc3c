//! # keel-memory
//!
//! Foundation memory management: composable allocators, arenas, and
//! allocator-backed containers.
//!
//! Everything hangs off one polymorphic contract,
//! [`Allocator::reallocate`](allocator::Allocator::reallocate), with three
//! strategies behind it:
//!
//! - [`SystemAllocator`](allocator::SystemAllocator) — the platform heap
//! - [`Arena`](arena::Arena) — bump allocation over a caller-owned buffer
//! - [`SlabArena`](arena::SlabArena) — a growable chain of bump-managed slabs
//!
//! and containers that allocate only through it:
//!
//! - [`DynArray`](array::DynArray) — growable array over any allocator
//! - [`RingBuffer`](ring::RingBuffer) — allocation-free fixed-capacity FIFO
//!
//! Because arenas implement the same contract as the heap, any container can
//! be backed by any strategy:
//!
//! ```
//! use keel_memory::prelude::*;
//!
//! let mut buf = [0u8; 4096];
//! let arena = Arena::new(&mut buf);
//!
//! let mut values = DynArray::new(&arena);
//! for i in 0..100u32 {
//!     values.push(i)?;
//! }
//! assert_eq!(values[42], 42);
//! # Ok::<(), keel_memory::MemoryError>(())
//! ```
//!
//! Code that does not want to thread an allocator through can use the
//! ambient context — a thread-local slot with RAII-scoped override:
//!
//! ```
//! use keel_memory::prelude::*;
//!
//! let mut buf = [0u8; 4096];
//! let arena = Arena::new(&mut buf);
//!
//! {
//!     let _scope = ScopedAlloc::new(&arena);
//!     let mut scratch = DynArray::new(context_alloc());
//!     scratch.push(1u8)?;
//! } // previous allocator restored here, even on unwind
//! # Ok::<(), keel_memory::MemoryError>(())
//! ```
//!
//! ## Features
//!
//! - `logging` (default): route allocation failures and bounds violations
//!   through `tracing`
//! - `unchecked`: compile container bounds checks down to debug assertions
//!
//! ## Concurrency
//!
//! Single-threaded by design: arenas and containers use `Cell`/`RefCell`
//! and are `!Sync`. Sharing one across threads without external
//! synchronization is not supported. The ambient context is per-thread
//! state.

// Error types
pub mod error;

// Core modules
pub mod allocator;
pub mod arena;
pub mod array;
pub mod fs;
pub mod ring;
pub mod utils;

// Re-export the core types at the crate root for convenience
pub use crate::error::{AllocResult, MemoryError, MemoryResult};

pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    pub use crate::allocator::{
        AllocFlags, Allocator, ContextAlloc, ContextTempAlloc, SYSTEM_ALLOC, ScopedAlloc,
        SystemAllocator, context_alloc, context_temp_alloc, with_alloc,
    };
    pub use crate::arena::{Arena, SlabArena, SlabConfig};
    pub use crate::array::DynArray;
    pub use crate::error::{AllocResult, MemoryError, MemoryResult};
    pub use crate::ring::RingBuffer;
}
