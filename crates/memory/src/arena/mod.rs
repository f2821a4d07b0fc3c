//! Arena allocation: bump pointers over owned or borrowed buffers
//!
//! Two strategies, both implementing the crate-wide [`Allocator`] contract:
//!
//! - [`Arena`]: a bump allocator over a single caller-owned buffer. Never
//!   returns memory except through a bulk reset; never grows.
//! - [`SlabArena`]: a growable chain of heap-allocated slabs, each
//!   bump-managed. Grows by appending a slab whenever the active one cannot
//!   satisfy a request.
//!
//! Both are single-threaded by design: interior mutability is `Cell` /
//! `RefCell`, never atomics. Sharing one across threads without external
//! synchronization is not supported.
//!
//! [`Allocator`]: crate::allocator::Allocator

mod bump;
mod slab;

pub use bump::Arena;
pub use slab::{SlabArena, SlabConfig};
