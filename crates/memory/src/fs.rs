//! File-read convenience wrappers
//!
//! Boundary collaborators of the allocation layer: they contain no allocator
//! design decisions, but every buffer they hand back is allocated through
//! the caller's [`Allocator`], so reads compose with arenas like any other
//! allocation.
//!
//! [`Allocator`]: crate::allocator::Allocator

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::allocator::Allocator;
use crate::array::DynArray;
use crate::error::{MemoryError, MemoryResult};

/// Reads a file's contents into a buffer allocated through `alloc`.
///
/// # Errors
///
/// [`MemoryError::Io`] on any filesystem failure; allocation errors
/// propagate from the allocator.
pub fn read_bytes<'a>(
    path: impl AsRef<Path>,
    alloc: &'a dyn Allocator,
) -> MemoryResult<DynArray<'a, u8>> {
    let path = path.as_ref();
    let mut file = File::open(path).map_err(|err| MemoryError::io(path, err))?;
    let size = file
        .metadata()
        .map_err(|err| MemoryError::io(path, err))?
        .len() as usize;

    let mut buf = DynArray::with_len(size, size, alloc)?;
    file.read_exact(buf.as_mut_slice())
        .map_err(|err| MemoryError::io(path, err))?;

    Ok(buf)
}

/// Reads a UTF-8 text file into a buffer allocated through `alloc`.
///
/// The returned bytes are validated UTF-8; view them with
/// [`core::str::from_utf8`] (which cannot fail on them) or equivalent.
///
/// # Errors
///
/// [`MemoryError::Io`] on filesystem failure or invalid UTF-8.
pub fn read_string<'a>(
    path: impl AsRef<Path>,
    alloc: &'a dyn Allocator,
) -> MemoryResult<DynArray<'a, u8>> {
    let path = path.as_ref();
    let buf = read_bytes(path, alloc)?;
    core::str::from_utf8(buf.as_slice()).map_err(|err| MemoryError::io(path, err))?;

    Ok(buf)
}
