//! Standalone error types for keel-memory
//!
//! Uses thiserror for clean, idiomatic Rust error definitions. Every error
//! is reported through the structured logging channel exactly once, at
//! construction, before it propagates or aborts the operation.

use std::path::Path;

use thiserror::Error;

#[cfg(feature = "logging")]
use tracing::{error, warn};

// ============================================================================
// Main Error Type
// ============================================================================

/// Memory management errors
#[must_use = "errors should be handled"]
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    // --- Allocation Errors ---
    #[error("memory allocation failed: {size} bytes with {align} byte alignment")]
    AllocationFailed { size: usize, align: usize },

    #[error("invalid alignment: {align} (must be a nonzero power of two)")]
    InvalidAlignment { align: usize },

    #[error("unsupported allocator operation: {operation}")]
    UnsupportedOperation { operation: &'static str },

    #[error("size overflow during {operation}")]
    SizeOverflow { operation: &'static str },

    // --- Arena Errors ---
    #[error("arena exhausted: requested {requested} bytes, {available} available")]
    ArenaExhausted { requested: usize, available: usize },

    // --- Container Errors ---
    #[error("subslice bounds [{low}, {high}) violate length {len}")]
    BoundsViolation { low: usize, high: usize, len: usize },

    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("operation on empty container")]
    EmptyContainer,

    // --- Ring Buffer Errors ---
    #[error("ring buffer full (capacity: {capacity})")]
    RingFull { capacity: usize },

    #[error("ring buffer empty")]
    RingEmpty,

    // --- Collaborator Errors ---
    #[error("i/o failure on {path}: {reason}")]
    Io { path: String, reason: String },
}

impl MemoryError {
    /// Check if the error may succeed on retry after the caller frees space
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::AllocationFailed { .. } | Self::ArenaExhausted { .. } | Self::RingFull { .. }
        )
    }

    /// Get error code for categorization
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::AllocationFailed { .. } => "MEM:ALLOC:FAILED",
            Self::InvalidAlignment { .. } => "MEM:ALLOC:ALIGN",
            Self::UnsupportedOperation { .. } => "MEM:ALLOC:UNSUPPORTED",
            Self::SizeOverflow { .. } => "MEM:ALLOC:OVERFLOW",
            Self::ArenaExhausted { .. } => "MEM:ARENA:EXHAUSTED",
            Self::BoundsViolation { .. } => "MEM:SLICE:BOUNDS",
            Self::IndexOutOfRange { .. } => "MEM:SLICE:INDEX",
            Self::EmptyContainer => "MEM:SLICE:EMPTY",
            Self::RingFull { .. } => "MEM:RING:FULL",
            Self::RingEmpty => "MEM:RING:EMPTY",
            Self::Io { .. } => "MEM:IO",
        }
    }

    // ------------------------------------------------------------------------
    // Convenience constructors
    // ------------------------------------------------------------------------

    /// Create allocation failed error
    pub fn allocation_failed(size: usize, align: usize) -> Self {
        #[cfg(feature = "logging")]
        error!(size, align, "memory allocation failed");

        Self::AllocationFailed { size, align }
    }

    /// Create invalid alignment error
    pub fn invalid_alignment(align: usize) -> Self {
        #[cfg(feature = "logging")]
        error!(align, "invalid alignment requested");

        Self::InvalidAlignment { align }
    }

    /// Create unsupported operation error
    pub fn unsupported_operation(operation: &'static str) -> Self {
        #[cfg(feature = "logging")]
        error!(operation, "unsupported allocator operation");

        Self::UnsupportedOperation { operation }
    }

    /// Create size overflow error
    pub fn size_overflow(operation: &'static str) -> Self {
        #[cfg(feature = "logging")]
        error!(operation, "size overflow");

        Self::SizeOverflow { operation }
    }

    /// Create arena exhausted error
    pub fn arena_exhausted(requested: usize, available: usize) -> Self {
        #[cfg(feature = "logging")]
        warn!(requested, available, "arena exhausted");

        Self::ArenaExhausted {
            requested,
            available,
        }
    }

    /// Create subslice bounds violation error
    pub fn bounds_violation(low: usize, high: usize, len: usize) -> Self {
        #[cfg(feature = "logging")]
        error!(low, high, len, "subslice bounds violation");

        Self::BoundsViolation { low, high, len }
    }

    /// Create index out of range error
    pub fn index_out_of_range(index: usize, len: usize) -> Self {
        #[cfg(feature = "logging")]
        error!(index, len, "index out of range");

        Self::IndexOutOfRange { index, len }
    }

    /// Create empty container error
    pub fn empty_container() -> Self {
        #[cfg(feature = "logging")]
        error!("operation on empty container");

        Self::EmptyContainer
    }

    /// Create ring buffer full error
    pub fn ring_full(capacity: usize) -> Self {
        #[cfg(feature = "logging")]
        warn!(capacity, "ring buffer full");

        Self::RingFull { capacity }
    }

    /// Create ring buffer empty error
    pub fn ring_empty() -> Self {
        #[cfg(feature = "logging")]
        warn!("ring buffer empty");

        Self::RingEmpty
    }

    /// Create i/o error
    pub fn io(path: &Path, reason: impl ToString) -> Self {
        let reason = reason.to_string();

        #[cfg(feature = "logging")]
        error!(path = %path.display(), reason = %reason, "i/o failure");

        Self::Io {
            path: path.display().to_string(),
            reason,
        }
    }

    /// Check if this is an invalid alignment error
    #[must_use]
    pub fn is_invalid_alignment(&self) -> bool {
        matches!(self, Self::InvalidAlignment { .. })
    }
}

// ============================================================================
// Result Types
// ============================================================================

/// Result type for memory operations
pub type MemoryResult<T> = core::result::Result<T, MemoryError>;

/// Alias used by the allocator module
pub type AllocResult<T> = MemoryResult<T>;

// ============================================================================
// Tests
// ============================================================================
