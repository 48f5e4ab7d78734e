//! Error handling for pool construction.
//!
//! Running pools never produce errors of this type: exhaustion is reported
//! as an empty allocation (`None`) and a failing payload constructor
//! propagates the caller's own error type unchanged. Only building a
//! heap-backed pool can fail.

use thiserror::Error;

/// Errors surfaced while building a pool.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// Backing storage could not be obtained.
    #[error("memory allocation failed: requested {size} bytes")]
    OutOfMemory {
        /// Number of bytes requested.
        size: usize,
    },

    /// The requested capacity cannot back a pool.
    #[error("invalid pool capacity: {capacity} (at least one slot is required)")]
    InvalidCapacity {
        /// The rejected capacity.
        capacity: usize,
    },
}

impl PoolError {
    /// Create an out of memory error.
    pub fn out_of_memory(size: usize) -> Self {
        Self::OutOfMemory { size }
    }

    /// Create an invalid capacity error.
    pub fn invalid_capacity(capacity: usize) -> Self {
        Self::InvalidCapacity { capacity }
    }
}

/// Result type for pool construction.
pub type Result<T> = std::result::Result<T, PoolError>;
