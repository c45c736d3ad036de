//! Allocator error types.

use std::error::Error;
use std::fmt;

/// Errors that can occur during allocator operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArenaError {
    /// A single request asked for more elements than one chunk holds.
    ///
    /// This is a hard ceiling: no chunk can ever satisfy the request, so
    /// callers must not retry it.
    CapacityExceeded {
        /// Number of elements requested.
        requested: usize,
        /// Per-chunk capacity in elements.
        capacity: usize,
    },
    /// The system refused to provide storage for a new chunk.
    OutOfMemory {
        /// Size of the failed request in bytes.
        bytes: usize,
    },
    /// The allocator configuration was rejected at construction.
    InvalidConfig {
        /// Human-readable description of the problem.
        reason: String,
    },
}

impl fmt::Display for ArenaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapacityExceeded {
                requested,
                capacity,
            } => {
                write!(
                    f,
                    "chunk capacity exceeded: requested {requested} elements, capacity {capacity} elements"
                )
            }
            Self::OutOfMemory { bytes } => {
                write!(f, "out of memory allocating a {bytes} byte chunk")
            }
            Self::InvalidConfig { reason } => {
                write!(f, "invalid allocator config: {reason}")
            }
        }
    }
}

impl Error for ArenaError {}
