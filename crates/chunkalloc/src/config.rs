//! Allocator configuration parameters.

use crate::error::ArenaError;

/// Configuration for a [`ChunkAllocator`](crate::ChunkAllocator).
///
/// Validated at construction; immutable after the allocator is created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkConfig {
    /// Number of element slots in every chunk.
    ///
    /// Also the largest single request the allocator accepts.
    /// Default: 1000. Must be non-zero.
    pub capacity: usize,
}

impl ChunkConfig {
    /// Default number of element slots per chunk.
    pub const DEFAULT_CAPACITY: usize = 1000;

    /// Create a config with default values.
    pub fn new() -> Self {
        Self {
            capacity: Self::DEFAULT_CAPACITY,
        }
    }

    /// Create a config with the given per-chunk capacity (in elements).
    pub fn with_capacity(capacity: usize) -> Self {
        Self { capacity }
    }

    /// Check the config for values no allocator can work with.
    pub fn validate(&self) -> Result<(), ArenaError> {
        if self.capacity == 0 {
            return Err(ArenaError::InvalidConfig {
                reason: "capacity must be at least one element".into(),
            });
        }
        Ok(())
    }

    /// Size of one chunk's storage in bytes for element type `T`.
    ///
    /// Saturates at `usize::MAX`; such a chunk can never be allocated.
    pub fn chunk_bytes<T>(&self) -> usize {
        self.capacity.saturating_mul(std::mem::size_of::<T>())
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self::new()
    }
}
