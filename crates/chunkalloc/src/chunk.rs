//! Fixed-capacity storage chunks.
//!
//! A [`Chunk`] holds `capacity` uninitialised element slots and a bump
//! cursor. Chunks link backwards to the chunk created before them, so the
//! newest chunk owns the whole chain.

use std::ptr::NonNull;

use crate::error::ArenaError;
use crate::raw::RawSlots;

/// One fixed block of element slots with bump allocation.
///
/// Chunks are never compacted and never give slots back: `remaining` only
/// goes down. The storage is released when the chunk is dropped.
pub struct Chunk<T> {
    /// Backing slots, allocated to full capacity at creation.
    slots: RawSlots<T>,
    /// Slots not yet handed out. The next reservation starts at
    /// `capacity - remaining`.
    remaining: usize,
    /// The chunk created immediately before this one.
    previous: Option<Box<Chunk<T>>>,
}

impl<T> Chunk<T> {
    /// Create a chunk with room for `capacity` elements.
    ///
    /// Returns `Err(ArenaError::OutOfMemory)` if the storage cannot be
    /// obtained. No chunk is produced in that case.
    pub fn new(capacity: usize) -> Result<Self, ArenaError> {
        Ok(Self {
            slots: RawSlots::new(capacity)?,
            remaining: capacity,
            previous: None,
        })
    }

    /// Bump-reserve `n` consecutive slots.
    ///
    /// Returns a pointer to the first reserved slot, or `None` if fewer than
    /// `n` slots remain. Reserving zero slots always succeeds and does not
    /// move the cursor.
    pub fn reserve(&mut self, n: usize) -> Option<NonNull<T>> {
        if n > self.remaining {
            return None;
        }
        let ptr = self.slots.slot(self.used());
        self.remaining -= n;
        Some(ptr)
    }

    /// Base address of the chunk's storage.
    pub fn base_ptr(&self) -> NonNull<T> {
        self.slots.slot(0)
    }

    /// Number of slots not yet reserved.
    pub fn free_slots(&self) -> usize {
        self.remaining
    }

    /// Number of slots already reserved.
    pub fn used(&self) -> usize {
        self.capacity() - self.remaining
    }

    /// Total number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Memory usage of the backing storage in bytes.
    pub fn memory_bytes(&self) -> usize {
        self.slots.memory_bytes()
    }

    /// Whether `ptr` addresses a slot of this chunk.
    pub fn contains(&self, ptr: *const T) -> bool {
        self.slots.contains(ptr)
    }

    /// The chunk created before this one, if any.
    pub fn previous(&self) -> Option<&Chunk<T>> {
        self.previous.as_deref()
    }

    pub(crate) fn previous_mut(&mut self) -> Option<&mut Chunk<T>> {
        self.previous.as_deref_mut()
    }

    /// Make `previous` the chunk behind this one.
    pub(crate) fn link(&mut self, previous: Box<Chunk<T>>) {
        debug_assert!(self.previous.is_none(), "chunk already linked");
        self.previous = Some(previous);
    }
}

impl<T> Drop for Chunk<T> {
    fn drop(&mut self) {
        // Unlink the chain in a loop; recursive drop would use stack
        // proportional to the number of chunks.
        let mut previous = self.previous.take();
        while let Some(mut chunk) = previous {
            previous = chunk.previous.take();
        }
    }
}
