//! Low-level primitives for arena memory operations.
//!
//! [`RawSlots`] owns a fixed block of uninitialised element slots and hands
//! out pointers into it. It never reads, writes or drops element values;
//! that is left to whoever constructs into the slots.

#![allow(unsafe_code)]

use std::mem::{self, MaybeUninit};
use std::ptr::NonNull;

use crate::error::ArenaError;

/// A fixed number of uninitialised `T` slots at a stable address.
pub(crate) struct RawSlots<T> {
    /// Backing storage. Length equals capacity and never changes, so the
    /// heap block never moves.
    buf: Vec<MaybeUninit<T>>,
    /// First slot. Derived once from `buf`; all slot pointers come from here.
    base: NonNull<T>,
}

// SAFETY: `RawSlots` uniquely owns its buffer. `base` only ever points into
// that buffer, so sending the owner sends the slots with it.
unsafe impl<T: Send> Send for RawSlots<T> {}

impl<T> RawSlots<T> {
    /// Reserve storage for `len` slots.
    ///
    /// Fails with [`ArenaError::OutOfMemory`] instead of aborting when the
    /// system cannot provide the block.
    pub(crate) fn new(len: usize) -> Result<Self, ArenaError> {
        let bytes = len
            .checked_mul(mem::size_of::<T>())
            .ok_or(ArenaError::OutOfMemory { bytes: usize::MAX })?;

        let mut buf: Vec<MaybeUninit<T>> = Vec::new();
        buf.try_reserve_exact(len)
            .map_err(|_| ArenaError::OutOfMemory { bytes })?;
        // Capacity is already reserved, so this never reallocates.
        buf.resize_with(len, MaybeUninit::uninit);

        let base = NonNull::from(buf.as_mut_slice()).cast::<T>();
        Ok(Self { buf, base })
    }

    /// Number of slots.
    pub(crate) fn len(&self) -> usize {
        self.buf.len()
    }

    /// Pointer to slot `index`. `index == len()` yields the one-past-the-end
    /// pointer, which is valid for zero-length requests only.
    pub(crate) fn slot(&self, index: usize) -> NonNull<T> {
        assert!(index <= self.len(), "slot index {index} out of bounds");
        // SAFETY: `index <= len`, so the offset stays within the buffer or
        // one past its end, and cannot wrap.
        unsafe { self.base.add(index) }
    }

    /// Whether `ptr` addresses one of the slots.
    pub(crate) fn contains(&self, ptr: *const T) -> bool {
        let start = self.base.as_ptr().addr();
        let addr = ptr.addr();
        let size = mem::size_of::<T>();
        if size == 0 {
            return addr == start;
        }
        addr >= start && addr < start + self.len() * size && (addr - start) % size == 0
    }

    /// Memory usage of the backing storage in bytes.
    pub(crate) fn memory_bytes(&self) -> usize {
        self.len() * mem::size_of::<T>()
    }
}
