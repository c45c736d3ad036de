//! Growable array backed by an [`ElementAllocator`].
//!
//! [`ArenaVec`] is the container the chunked allocator was built for. It
//! grows by doubling, clamped to the allocator's request ceiling, and
//! relocates elements through the allocator's `construct` entry point.

#![allow(unsafe_code)]

use std::fmt;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;
use std::slice;

use crate::alloc::ElementAllocator;
use crate::error::ArenaError;

/// Capacity of the first block a non-empty `ArenaVec` allocates.
const MIN_NON_ZERO_CAP: usize = 4;

/// A contiguous growable array whose storage comes from an allocator.
///
/// Pass `&mut allocator` to share one allocator between several vectors;
/// the allocator must then outlive them.
pub struct ArenaVec<T, A: ElementAllocator<Value = T>> {
    ptr: NonNull<T>,
    cap: usize,
    len: usize,
    alloc: A,
}

impl<T, A: ElementAllocator<Value = T>> ArenaVec<T, A> {
    const IS_ZST: bool = mem::size_of::<T>() == 0;

    /// Create an empty vector. Nothing is allocated until the first push.
    pub fn new_in(alloc: A) -> Self {
        Self {
            ptr: NonNull::dangling(),
            cap: if Self::IS_ZST { usize::MAX } else { 0 },
            len: 0,
            alloc,
        }
    }

    /// Create an empty vector with room for `capacity` elements.
    ///
    /// Returns `Err(ArenaError::CapacityExceeded)` if `capacity` is above
    /// the allocator's ceiling.
    pub fn with_capacity_in(capacity: usize, alloc: A) -> Result<Self, ArenaError> {
        let mut vec = Self::new_in(alloc);
        vec.grow_to(capacity)?;
        Ok(vec)
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the vector holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of elements the current block can hold.
    pub fn capacity(&self) -> usize {
        self.cap
    }

    /// The backing allocator.
    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    /// Largest number of elements a single block can hold.
    pub fn max_len(&self) -> usize {
        if Self::IS_ZST {
            usize::MAX
        } else {
            self.alloc.max_request_size() / mem::size_of::<T>()
        }
    }

    /// Append an element, growing the block if it is full.
    ///
    /// Fails with `ArenaError::CapacityExceeded` once the vector already
    /// holds [`max_len`](ArenaVec::max_len) elements. The vector is left
    /// unchanged on error.
    pub fn push(&mut self, value: T) -> Result<(), ArenaError> {
        if self.len == self.cap {
            let ceiling = self.max_len();
            if self.cap >= ceiling {
                return Err(ArenaError::CapacityExceeded {
                    requested: self.cap.saturating_add(1),
                    capacity: ceiling,
                });
            }
            let new_cap = self.cap.saturating_mul(2).max(MIN_NON_ZERO_CAP).min(ceiling);
            self.grow_to(new_cap)?;
        }
        self.place(self.len, value);
        self.len += 1;
        Ok(())
    }

    /// Append every item from `iter`, stopping at the first failure.
    pub fn try_extend<I: IntoIterator<Item = T>>(&mut self, iter: I) -> Result<(), ArenaError> {
        for value in iter {
            self.push(value)?;
        }
        Ok(())
    }

    /// Remove and return the last element.
    pub fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        // SAFETY: slot `len` was initialised and is now outside the live
        // range, so reading it moves the value out exactly once.
        Some(unsafe { self.slot(self.len).read() })
    }

    /// Drop every element, keeping the block.
    pub fn clear(&mut self) {
        let len = self.len;
        // Shrink first so a panicking destructor cannot cause a double drop.
        self.len = 0;
        for index in 0..len {
            self.drop_slot(index);
        }
    }

    /// The elements as a slice.
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: `ptr` is non-null and aligned, and the first `len` slots
        // are initialised.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// The elements as a mutable slice.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: as for `as_slice`, and `&mut self` guarantees exclusivity.
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    fn slot(&self, index: usize) -> NonNull<T> {
        debug_assert!(index < self.cap);
        // SAFETY: `index < cap`, so the slot lies inside the current block.
        // For zero-sized `T` the offset is a no-op.
        unsafe { self.ptr.add(index) }
    }

    /// Move `value` into vacant slot `index`.
    fn place(&mut self, index: usize, value: T) {
        let slot = self.slot(index);
        if Self::IS_ZST {
            mem::forget(value);
            return;
        }
        // SAFETY: `slot` is a vacant slot of a block allocated from `alloc`.
        unsafe { self.alloc.construct(slot, value) }
    }

    /// Drop the value in slot `index`.
    fn drop_slot(&mut self, index: usize) {
        let slot = self.slot(index);
        if Self::IS_ZST {
            // SAFETY: any aligned non-null pointer is valid for a
            // zero-sized value, and the caller no longer counts it as live.
            unsafe { slot.as_ptr().drop_in_place() };
            return;
        }
        // SAFETY: the slot holds an initialised value that is no longer
        // part of the live range.
        unsafe { self.alloc.destroy(slot) }
    }

    /// Move the elements into a block of `new_cap` slots.
    fn grow_to(&mut self, new_cap: usize) -> Result<(), ArenaError> {
        if Self::IS_ZST || new_cap <= self.cap {
            return Ok(());
        }
        let new_ptr = self.alloc.allocate(new_cap)?;
        for index in 0..self.len {
            // SAFETY: the old slot is initialised and is read exactly once;
            // the new slot lies inside the fresh block and is vacant.
            unsafe {
                let value = self.ptr.add(index).read();
                self.alloc.construct(new_ptr.add(index), value);
            }
        }
        if self.cap > 0 {
            // SAFETY: `ptr`/`cap` describe the previous block from `alloc`,
            // and every value has just been moved out of it.
            unsafe { self.alloc.deallocate(self.ptr, self.cap) };
        }
        self.ptr = new_ptr;
        self.cap = new_cap;
        Ok(())
    }
}

impl<T, A: ElementAllocator<Value = T>> Drop for ArenaVec<T, A> {
    fn drop(&mut self) {
        self.clear();
        if !Self::IS_ZST && self.cap > 0 {
            // SAFETY: the block came from `alloc` and `clear` emptied it.
            unsafe { self.alloc.deallocate(self.ptr, self.cap) };
        }
    }
}

impl<T, A: ElementAllocator<Value = T>> Deref for ArenaVec<T, A> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T, A: ElementAllocator<Value = T>> DerefMut for ArenaVec<T, A> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T: fmt::Debug, A: ElementAllocator<Value = T>> fmt::Debug for ArenaVec<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
