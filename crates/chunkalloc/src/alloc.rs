//! The allocator capability trait and the chunked allocator.
//!
//! [`ElementAllocator`] is the interface a growable container needs from its
//! backing storage: allocate by count, construct in place, destroy, and a
//! size ceiling. [`ChunkAllocator`] implements it on top of a chain of
//! [`Chunk`]s.

#![allow(unsafe_code)]

use std::fmt;
use std::iter::FusedIterator;
use std::mem;
use std::ptr::{self, NonNull};

use tracing::{debug, trace};

use crate::chunk::Chunk;
use crate::config::ChunkConfig;
use crate::error::ArenaError;

/// Storage provider for containers of a single element type.
///
/// Memory handed out by [`allocate`](ElementAllocator::allocate) is
/// uninitialised. Containers place values with
/// [`construct`](ElementAllocator::construct), drop them with
/// [`destroy`](ElementAllocator::destroy), and return the block with
/// [`deallocate`](ElementAllocator::deallocate).
pub trait ElementAllocator {
    /// Element type this allocator hands out slots for.
    type Value;

    /// Allocate `n` contiguous uninitialised slots.
    fn allocate(&mut self, n: usize) -> Result<NonNull<Self::Value>, ArenaError>;

    /// Return a block obtained from [`allocate`](ElementAllocator::allocate).
    ///
    /// # Safety
    ///
    /// `ptr` and `n` must describe a block previously returned by this
    /// allocator, and no live values may remain in it.
    unsafe fn deallocate(&mut self, ptr: NonNull<Self::Value>, n: usize);

    /// Move `value` into the slot at `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must address a vacant slot inside a block allocated from this
    /// allocator. Any value already in the slot is overwritten without
    /// being dropped.
    unsafe fn construct(&mut self, ptr: NonNull<Self::Value>, value: Self::Value);

    /// Drop the value in the slot at `ptr`, leaving the slot vacant.
    ///
    /// # Safety
    ///
    /// `ptr` must address an initialised value inside a block allocated from
    /// this allocator, and the value must not be used afterwards.
    unsafe fn destroy(&mut self, ptr: NonNull<Self::Value>);

    /// Largest single request, in bytes.
    fn max_request_size(&self) -> usize;
}

impl<A: ElementAllocator + ?Sized> ElementAllocator for &mut A {
    type Value = A::Value;

    fn allocate(&mut self, n: usize) -> Result<NonNull<Self::Value>, ArenaError> {
        (**self).allocate(n)
    }

    unsafe fn deallocate(&mut self, ptr: NonNull<Self::Value>, n: usize) {
        // SAFETY: forwarded; the caller upholds the contract for `A`.
        unsafe { (**self).deallocate(ptr, n) }
    }

    unsafe fn construct(&mut self, ptr: NonNull<Self::Value>, value: Self::Value) {
        // SAFETY: forwarded; the caller upholds the contract for `A`.
        unsafe { (**self).construct(ptr, value) }
    }

    unsafe fn destroy(&mut self, ptr: NonNull<Self::Value>) {
        // SAFETY: forwarded; the caller upholds the contract for `A`.
        unsafe { (**self).destroy(ptr) }
    }

    fn max_request_size(&self) -> usize {
        (**self).max_request_size()
    }
}

/// Chunked bump allocator.
///
/// Requests are served from the newest chunk, then from the first older
/// chunk (newest to oldest) with enough free slots, and only then from a new
/// chunk. Deallocation is a no-op: freed slots are never reused, and every
/// pointer stays valid until the allocator itself is dropped.
///
/// # Chain layout
///
/// ```text
/// current ──► Chunk (newest) ──► Chunk ──► ... ──► Chunk (oldest)
/// ```
pub struct ChunkAllocator<T> {
    /// Newest chunk; owns every older chunk through its `previous` link.
    current: Option<Box<Chunk<T>>>,
    config: ChunkConfig,
    chunk_count: usize,
}

impl<T> ChunkAllocator<T> {
    /// Create an allocator with the default configuration.
    ///
    /// No memory is requested until the first allocation.
    pub fn new() -> Self {
        Self {
            current: None,
            config: ChunkConfig::default(),
            chunk_count: 0,
        }
    }

    /// Create an allocator with the given configuration.
    ///
    /// Returns `Err(ArenaError::InvalidConfig)` if the config does not
    /// validate.
    pub fn with_config(config: ChunkConfig) -> Result<Self, ArenaError> {
        config.validate()?;
        Ok(Self {
            current: None,
            config,
            chunk_count: 0,
        })
    }

    /// The allocator's configuration.
    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    /// Per-chunk capacity in elements.
    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// Allocate `n` contiguous uninitialised slots.
    ///
    /// Returns `Err(ArenaError::CapacityExceeded)` if `n` is larger than one
    /// chunk, or `Err(ArenaError::OutOfMemory)` if a new chunk was needed
    /// and could not be created.
    pub fn allocate(&mut self, n: usize) -> Result<NonNull<T>, ArenaError> {
        let capacity = self.config.capacity;
        if n > capacity {
            return Err(ArenaError::CapacityExceeded {
                requested: n,
                capacity,
            });
        }

        if let Some(current) = self.current.as_deref_mut() {
            if let Some(ptr) = current.reserve(n) {
                trace!(n, remaining = current.free_slots(), "reserved in current chunk");
                return Ok(ptr);
            }

            // Current chunk is full; look for leftover space in older ones.
            let mut depth = 1usize;
            let mut older = current.previous_mut();
            while let Some(chunk) = older {
                if let Some(ptr) = chunk.reserve(n) {
                    trace!(n, depth, remaining = chunk.free_slots(), "reserved in older chunk");
                    return Ok(ptr);
                }
                depth += 1;
                older = chunk.previous_mut();
            }
        }

        let mut chunk = Box::new(Chunk::new(capacity)?);
        // Cannot fail: `n <= capacity` and the chunk is fresh.
        debug_assert!(n <= chunk.free_slots());
        let ptr = chunk.reserve(n).ok_or(ArenaError::CapacityExceeded {
            requested: n,
            capacity,
        })?;
        if let Some(previous) = self.current.take() {
            chunk.link(previous);
        }
        self.current = Some(chunk);
        self.chunk_count += 1;
        debug!(
            n,
            capacity,
            chunks = self.chunk_count,
            bytes = self.config.chunk_bytes::<T>(),
            "created chunk"
        );
        Ok(ptr)
    }

    /// Largest single request, in bytes: `capacity * size_of::<T>()`.
    pub fn max_request_size(&self) -> usize {
        self.config.chunk_bytes::<T>()
    }

    /// Number of chunks created so far.
    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    /// Iterate over the chunks, newest first.
    pub fn chunks(&self) -> Chunks<'_, T> {
        Chunks {
            next: self.current.as_deref(),
        }
    }

    /// Total memory held by all chunks, in bytes.
    pub fn memory_bytes(&self) -> usize {
        self.chunks().map(Chunk::memory_bytes).sum()
    }

    /// Whether `ptr` addresses a slot in one of this allocator's chunks.
    pub fn owns(&self, ptr: *const T) -> bool {
        self.chunks().any(|chunk| chunk.contains(ptr))
    }
}

impl<T> Default for ChunkAllocator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for ChunkAllocator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkAllocator")
            .field("capacity", &self.config.capacity)
            .field("chunk_count", &self.chunk_count)
            .field("element_size", &mem::size_of::<T>())
            .finish()
    }
}

impl<T> ElementAllocator for ChunkAllocator<T> {
    type Value = T;

    fn allocate(&mut self, n: usize) -> Result<NonNull<T>, ArenaError> {
        ChunkAllocator::allocate(self, n)
    }

    unsafe fn deallocate(&mut self, ptr: NonNull<T>, n: usize) {
        // Slots are never reclaimed; storage lives until the allocator drops.
        // Zero-length blocks may sit one past the end of a full chunk.
        debug_assert!(
            n == 0 || self.owns(ptr.as_ptr()),
            "deallocate of foreign pointer"
        );
        trace!(n, "deallocate ignored");
    }

    unsafe fn construct(&mut self, ptr: NonNull<T>, value: T) {
        debug_assert!(self.owns(ptr.as_ptr()), "construct into foreign pointer");
        // SAFETY: the caller guarantees `ptr` is a vacant slot handed out by
        // this allocator, so it is valid and aligned for a `T` write.
        unsafe { ptr.as_ptr().write(value) }
    }

    unsafe fn destroy(&mut self, ptr: NonNull<T>) {
        debug_assert!(self.owns(ptr.as_ptr()), "destroy of foreign pointer");
        // SAFETY: the caller guarantees `ptr` holds an initialised `T` that
        // is not used again.
        unsafe { ptr::drop_in_place(ptr.as_ptr()) }
    }

    fn max_request_size(&self) -> usize {
        ChunkAllocator::max_request_size(self)
    }
}

/// Iterator over an allocator's chunks, newest first.
///
/// Created by [`ChunkAllocator::chunks`].
pub struct Chunks<'a, T> {
    next: Option<&'a Chunk<T>>,
}

impl<'a, T> Iterator for Chunks<'a, T> {
    type Item = &'a Chunk<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let chunk = self.next?;
        self.next = chunk.previous();
        Some(chunk)
    }
}

impl<T> FusedIterator for Chunks<'_, T> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn allocator(capacity: usize) -> ChunkAllocator<u32> {
        ChunkAllocator::with_config(ChunkConfig::with_capacity(capacity)).unwrap()
    }

    #[test]
    fn no_chunk_before_first_allocation() {
        let alloc = ChunkAllocator::<u32>::new();
        assert_eq!(alloc.chunk_count(), 0);
        assert_eq!(alloc.chunks().count(), 0);
        assert_eq!(alloc.memory_bytes(), 0);
    }

    #[test]
    fn zero_capacity_config_rejected() {
        let result = ChunkAllocator::<u32>::with_config(ChunkConfig::with_capacity(0));
        assert!(matches!(result, Err(ArenaError::InvalidConfig { .. })));
    }

    #[test]
    fn first_allocation_creates_chunk() {
        let mut alloc = allocator(1000);
        let ptr = alloc.allocate(10).unwrap();
        assert_eq!(alloc.chunk_count(), 1);
        assert_eq!(ptr, alloc.chunks().next().unwrap().base_ptr());
    }

    #[test]
    fn oversized_request_fails() {
        let mut alloc = allocator(1000);
        let result = alloc.allocate(1001);
        assert_eq!(
            result,
            Err(ArenaError::CapacityExceeded {
                requested: 1001,
                capacity: 1000,
            })
        );
        assert_eq!(alloc.chunk_count(), 0);
    }

    #[test]
    fn exactly_capacity_succeeds() {
        let mut alloc = allocator(1000);
        assert!(alloc.allocate(1000).is_ok());
        assert_eq!(alloc.chunks().next().unwrap().free_slots(), 0);
    }

    #[test]
    fn full_chunk_forces_new_chunk() {
        let mut alloc = allocator(1000);
        alloc.allocate(1000).unwrap();
        let ptr = alloc.allocate(1).unwrap();
        assert_eq!(alloc.chunk_count(), 2);
        let newest = alloc.chunks().next().unwrap();
        assert_eq!(ptr, newest.base_ptr());
        assert_eq!(newest.free_slots(), 999);
    }

    #[test]
    fn no_chunk_with_room_creates_new_chunk() {
        let mut alloc = allocator(1000);
        alloc.allocate(500).unwrap();
        alloc.allocate(500).unwrap();
        assert_eq!(alloc.chunk_count(), 1);
        alloc.allocate(300).unwrap();
        assert_eq!(alloc.chunk_count(), 2);
    }

    #[test]
    fn older_chunk_leftover_is_reused() {
        let mut alloc = allocator(100);
        alloc.allocate(60).unwrap(); // chunk 0: 40 left
        alloc.allocate(50).unwrap(); // chunk 1: 50 left
        alloc.allocate(45).unwrap(); // chunk 1: 5 left
        let ptr = alloc.allocate(30).unwrap(); // fits only in chunk 0
        assert_eq!(alloc.chunk_count(), 2);
        let oldest = alloc.chunks().last().unwrap();
        assert!(oldest.contains(ptr.as_ptr()));
        assert_eq!(oldest.free_slots(), 10);
    }

    #[test]
    fn current_chunk_preferred_over_older() {
        let mut alloc = allocator(100);
        alloc.allocate(90).unwrap(); // chunk 0: 10 left
        alloc.allocate(20).unwrap(); // chunk 1: 80 left
        let ptr = alloc.allocate(5).unwrap();
        let newest = alloc.chunks().next().unwrap();
        assert!(newest.contains(ptr.as_ptr()));
        assert_eq!(alloc.chunks().last().unwrap().free_slots(), 10);
    }

    #[test]
    fn same_chunk_allocations_do_not_alias() {
        let mut alloc = allocator(100);
        let a = alloc.allocate(10).unwrap();
        let b = alloc.allocate(10).unwrap();
        assert_ne!(a, b);
        assert_eq!(b.as_ptr().addr() - a.as_ptr().addr(), 10 * 4);
    }

    #[test]
    fn deallocate_does_not_reclaim() {
        let mut alloc = allocator(10);
        let ptr = alloc.allocate(10).unwrap();
        unsafe { ElementAllocator::deallocate(&mut alloc, ptr, 10) };
        assert_eq!(alloc.chunks().next().unwrap().free_slots(), 0);
        alloc.allocate(1).unwrap();
        assert_eq!(alloc.chunk_count(), 2);
    }

    #[test]
    fn zero_length_block_on_full_chunk_deallocates() {
        let mut alloc = allocator(4);
        alloc.allocate(4).unwrap();
        let empty = alloc.allocate(0).unwrap();
        assert!(!alloc.owns(empty.as_ptr()));
        unsafe { ElementAllocator::deallocate(&mut alloc, empty, 0) };
        assert_eq!(alloc.chunk_count(), 1);
        assert_eq!(alloc.chunks().next().unwrap().free_slots(), 0);
    }

    #[test]
    fn out_of_memory_leaves_no_chunk_behind() {
        let mut alloc =
            ChunkAllocator::<u64>::with_config(ChunkConfig::with_capacity(usize::MAX / 16))
                .unwrap();
        for _ in 0..2 {
            let result = alloc.allocate(1);
            assert!(matches!(result, Err(ArenaError::OutOfMemory { .. })));
            assert_eq!(alloc.chunk_count(), 0);
            assert_eq!(alloc.chunks().count(), 0);
            assert_eq!(alloc.memory_bytes(), 0);
        }
    }

    #[test]
    fn construct_writes_at_given_pointer() {
        let mut alloc = allocator(10);
        let block = alloc.allocate(3).unwrap();
        unsafe {
            alloc.construct(block, 1);
            alloc.construct(block.add(2), 3);
            assert_eq!(*block.as_ptr(), 1);
            assert_eq!(*block.add(2).as_ptr(), 3);
        }
    }

    #[test]
    fn destroy_runs_drop() {
        use std::rc::Rc;

        let tracker = Rc::new(());
        let mut alloc = ChunkAllocator::<Rc<()>>::new();
        let slot = alloc.allocate(1).unwrap();
        unsafe { alloc.construct(slot, Rc::clone(&tracker)) };
        assert_eq!(Rc::strong_count(&tracker), 2);
        unsafe { alloc.destroy(slot) };
        assert_eq!(Rc::strong_count(&tracker), 1);
    }

    #[test]
    fn max_request_size_is_in_bytes() {
        assert_eq!(allocator(1000).max_request_size(), 4000);
        assert_eq!(ChunkAllocator::<u64>::new().max_request_size(), 8000);
    }

    #[test]
    fn chunks_iterate_newest_first() {
        let mut alloc = allocator(4);
        let first = alloc.allocate(4).unwrap();
        let second = alloc.allocate(4).unwrap();
        let order: Vec<_> = alloc.chunks().map(Chunk::base_ptr).collect();
        assert_eq!(order, vec![second, first]);
        assert_eq!(alloc.memory_bytes(), 2 * 4 * 4);
    }

    #[test]
    fn zero_sized_elements() {
        let mut alloc = ChunkAllocator::<()>::with_config(ChunkConfig::with_capacity(3)).unwrap();
        alloc.allocate(3).unwrap();
        alloc.allocate(1).unwrap();
        assert_eq!(alloc.chunk_count(), 2);
        assert_eq!(alloc.max_request_size(), 0);
    }

    #[test]
    fn allocator_through_mut_ref() {
        fn fill<A: ElementAllocator<Value = u32>>(mut alloc: A) -> NonNull<u32> {
            alloc.allocate(2).unwrap()
        }
        let mut alloc = allocator(10);
        fill(&mut alloc);
        fill(&mut alloc);
        assert_eq!(alloc.chunks().next().unwrap().free_slots(), 6);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn complement_fits_same_chunk(cap in 1usize..2000, frac in 0.0f64..=1.0) {
                let n = ((cap as f64) * frac) as usize;
                let mut alloc = allocator(cap);
                let slot = alloc.allocate(n).unwrap();
                if n > 0 {
                    unsafe {
                        alloc.construct(slot, 7);
                        alloc.destroy(slot);
                    }
                }
                alloc.allocate(cap - n).unwrap();
                prop_assert_eq!(alloc.chunk_count(), 1);
                prop_assert_eq!(alloc.chunks().next().unwrap().free_slots(), 0);
            }

            #[test]
            fn oversized_always_fails(
                cap in 1usize..500,
                extra in 1usize..500,
                prefix in proptest::collection::vec(0usize..500, 0..10),
            ) {
                let mut alloc = allocator(cap);
                for n in prefix {
                    let _ = alloc.allocate(n);
                }
                let result = alloc.allocate(cap + extra);
                let is_capacity_exceeded = matches!(result, Err(ArenaError::CapacityExceeded { .. }));
                prop_assert!(is_capacity_exceeded);
            }

            #[test]
            fn k_full_requests_make_k_chunks(cap in 1usize..200, k in 1usize..20) {
                let mut alloc = allocator(cap);
                for _ in 0..k {
                    alloc.allocate(cap).unwrap();
                }
                prop_assert_eq!(alloc.chunk_count(), k);
                prop_assert_eq!(alloc.chunks().count(), k);
                prop_assert!(alloc.chunks().all(|c| c.free_slots() == 0));
            }

            #[test]
            fn reserved_slots_equal_requested(
                requests in proptest::collection::vec(0usize..=64, 1..50),
            ) {
                let mut alloc = allocator(64);
                for &n in &requests {
                    let ptr = alloc.allocate(n).unwrap();
                    prop_assert!(n == 0 || alloc.owns(ptr.as_ptr()));
                }
                let used: usize = alloc.chunks().map(Chunk::used).sum();
                prop_assert_eq!(used, requests.iter().sum::<usize>());
                prop_assert!(alloc.chunks().all(|c| c.free_slots() <= c.capacity()));
            }
        }
    }
}
