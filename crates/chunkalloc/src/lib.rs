//! Chunked bump allocation for growable containers.
//!
//! A [`ChunkAllocator`] hands out element slots from fixed-capacity
//! [`Chunk`]s. Requests are served from the newest chunk first, then from
//! leftover space in older chunks, and only then from a freshly created
//! chunk. Individual slots are never reclaimed: `deallocate` is a no-op and
//! all storage is released when the allocator is dropped.
//!
//! # Architecture
//!
//! ```text
//! ArenaVec<T, A> (growable array, generic over ElementAllocator)
//! └── ChunkAllocator<T> (implements ElementAllocator)
//!     └── Chunk<T> (newest) → Chunk<T> → ... → Chunk<T> (oldest)
//!         └── RawSlots<T> (CAPACITY uninitialised slots)
//! ```
//!
//! # Unsafe code
//!
//! Denied at the crate root. Only `raw`, `alloc` and `vec` opt back in,
//! and every block there carries a `// SAFETY:` comment.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod alloc;
pub mod chunk;
pub mod config;
pub mod error;
mod raw;
pub mod vec;

// Public re-exports for the primary API surface.
pub use alloc::{ChunkAllocator, ElementAllocator};
pub use chunk::Chunk;
pub use config::ChunkConfig;
pub use error::ArenaError;
pub use vec::ArenaVec;
