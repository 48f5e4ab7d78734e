//! # freepool: fixed-capacity typed object pools
//!
//! This crate provides typed object pools over a lock-free intrusive free
//! list: O(1) allocation and release of uniformly sized payloads with no
//! general-heap traffic after the pool is built.
//!
//! ## Key properties
//!
//! - **Fixed capacity**: the slot array is sized once, inline in the pool
//!   value or in a single heap allocation, and never grows.
//! - **Intrusive free list**: free slots store their successor index in
//!   the same word that later holds the allocated slot's back-pointer; no
//!   side tables, no per-payload metadata beyond that word.
//! - **Type-level concurrency profiles**: the allocator half and the
//!   releaser half each come in a serial (wait-free, single-thread
//!   contract) and a concurrent flavor, combined freely into SPSC, SPMC,
//!   MPSC and MPMC pools. Concurrent allocation is lock-free; release is
//!   wait-free in every profile.
//! - **Owning handles**: allocation returns a pointer-sized
//!   [`PooledPtr`] that borrows the pool, so handles cannot outlive it;
//!   dropping the handle destroys the payload and recycles the slot.
//!
//! ## Quick start
//!
//! ```
//! use freepool::SpscStaticFreeList;
//!
//! #[derive(Debug, PartialEq)]
//! struct Sample {
//!     a: u32,
//!     b: u32,
//! }
//!
//! let pool: SpscStaticFreeList<Sample, 4> = SpscStaticFreeList::new();
//!
//! let first = pool.allocate(Sample { a: 1, b: 2 }).expect("pool has room");
//! assert_eq!(first.a, 1);
//!
//! // Releasing is scoped to the handle.
//! drop(first);
//! assert_eq!(pool.stats().releases, 1);
//! ```
//!
//! ## Exhaustion versus construction failure
//!
//! An empty pool is not an error: allocation returns `None` and the caller
//! decides what to do (under a concurrent releaser the condition can even
//! be transient, because an in-flight release briefly cuts the list).
//! A failing payload constructor is the caller's error: it propagates
//! unchanged out of [`FreeList::try_allocate_with`] while the claimed slot
//! is restored, so the attempt leaves no trace in the pool.
//!
//! ## Discipline contracts
//!
//! The serial disciplines trade atomics for a contract: at most one thread
//! may drive that half at any moment. The profile aliases document which
//! side carries the contract; the concurrent profiles have none. Payload
//! types must be at least one machine word, which is enforced at compile
//! time.

#![warn(missing_docs)]
#![deny(unsafe_op_in_unsafe_fn)]

mod discipline;
mod error;
mod handle;
mod link;
mod pool;
mod slot;
mod stats;
mod storage;

mod sealed {
    /// Closes the crate's policy traits to outside implementations.
    pub trait Sealed {}
}

pub use discipline::{
    AllocDiscipline, Claim, ConcurrentAlloc, ConcurrentRelease, ReleaseDiscipline, SerialAlloc,
    SerialRelease,
};
pub use error::{PoolError, Result};
pub use handle::{PooledPtr, SlotRelease};
pub use link::{FreeLink, LinkTable};
pub use pool::{
    DynamicFreeList, FreeList, MpmcDynamicFreeList, MpmcStaticFreeList, MpscDynamicFreeList,
    MpscStaticFreeList, SpmcDynamicFreeList, SpmcStaticFreeList, SpscDynamicFreeList,
    SpscStaticFreeList, StaticFreeList,
};
pub use slot::Slot;
pub use stats::FreeListStats;
pub use storage::{HeapSlots, InlineSlots, SlotStorage};
