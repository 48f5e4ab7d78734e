//! Free-list pools: initialization, allocation, release dispatch, and the
//! concurrency-profile presets.
//!
//! # Architecture
//!
//! - **Backing storage**: `capacity + 1` type-punned slots; the extra slot
//!   is the initial sentinel.
//! - **Allocator half**: detaches slots from the head — wait-free serial
//!   variant or lock-free compare-exchange variant.
//! - **Releaser half**: appends retired slots at the tail — wait-free in
//!   both variants.
//! - **Handles**: every successful allocation returns a
//!   [`PooledPtr`] that owns its slot and releases it on drop.
//!
//! The two halves share no anchor, so any allocator discipline combines
//! with any releaser discipline. The four combinations are exported as the
//! SPSC/SPMC/MPSC/MPMC aliases below, over both storage variants.
//!
//! Exhaustion is not an error: allocation returns `None` when the head is
//! the sentinel. Under a concurrent releaser this can be a transient
//! condition (a release is wait-free but momentarily cuts the list between
//! its tail exchange and its next-publish), so an empty result must not be
//! read as a permanent state.

use std::convert::Infallible;
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ptr::{self, NonNull};
use std::sync::atomic::Ordering;

use crate::discipline::{
    AllocDiscipline, Claim, ConcurrentAlloc, ConcurrentRelease, ReleaseDiscipline, SerialAlloc,
    SerialRelease,
};
use crate::error::Result;
use crate::handle::{PooledPtr, SlotRelease};
use crate::link::{FreeLink, LinkTable};
use crate::slot::{payload_offset, AllocCell, Slot};
use crate::stats::{FreeListStats, StatCounters};
use crate::storage::{HeapSlots, InlineSlots, SlotStorage};

/// Fixed-capacity typed pool over an intrusive free list.
///
/// `S` selects the storage variant, `A` the allocator discipline and `R`
/// the releaser discipline; use the profile aliases unless a bespoke
/// combination is needed. Payload types must be at least one machine word
/// (checked at compile time) so the free-list link fits the slot.
///
/// # Examples
///
/// ```
/// use freepool::MpmcDynamicFreeList;
///
/// let pool: MpmcDynamicFreeList<[u64; 2]> = MpmcDynamicFreeList::new(8)?;
/// let first = pool.allocate([1, 2]).expect("8 slots free");
/// assert_eq!(first[0], 1);
/// drop(first);
/// # Ok::<(), freepool::PoolError>(())
/// ```
pub struct FreeList<T, S, A, R> {
    storage: S,
    alloc: A,
    release: R,
    counters: StatCounters,
    _payload: PhantomData<T>,
}

impl<T, const N: usize, A: AllocDiscipline, R: ReleaseDiscipline>
    FreeList<T, InlineSlots<T, N>, A, R>
{
    /// Create a pool with `N` slots stored inline in the pool value.
    ///
    /// Inline pools of large `N` are large values; construct them on the
    /// heap (`Box::new`) or prefer the dynamic variant when `N` runs into
    /// the thousands.
    pub fn new() -> Self {
        const { assert!(N >= 1, "pool capacity must be at least 1") };
        const {
            assert!(
                mem::size_of::<T>() >= mem::size_of::<usize>(),
                "payload type must be at least one machine word; wrap or pad smaller types"
            )
        };

        let pool = Self {
            storage: InlineSlots::new(),
            alloc: A::default(),
            release: R::default(),
            counters: StatCounters::default(),
            _payload: PhantomData,
        };
        pool.init_links();
        pool
    }
}

impl<T, const N: usize, A: AllocDiscipline, R: ReleaseDiscipline> Default
    for FreeList<T, InlineSlots<T, N>, A, R>
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, A: AllocDiscipline, R: ReleaseDiscipline> FreeList<T, HeapSlots<T>, A, R> {
    /// Create a pool with `capacity` slots in one heap allocation.
    ///
    /// Fails with [`PoolError::InvalidCapacity`](crate::PoolError) when
    /// `capacity` is zero and with
    /// [`PoolError::OutOfMemory`](crate::PoolError) when the backing
    /// region cannot be obtained; no partial pool is exposed.
    pub fn new(capacity: usize) -> Result<Self> {
        const {
            assert!(
                mem::size_of::<T>() >= mem::size_of::<usize>(),
                "payload type must be at least one machine word; wrap or pad smaller types"
            )
        };

        let pool = Self {
            storage: HeapSlots::new(capacity)?,
            alloc: A::default(),
            release: R::default(),
            counters: StatCounters::default(),
            _payload: PhantomData,
        };
        pool.init_links();
        Ok(pool)
    }
}

impl<T, S: SlotStorage<T>, A: AllocDiscipline, R: ReleaseDiscipline> FreeList<T, S, A, R> {
    /// Thread every slot into one chain ending at the sentinel and bind
    /// the anchors. Runs before the pool is shared; ordering is not
    /// load-bearing here.
    fn init_links(&self) {
        let capacity = self.storage.capacity();
        for index in 0..capacity {
            self.link(index).set_next(index + 1);
        }
        self.link(capacity).reset();
        self.alloc.bind(0);
        self.release.bind(capacity);
    }

    /// Number of payloads that can be live at once.
    pub fn capacity(&self) -> usize {
        self.storage.capacity()
    }

    /// Snapshot of the pool's operation counters.
    pub fn stats(&self) -> FreeListStats {
        self.counters.snapshot()
    }

    /// Move `value` into a free slot.
    ///
    /// Returns `None` when the pool is exhausted; `value` is dropped in
    /// that case. Prefer [`allocate_with`](Self::allocate_with) when
    /// building the value is not free.
    pub fn allocate(&self, value: T) -> Option<PooledPtr<'_, T, Self>> {
        self.allocate_with(|| value)
    }

    /// Claim a slot, then build the value with `init`.
    ///
    /// `init` runs only when a slot was actually claimed. Returns `None`
    /// on exhaustion.
    pub fn allocate_with<F>(&self, init: F) -> Option<PooledPtr<'_, T, Self>>
    where
        F: FnOnce() -> T,
    {
        match self.try_allocate_with(|| Ok::<T, Infallible>(init())) {
            Ok(handle) => handle,
            Err(never) => match never {},
        }
    }

    /// Claim a slot, then build the value with a fallible constructor.
    ///
    /// On `Err` the claimed slot is restored to the head of the free list
    /// and the error is returned unchanged: observed from outside, the
    /// pool is in the state it held before the attempt. `Ok(None)` reports
    /// exhaustion, which is not an error and — under a concurrent releaser
    /// — not necessarily permanent. A panicking `init` takes the same
    /// restoration path during unwinding.
    pub fn try_allocate_with<F, E>(
        &self,
        init: F,
    ) -> std::result::Result<Option<PooledPtr<'_, T, Self>>, E>
    where
        F: FnOnce() -> std::result::Result<T, E>,
    {
        let Some(claim) = self.alloc.claim(self) else {
            self.counters.record_exhausted();
            return Ok(None);
        };

        let guard = CancelOnDrop { pool: self, claim };
        match init() {
            Ok(value) => {
                mem::forget(guard);
                // SAFETY: the claim grants exclusive ownership of the slot.
                let payload = unsafe { self.install(claim, value) };
                self.counters.record_allocation();
                // SAFETY: install() fully constructed the payload and its
                // back-pointer; the handle borrows `self` for its lifetime.
                Ok(Some(unsafe { PooledPtr::new(payload) }))
            }
            Err(err) => {
                drop(guard);
                self.counters.record_failed_construction();
                Err(err)
            }
        }
    }

    /// Write the cell into the claimed slot and publish the allocation.
    ///
    /// # Safety
    ///
    /// `claim` must come from this pool's allocator half and not have been
    /// committed or cancelled yet.
    unsafe fn install(&self, claim: Claim, value: T) -> NonNull<T> {
        let cell = self.storage.slot_ptr(claim.index).cast::<AllocCell<T>>();
        // The owner word aliases the link of allocators still holding this
        // slot's index in a stale snapshot; it must be stored atomically
        // (see the slot module).
        unsafe {
            (*cell)
                .owner
                .store(self as *const Self as usize, Ordering::Relaxed);
            ptr::addr_of_mut!((*cell).value).write(value);
        }
        self.alloc.commit(claim);
        // SAFETY: the payload was written just above.
        unsafe { NonNull::new_unchecked(ptr::addr_of_mut!((*cell).value)) }
    }
}

/// Restores a claimed slot when construction fails or unwinds.
struct CancelOnDrop<'a, T, S: SlotStorage<T>, A: AllocDiscipline, R: ReleaseDiscipline> {
    pool: &'a FreeList<T, S, A, R>,
    claim: Claim,
}

impl<T, S: SlotStorage<T>, A: AllocDiscipline, R: ReleaseDiscipline> Drop
    for CancelOnDrop<'_, T, S, A, R>
{
    fn drop(&mut self) {
        self.pool.alloc.cancel(self.pool, self.claim);
    }
}

impl<T, S: SlotStorage<T>, A, R> crate::sealed::Sealed for FreeList<T, S, A, R> {}

impl<T, S: SlotStorage<T>, A, R> LinkTable for FreeList<T, S, A, R> {
    fn link(&self, index: usize) -> &FreeLink {
        let slot = self.storage.slot_ptr(index);
        // SAFETY: slot points into initialized backing storage, and the
        // link word is valid under both slot views because it is only ever
        // accessed atomically.
        unsafe { &(*slot).link }
    }
}

impl<T, S: SlotStorage<T>, A: AllocDiscipline, R: ReleaseDiscipline> SlotRelease<T>
    for FreeList<T, S, A, R>
{
    unsafe fn release_slot(&self, payload: NonNull<T>) {
        // SAFETY: per the trait contract, payload came out of install();
        // the arithmetic inverts the slot layout.
        let slot = unsafe { payload.as_ptr().cast::<u8>().sub(payload_offset::<T>()) }
            .cast::<Slot<T>>();
        let index = self.storage.index_of(slot);
        self.counters.record_release();
        self.release.push(self, index);
    }
}

// SAFETY: every word shared between threads (slot links, back-pointer
// words, concurrent anchors, counters) is atomic; serial anchors are
// single-writer by the discipline contracts documented on the profile
// aliases. `T: Send` is required because a payload allocated on one thread
// may be destroyed on another when its handle migrates.
unsafe impl<T: Send, S: SlotStorage<T>, A: AllocDiscipline, R: ReleaseDiscipline> Send
    for FreeList<T, S, A, R>
{
}
// SAFETY: as above; a shared pool only hands out payload access through
// exclusively owned handles.
unsafe impl<T: Send, S: SlotStorage<T>, A: AllocDiscipline, R: ReleaseDiscipline> Sync
    for FreeList<T, S, A, R>
{
}

impl<T, S: SlotStorage<T>, A: AllocDiscipline, R: ReleaseDiscipline> fmt::Debug
    for FreeList<T, S, A, R>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FreeList")
            .field("capacity", &self.capacity())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

/// Inline-backed pool with explicit disciplines.
pub type StaticFreeList<T, const N: usize, A, R> = FreeList<T, InlineSlots<T, N>, A, R>;

/// Heap-backed pool with explicit disciplines.
pub type DynamicFreeList<T, A, R> = FreeList<T, HeapSlots<T>, A, R>;

/// Inline pool, one allocating thread, one releasing thread at a time.
pub type SpscStaticFreeList<T, const N: usize> = StaticFreeList<T, N, SerialAlloc, SerialRelease>;

/// Inline pool, one allocating thread, any number of releasing threads.
pub type SpmcStaticFreeList<T, const N: usize> =
    StaticFreeList<T, N, SerialAlloc, ConcurrentRelease>;

/// Inline pool, any number of allocating threads, one releasing thread at
/// a time.
pub type MpscStaticFreeList<T, const N: usize> =
    StaticFreeList<T, N, ConcurrentAlloc, SerialRelease>;

/// Inline pool, any number of allocating and releasing threads.
pub type MpmcStaticFreeList<T, const N: usize> =
    StaticFreeList<T, N, ConcurrentAlloc, ConcurrentRelease>;

/// Heap pool, one allocating thread, one releasing thread at a time.
pub type SpscDynamicFreeList<T> = DynamicFreeList<T, SerialAlloc, SerialRelease>;

/// Heap pool, one allocating thread, any number of releasing threads.
pub type SpmcDynamicFreeList<T> = DynamicFreeList<T, SerialAlloc, ConcurrentRelease>;

/// Heap pool, any number of allocating threads, one releasing thread at a
/// time.
pub type MpscDynamicFreeList<T> = DynamicFreeList<T, ConcurrentAlloc, SerialRelease>;

/// Heap pool, any number of allocating and releasing threads.
pub type MpmcDynamicFreeList<T> = DynamicFreeList<T, ConcurrentAlloc, ConcurrentRelease>;
