//! Backing storage variants for the slot array.
//!
//! Both variants provide `capacity + 1` slots: the extra slot is the
//! initial sentinel, required so the releaser halves always have a stable
//! slot at the tail to exchange against. All slots are payload-capable
//! because the sentinel role migrates on every release.

use std::alloc::{alloc, dealloc, Layout};
use std::cell::UnsafeCell;
use std::mem;
use std::ptr::NonNull;

use crate::error::{PoolError, Result};
use crate::slot::Slot;

/// Storage seam shared by the inline and heap variants.
///
/// `capacity` is the number of payloads that can be live at once; index
/// `capacity` addresses the extra sentinel slot. Not implementable outside
/// this crate.
pub trait SlotStorage<T>: crate::sealed::Sealed {
    /// Number of simultaneously live payloads.
    fn capacity(&self) -> usize;

    /// Raw pointer to slot `index`, valid for `0..=capacity`.
    fn slot_ptr(&self, index: usize) -> *mut Slot<T>;

    /// Inverse of [`slot_ptr`](SlotStorage::slot_ptr) for a pointer it
    /// previously produced.
    fn index_of(&self, slot: *mut Slot<T>) -> usize;
}

/// Inline backing: `N` payload slots plus the sentinel, all inside the
/// pool value. Construction cannot fail and touches no allocator.
pub struct InlineSlots<T, const N: usize> {
    slots: [UnsafeCell<Slot<T>>; N],
    // Stable Rust cannot spell [Slot<T>; N + 1]; the initial sentinel
    // lives beside the array and answers to index N. The first N payload
    // addresses stay contiguous.
    sentinel: UnsafeCell<Slot<T>>,
}

impl<T, const N: usize> InlineSlots<T, N> {
    pub(crate) fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| UnsafeCell::new(Slot::free())),
            sentinel: UnsafeCell::new(Slot::free()),
        }
    }
}

impl<T, const N: usize> crate::sealed::Sealed for InlineSlots<T, N> {}

impl<T, const N: usize> SlotStorage<T> for InlineSlots<T, N> {
    fn capacity(&self) -> usize {
        N
    }

    fn slot_ptr(&self, index: usize) -> *mut Slot<T> {
        if index == N {
            self.sentinel.get()
        } else {
            self.slots[index].get()
        }
    }

    fn index_of(&self, slot: *mut Slot<T>) -> usize {
        if slot == self.sentinel.get() {
            return N;
        }
        let base = self.slots.as_ptr() as usize;
        (slot as usize - base) / mem::size_of::<Slot<T>>()
    }
}

/// Heap backing: one aligned allocation of `capacity + 1` contiguous
/// slots, acquired at construction and never resized.
#[derive(Debug)]
pub struct HeapSlots<T> {
    base: NonNull<Slot<T>>,
    capacity: usize,
    layout: Layout,
}

impl<T> HeapSlots<T> {
    pub(crate) fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(PoolError::invalid_capacity(capacity));
        }
        let slots = capacity
            .checked_add(1)
            .ok_or(PoolError::invalid_capacity(capacity))?;
        let layout = Layout::array::<Slot<T>>(slots)
            .map_err(|_| PoolError::invalid_capacity(capacity))?;

        // SAFETY: the layout has non-zero size; a slot is at least two
        // machine words.
        let raw = unsafe { alloc(layout) };
        let base = NonNull::new(raw.cast::<Slot<T>>())
            .ok_or(PoolError::out_of_memory(layout.size()))?;

        for index in 0..slots {
            // SAFETY: index is within the fresh allocation.
            unsafe { base.as_ptr().add(index).write(Slot::free()) };
        }

        log::debug!(
            "free-list backing acquired: {} slots, {} bytes",
            slots,
            layout.size()
        );

        Ok(Self {
            base,
            capacity,
            layout,
        })
    }
}

impl<T> Drop for HeapSlots<T> {
    fn drop(&mut self) {
        // Slots carry no drop glue; payloads are destroyed by their
        // handles before the pool can be dropped. Only the region itself
        // is returned.
        // SAFETY: base was allocated with exactly this layout.
        unsafe { dealloc(self.base.as_ptr().cast(), self.layout) };
        log::debug!("free-list backing released: {} bytes", self.layout.size());
    }
}

impl<T> crate::sealed::Sealed for HeapSlots<T> {}

impl<T> SlotStorage<T> for HeapSlots<T> {
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn slot_ptr(&self, index: usize) -> *mut Slot<T> {
        debug_assert!(index <= self.capacity);
        self.base.as_ptr().wrapping_add(index)
    }

    fn index_of(&self, slot: *mut Slot<T>) -> usize {
        (slot as usize - self.base.as_ptr() as usize) / mem::size_of::<Slot<T>>()
    }
}
