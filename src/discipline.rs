//! Allocator and releaser halves as type-level policies.
//!
//! A pool commits to one allocator discipline and one releaser discipline
//! when its type is formed; the four combinations are the SPSC, SPMC, MPSC
//! and MPMC profiles re-exported from the pool module. Serial disciplines
//! keep their anchor in a plain field and are wait-free; concurrent
//! disciplines keep it in a cache-padded atomic. The allocator half only
//! ever moves the head, the releaser half only ever moves the tail, so the
//! two halves can always be mixed freely across threads.
//!
//! # ABA window
//!
//! The concurrent allocator is exposed to the classical ABA pattern: a slot
//! popped by one thread and later released can reappear at the head with
//! the same index while a slow competitor still holds a stale `next` for
//! it. The structure of the list is the defense: releases insert only at
//! the tail, so a slot must travel the whole chain before it can sit at the
//! head again, and a competitor whose head snapshot went stale fails its
//! compare-exchange and rereads. No generation counters are layered on top.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;

use crate::link::{LinkTable, LIST_TAIL};

/// A slot detached, or about to be detached, from the head of the free
/// list, together with the head value observed behind it.
#[derive(Clone, Copy, Debug)]
pub struct Claim {
    pub(crate) index: usize,
    pub(crate) next: usize,
}

/// Allocator-half policy: how the head of the free list advances.
///
/// The claim/commit/cancel protocol is driven by the pool and is not meant
/// to be called directly: `claim` detaches (or designates) the head slot,
/// `commit` makes a successful construction visible, and `cancel` restores
/// the slot when construction fails so the pool is left as if the attempt
/// never happened.
pub trait AllocDiscipline: Default + crate::sealed::Sealed {
    /// Bind the head anchor during pool initialization.
    fn bind(&self, head: usize);

    /// Detach the head slot. Returns `None` when the head is the sentinel,
    /// which callers report as exhaustion.
    fn claim<L: LinkTable>(&self, links: &L) -> Option<Claim>;

    /// Publish a completed construction in the claimed slot.
    fn commit(&self, claim: Claim);

    /// Return a claimed slot whose construction failed to the head.
    fn cancel<L: LinkTable>(&self, links: &L, claim: Claim);

    /// Current head index. Meaningful only on a quiescent pool; used for
    /// diagnostics and tests.
    fn position(&self) -> usize;
}

/// Releaser-half policy: how a retired slot is appended at the tail.
pub trait ReleaseDiscipline: Default + crate::sealed::Sealed {
    /// Bind the tail anchor during pool initialization.
    fn bind(&self, tail: usize);

    /// Append a retired slot. The caller has already destroyed the payload
    /// and holds the only reference to the slot.
    fn push<L: LinkTable>(&self, links: &L, index: usize);

    /// Current tail (sentinel) index. Meaningful only on a quiescent pool.
    fn position(&self) -> usize;
}

/// Single-allocator head: a plain field.
///
/// Contract: at most one thread drives the pool's allocation operations at
/// any moment. The releaser half may still run concurrently on another
/// thread; the two halves share no anchor.
#[derive(Debug, Default)]
pub struct SerialAlloc {
    head: UnsafeCell<usize>,
}

impl crate::sealed::Sealed for SerialAlloc {}

impl AllocDiscipline for SerialAlloc {
    fn bind(&self, head: usize) {
        // Initialization runs before the pool is shared.
        unsafe { *self.head.get() = head };
    }

    fn claim<L: LinkTable>(&self, links: &L) -> Option<Claim> {
        // This thread is the only allocator, so the plain read cannot race
        // another claim.
        let head = unsafe { *self.head.get() };
        let next = links.link(head).next();
        if next == LIST_TAIL {
            return None;
        }
        Some(Claim { index: head, next })
    }

    fn commit(&self, claim: Claim) {
        unsafe { *self.head.get() = claim.next };
    }

    fn cancel<L: LinkTable>(&self, links: &L, claim: Claim) {
        // The head never advanced; restore its link in case the failed
        // construction began overwriting the slot.
        links.link(claim.index).set_next(claim.next);
    }

    fn position(&self) -> usize {
        unsafe { *self.head.get() }
    }
}

/// Multi-allocator head: an atomic index advanced with a compare-exchange
/// retry loop. Lock-free.
#[derive(Debug, Default)]
pub struct ConcurrentAlloc {
    head: CachePadded<AtomicUsize>,
}

impl crate::sealed::Sealed for ConcurrentAlloc {}

impl AllocDiscipline for ConcurrentAlloc {
    fn bind(&self, head: usize) {
        self.head.store(head, Ordering::Release);
    }

    fn claim<L: LinkTable>(&self, links: &L) -> Option<Claim> {
        let mut head = self.head.load(Ordering::Acquire);
        loop {
            let next = links.link(head).next();
            if next == LIST_TAIL {
                // Head is the sentinel. A release caught between its tail
                // exchange and its next-publish also lands here, so empty
                // may be transient; callers must not treat it as final.
                return None;
            }
            match self
                .head
                .compare_exchange(head, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return Some(Claim { index: head, next }),
                Err(observed) => head = observed,
            }
        }
    }

    fn commit(&self, _claim: Claim) {
        // The claim already advanced the head.
    }

    fn cancel<L: LinkTable>(&self, links: &L, claim: Claim) {
        // Reinstate the claimed slot at the head. Nothing else can observe
        // the slot while it is unlinked, so only the head word contends.
        let mut head = self.head.load(Ordering::Acquire);
        loop {
            links.link(claim.index).set_next(head);
            match self.head.compare_exchange(
                head,
                claim.index,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(observed) => head = observed,
            }
        }
    }

    fn position(&self) -> usize {
        self.head.load(Ordering::Acquire)
    }
}

/// Single-releaser tail: a plain field.
///
/// Contract: at most one thread releases handles of the owning pool at any
/// moment. The allocator half may still run concurrently on another
/// thread.
#[derive(Debug, Default)]
pub struct SerialRelease {
    tail: UnsafeCell<usize>,
}

impl crate::sealed::Sealed for SerialRelease {}

impl ReleaseDiscipline for SerialRelease {
    fn bind(&self, tail: usize) {
        unsafe { *self.tail.get() = tail };
    }

    fn push<L: LinkTable>(&self, links: &L, index: usize) {
        links.link(index).reset();
        // This thread is the only releaser, so the plain tail accesses
        // cannot race another push.
        let tail = unsafe { *self.tail.get() };
        links.link(tail).set_next(index);
        unsafe { *self.tail.get() = index };
    }

    fn position(&self) -> usize {
        unsafe { *self.tail.get() }
    }
}

/// Multi-releaser tail: an atomic exchange followed by a next-publish.
/// Wait-free: a bounded pair of atomic operations, no loops.
#[derive(Debug, Default)]
pub struct ConcurrentRelease {
    tail: CachePadded<AtomicUsize>,
}

impl crate::sealed::Sealed for ConcurrentRelease {}

impl ReleaseDiscipline for ConcurrentRelease {
    fn bind(&self, tail: usize) {
        self.tail.store(tail, Ordering::Release);
    }

    fn push<L: LinkTable>(&self, links: &L, index: usize) {
        links.link(index).reset();
        // After the exchange the slot is the sentinel globally, but an
        // allocator reaching the previous sentinel still reads a
        // terminated link until the publish below lands. The list is
        // momentarily cut; allocation reports empty and recovers as soon
        // as the publish completes.
        let prev = self.tail.swap(index, Ordering::AcqRel);
        links.link(prev).set_next(index);
    }

    fn position(&self) -> usize {
        self.tail.load(Ordering::Acquire)
    }
}
