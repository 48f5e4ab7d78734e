//! Concurrency tests: contended allocation, cross-thread release, and the
//! mixed-discipline profiles under load. Handles borrow their pool, so all
//! threading goes through `std::thread::scope`.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Barrier, Mutex};
use std::thread;

use freepool::{
    MpmcDynamicFreeList, MpmcStaticFreeList, MpscDynamicFreeList, SpmcStaticFreeList,
    SpscStaticFreeList,
};

const THREADS: usize = 4;

#[derive(Debug)]
struct TestNode {
    val1: u64,
    val2: u64,
}

impl TestNode {
    fn new(val1: u64, val2: u64) -> Self {
        Self { val1, val2 }
    }
}

/// Four threads race a ten-slot MPMC pool; while every thread still holds
/// its winnings, no payload address may appear twice.
#[test]
fn test_mpmc_unique_payload_addresses() {
    const CAP: usize = 10;
    let pool: MpmcStaticFreeList<TestNode, CAP> = MpmcStaticFreeList::new();
    let barrier = Barrier::new(THREADS);
    let addresses: Mutex<Vec<usize>> = Mutex::new(Vec::new());

    thread::scope(|s| {
        for t in 0..THREADS as u64 {
            let pool = &pool;
            let barrier = &barrier;
            let addresses = &addresses;
            s.spawn(move || {
                let mut held = Vec::new();
                for i in 0..CAP as u64 {
                    if let Some(node) = pool.allocate(TestNode::new(i, t)) {
                        held.push(node);
                    }
                }
                addresses
                    .lock()
                    .unwrap()
                    .extend(held.iter().map(|node| node.as_ptr() as usize));
                // Hold every handle until all threads are done allocating.
                barrier.wait();
                drop(held);
            });
        }
    });

    let all = addresses.into_inner().unwrap();
    let unique: HashSet<usize> = all.iter().copied().collect();
    assert_eq!(unique.len(), all.len(), "payload address handed out twice");
    // Nothing was released during the race, so the winners claimed the
    // pool exactly.
    assert_eq!(all.len(), CAP);

    assert_eq!(pool.stats().live, 0);
    let refill: Vec<_> = (0..CAP as u64)
        .map(|i| pool.allocate(TestNode::new(i, i)).expect("slot free"))
        .collect();
    assert!(pool.allocate(TestNode::new(0, 0)).is_none());
    drop(refill);
}

/// Port of the drain/release race: every thread allocates until the pool
/// reports empty, then releases everything, several rounds in a row.
#[test]
fn test_mpmc_drain_release_rounds() {
    const CAP: usize = 1000;
    let pool: MpmcStaticFreeList<TestNode, CAP> = MpmcStaticFreeList::new();

    for _round in 0..3 {
        thread::scope(|s| {
            for t in 0..THREADS as u64 {
                let pool = &pool;
                s.spawn(move || {
                    let mut held = Vec::new();
                    for i in 0..CAP as u64 {
                        match pool.allocate(TestNode::new(i, t)) {
                            Some(node) => held.push(node),
                            None => break,
                        }
                    }
                    for node in &held {
                        assert_eq!(node.val2, t);
                    }
                    drop(held);
                });
            }
        });
        assert_eq!(pool.stats().live, 0);
    }

    // The pool still serves its whole capacity.
    let refill: Vec<_> = (0..CAP as u64)
        .map(|i| pool.allocate(TestNode::new(i, 0)).expect("slot free"))
        .collect();
    assert!(pool.allocate(TestNode::new(0, 0)).is_none());
    drop(refill);
}

/// MPSC: several allocating threads, exactly one thread releasing handles
/// it receives over a channel.
#[test]
fn test_mpsc_single_releaser() {
    const CAP: usize = 256;
    const PER_THREAD: usize = 2000;
    let pool: MpscDynamicFreeList<TestNode> = MpscDynamicFreeList::new(CAP).unwrap();
    let released = AtomicUsize::new(0);

    thread::scope(|s| {
        let (tx, rx) = mpsc::channel();

        for t in 0..3u64 {
            let pool = &pool;
            let tx = tx.clone();
            s.spawn(move || {
                for i in 0..PER_THREAD as u64 {
                    // The single releaser is draining; spin until a slot
                    // frees up.
                    let node = loop {
                        match pool.allocate(TestNode::new(i, t)) {
                            Some(node) => break node,
                            None => std::hint::spin_loop(),
                        }
                    };
                    tx.send(node).unwrap();
                }
            });
        }
        drop(tx);

        let released = &released;
        s.spawn(move || {
            for node in rx {
                assert!(node.val1 < PER_THREAD as u64);
                drop(node);
                released.fetch_add(1, Ordering::Relaxed);
            }
        });
    });

    assert_eq!(released.load(Ordering::Relaxed), 3 * PER_THREAD);
    assert_eq!(pool.stats().live, 0);
    assert_eq!(pool.stats().allocations, (3 * PER_THREAD) as u64);
}

/// SPMC: one allocating thread fans handles out to several threads that
/// release them concurrently.
#[test]
fn test_spmc_concurrent_releasers() {
    const CAP: usize = 64;
    const TOTAL: usize = 3000;
    let pool: SpmcStaticFreeList<TestNode, CAP> = SpmcStaticFreeList::new();
    let released = AtomicUsize::new(0);

    thread::scope(|s| {
        let mut senders = Vec::new();
        for _ in 0..3 {
            let (tx, rx) = mpsc::channel();
            senders.push(tx);
            let released = &released;
            s.spawn(move || {
                for node in rx {
                    drop(node);
                    released.fetch_add(1, Ordering::Relaxed);
                }
            });
        }

        let pool = &pool;
        s.spawn(move || {
            for i in 0..TOTAL as u64 {
                let node = loop {
                    match pool.allocate(TestNode::new(i, i)) {
                        Some(node) => break node,
                        None => std::hint::spin_loop(),
                    }
                };
                senders[i as usize % senders.len()].send(node).unwrap();
            }
            drop(senders);
        });
    });

    assert_eq!(released.load(Ordering::Relaxed), TOTAL);
    assert_eq!(pool.stats().live, 0);
}

/// SPSC with the two halves on different threads: one allocator, one
/// releaser, a small pool cycling continuously.
#[test]
fn test_spsc_cross_thread_release() {
    const CAP: usize = 8;
    const TOTAL: usize = 5000;
    let pool: SpscStaticFreeList<TestNode, CAP> = SpscStaticFreeList::new();
    let sum = AtomicUsize::new(0);

    thread::scope(|s| {
        let (tx, rx) = mpsc::channel();

        let pool_ref = &pool;
        s.spawn(move || {
            for i in 0..TOTAL as u64 {
                let node = loop {
                    match pool_ref.allocate(TestNode::new(i, 1)) {
                        Some(node) => break node,
                        None => std::hint::spin_loop(),
                    }
                };
                tx.send(node).unwrap();
            }
        });

        let sum = &sum;
        s.spawn(move || {
            for node in rx {
                sum.fetch_add(node.val2 as usize, Ordering::Relaxed);
            }
        });
    });

    assert_eq!(sum.load(Ordering::Relaxed), TOTAL);
    assert_eq!(pool.stats().live, 0);
    assert_eq!(pool.stats().releases, TOTAL as u64);
}

/// Large heap-backed MPMC pool under the drain/release pattern, then a
/// full serial refill to prove nothing was lost or corrupted.
#[test]
fn test_dynamic_mpmc_soak() {
    const CAP: usize = 100_000;
    let pool: MpmcDynamicFreeList<TestNode> = MpmcDynamicFreeList::new(CAP).unwrap();

    for _round in 0..2 {
        thread::scope(|s| {
            for t in 0..THREADS as u64 {
                let pool = &pool;
                s.spawn(move || {
                    let mut held = Vec::new();
                    loop {
                        match pool.allocate(TestNode::new(held.len() as u64, t)) {
                            Some(node) => held.push(node),
                            None => break,
                        }
                    }
                    drop(held);
                });
            }
        });
        assert_eq!(pool.stats().live, 0);
    }

    let refill: Vec<_> = (0..CAP as u64)
        .map(|i| pool.allocate(TestNode::new(i, i)).expect("slot free"))
        .collect();
    assert!(pool.allocate(TestNode::new(0, 0)).is_none());
    for (i, node) in refill.iter().enumerate() {
        assert_eq!(node.val1, i as u64);
    }
    drop(refill);
}
