//! Basic usage of the freepool crate: a serial inline pool, a concurrent
//! heap pool shared across threads, and the operation counters.

use std::thread;

use freepool::{MpmcDynamicFreeList, SpscStaticFreeList};

#[derive(Debug)]
struct Connection {
    id: u64,
    busy: u64,
}

fn main() {
    println!("=== Inline SPSC pool ===");
    let pool: SpscStaticFreeList<Connection, 4> = SpscStaticFreeList::new();

    let first = pool.allocate(Connection { id: 1, busy: 0 }).unwrap();
    let second = pool.allocate(Connection { id: 2, busy: 0 }).unwrap();
    println!("allocated connections {} and {}", first.id, second.id);

    drop(first);
    let recycled = pool.allocate(Connection { id: 3, busy: 0 }).unwrap();
    println!("slot recycled for connection {}", recycled.id);
    drop((second, recycled));

    println!("\n=== Heap MPMC pool across threads ===");
    let shared: MpmcDynamicFreeList<Connection> = MpmcDynamicFreeList::new(100).unwrap();

    thread::scope(|s| {
        for worker in 0..4u64 {
            let shared = &shared;
            s.spawn(move || {
                let mut held = Vec::new();
                while let Some(conn) = shared.allocate_with(|| Connection {
                    id: worker,
                    busy: 1,
                }) {
                    held.push(conn);
                }
                let busy: u64 = held.iter().map(|conn| conn.busy).sum();
                println!("worker {worker} claimed {busy} connections");
            });
        }
    });

    println!("\n=== Counters ===");
    let stats = shared.stats();
    println!("allocations: {}", stats.allocations);
    println!("releases:    {}", stats.releases);
    println!("peak live:   {}", stats.peak_live);
    println!("live now:    {}", stats.live);
}
