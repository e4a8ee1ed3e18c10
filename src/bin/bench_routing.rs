//! Synthetic load driver for `RoutingTable`, standing in for the profiling
//! a constrained target would need before picking `INITIAL_CAPACITY`/
//! `MAX_CHAIN` (§6). Not a criterion-style microbenchmark — just enough to
//! report load factor, rehash count and average probe length for a given
//! insert/expire workload, the way `analyzer::log_parser` reports summary
//! statistics over a run rather than per-event detail.

use aqmesh_mote::node::NodeId;
use aqmesh_mote::routing::RoutingTable;
use embassy_time::{Duration, Instant};
use std::time::Instant as WallInstant;

fn main() {
    env_logger::Builder::from_default_env().filter_level(log::LevelFilter::Info).init();

    let mut args = std::env::args().skip(1);
    let entry_count: u16 = args.next().and_then(|s| s.parse().ok()).unwrap_or(2000);
    let initial_capacity: usize = args.next().and_then(|s| s.parse().ok()).unwrap_or(16);
    let max_chain: usize = args.next().and_then(|s| s.parse().ok()).unwrap_or(7);

    let mut table = RoutingTable::new(initial_capacity, max_chain);
    let started = WallInstant::now();
    let mut out_of_memory = 0u32;

    for i in 1..=entry_count {
        let key = NodeId(i);
        if matches!(table.put(key, key, Instant::from_secs(i as u64)), aqmesh_mote::error::PutOutcome::OutOfMemory) {
            out_of_memory += 1;
        }
    }

    let mut hits = 0u32;
    for i in 1..=entry_count {
        if table.get(NodeId(i)).is_some() {
            hits += 1;
        }
    }

    table.expire_older_than(Instant::from_secs(entry_count as u64), Duration::from_secs(entry_count as u64 / 2));

    let elapsed = started.elapsed();
    println!("entries requested:   {entry_count}");
    println!("final capacity:      {}", table.capacity());
    println!("final size:          {}", table.len());
    println!("load factor:         {:.3}", table.len() as f64 / table.capacity() as f64);
    println!("successful lookups:  {hits}/{entry_count}");
    println!("out-of-memory puts:  {out_of_memory}");
    println!("wall time:           {elapsed:?}");
}
