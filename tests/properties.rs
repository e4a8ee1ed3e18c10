//! Cross-module invariants called out by `spec.md` §8, exercised against
//! the public API rather than against any one module's internals.

use aqmesh_mote::config::MoteConfig;
use aqmesh_mote::node::{NodeId, Rank, RssSample, Role};
use aqmesh_mote::routing::RoutingTable;
use aqmesh_mote::trickle::TrickleTimer;
use aqmesh_mote::transport::MockTransport;
use aqmesh_mote::wire::Message;
use aqmesh_mote::Mote;
use embassy_time::{Duration, Instant};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// `in_dodag` and `parent` never disagree for a non-root mote: attached
/// implies a parent exists, and vice versa.
#[test]
fn in_dodag_and_parent_presence_agree() {
    let mut sensor = Mote::new_non_root(NodeId(2), Role::Sensor, MoteConfig::default());
    let mut t = MockTransport::new();
    let mut rng = StdRng::seed_from_u64(1);
    let now = Instant::from_secs(0);
    assert!(!sensor.in_dodag);
    assert!(sensor.parent.is_none());

    sensor.handle_dio(NodeId(1), Rank::ROOT, RssSample(-50), now, &mut t, &mut rng);
    assert_eq!(sensor.in_dodag, sensor.parent.is_some());
    assert!(sensor.in_dodag);

    sensor.detach(now, &mut rng);
    assert_eq!(sensor.in_dodag, sensor.parent.is_some());
    assert!(!sensor.in_dodag);
}

/// An attached non-root mote's rank is always exactly one hop past its
/// parent's advertised rank.
#[test]
fn rank_is_always_one_hop_past_parent() {
    let mut sensor = Mote::new_non_root(NodeId(2), Role::Sensor, MoteConfig::default());
    let mut t = MockTransport::new();
    let mut rng = StdRng::seed_from_u64(1);
    let now = Instant::from_secs(0);
    sensor.handle_dio(NodeId(1), Rank(4), RssSample(-50), now, &mut t, &mut rng);
    let parent = sensor.parent.unwrap();
    assert_eq!(sensor.rank, parent.rank.next_hop_rank());
}

/// The routing table never lets its load factor reach 0.5 even under heavy
/// insert pressure, because `put` treats `size >= capacity/2` as full and
/// rehashes before accepting the key that would cross that line.
#[test]
fn routing_table_load_factor_stays_bounded() {
    let mut table = RoutingTable::new(8, 7);
    for i in 1..500u16 {
        table.put(NodeId(i), NodeId(i), Instant::from_secs(i as u64));
    }
    assert!((table.len() as f64) < (table.capacity() as f64) * 0.5);
}

/// `get` on a key that was `put` as a direct neighbor (next hop == key)
/// always resolves to that same neighbor.
#[test]
fn get_resolves_direct_neighbor() {
    let mut table = RoutingTable::new(16, 7);
    table.put(NodeId(42), NodeId(42), Instant::from_secs(0));
    assert_eq!(table.get(NodeId(42)), Some(NodeId(42)));
}

/// `detach` always empties the routing table, regardless of how much it
/// held beforehand.
#[test]
fn detach_always_empties_routing_table() {
    let mut compute = Mote::new_non_root(NodeId(5), Role::Compute, MoteConfig::default());
    let mut rng = StdRng::seed_from_u64(1);
    let now = Instant::from_secs(0);
    for i in 1..20u16 {
        compute.routing.put(NodeId(i), NodeId(i), now);
    }
    assert!(!compute.routing.is_empty());
    compute.detach(now, &mut rng);
    assert!(compute.routing.is_empty());
}

/// Every Trickle draw lands within `[T/2, T]` of the interval in force at
/// the moment of the draw, across many seeds and many draws per seed.
#[test]
fn trickle_delay_always_within_half_to_full_interval() {
    for seed in 0..20u64 {
        let mut timer = TrickleTimer::new(Duration::from_secs(2), Duration::from_secs(20));
        let mut rng = StdRng::seed_from_u64(seed);
        for _ in 0..30 {
            let interval = timer.interval();
            let delay = timer.next_delay_and_advance(&mut rng);
            assert!(delay >= interval / 2);
            assert!(delay <= interval);
        }
    }
}

/// Handling the same DAO twice in a row is idempotent: the routing table
/// gains exactly one entry, not two.
#[test]
fn dao_handling_is_idempotent() {
    let mut compute = Mote::new_non_root(NodeId(5), Role::Compute, MoteConfig::default());
    let mut rng = StdRng::seed_from_u64(1);
    let now = Instant::from_secs(0);
    compute.handle_dao(NodeId(30), NodeId(7), now, &mut rng);
    compute.handle_dao(NodeId(30), NodeId(7), now, &mut rng);
    assert_eq!(compute.routing.len(), 1);
    assert_eq!(compute.routing.get(NodeId(30)), Some(NodeId(7)));
}

/// Every message kind round-trips through the wire codec unchanged.
#[test]
fn every_message_kind_round_trips() {
    let messages = [
        Message::Dis,
        Message::Dio { rank: Rank(12) },
        Message::Dao { src_addr: NodeId(9001) },
        Message::Data { src_addr: NodeId(9001), value: 321 },
        Message::Open { dst_addr: NodeId(42) },
    ];
    for msg in messages {
        let encoded = msg.encode();
        assert_eq!(Message::decode(&encoded).unwrap(), msg);
    }
}
