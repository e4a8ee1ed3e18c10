//! Tiny in-process mesh simulator for the scenario drivers (`spec.md` §8).
//!
//! Stands in for the real radio layer, which is out of scope: links are a
//! fixed symmetric graph of `(NodeId, NodeId) -> rss`, and every send is
//! delivered instantly (no loss, no reordering) rather than modeling the
//! actual air interface. This mirrors how `topology.rs`/`forwarder.rs`'s own
//! unit tests use `MockTransport` directly, just wired up across several
//! motes instead of one.

use aqmesh_mote::node::{NodeId, RssSample};
use aqmesh_mote::transport::{MockTransport, QueuedPacket};
use aqmesh_mote::Mote;
use embassy_time::{Duration, Instant};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{HashMap, VecDeque};

enum Incoming {
    Broadcast { from: NodeId, payload: Vec<u8>, rss: i8 },
    Unicast { from: NodeId, payload: Vec<u8> },
}

/// A small fixed mesh: motes plus a symmetric link graph.
pub struct Network {
    pub motes: HashMap<NodeId, Mote>,
    links: HashMap<(NodeId, NodeId), i8>,
    queue: VecDeque<(NodeId, Incoming)>,
    rng: StdRng,
}

impl Network {
    pub fn new() -> Self {
        Network { motes: HashMap::new(), links: HashMap::new(), queue: VecDeque::new(), rng: StdRng::seed_from_u64(7) }
    }

    pub fn add(&mut self, mote: Mote) {
        self.motes.insert(mote.addr, mote);
    }

    /// Add a symmetric in-range link with the given RSS in both directions.
    pub fn link(&mut self, a: NodeId, b: NodeId, rss: i8) {
        self.links.insert((a, b), rss);
        self.links.insert((b, a), rss);
    }

    /// Remove a link in both directions (simulates the pair moving out of
    /// radio range, or a device failing).
    pub fn unlink(&mut self, a: NodeId, b: NodeId) {
        self.links.remove(&(a, b));
        self.links.remove(&(b, a));
    }

    fn neighbors_of(&self, addr: NodeId) -> Vec<NodeId> {
        self.links.keys().filter(|(from, _)| *from == addr).map(|(_, to)| *to).collect()
    }

    pub fn start_all(&mut self, now: Instant) {
        for mote in self.motes.values_mut() {
            mote.start(now);
        }
    }

    fn enqueue_outgoing(&mut self, addr: NodeId, neighbors: &[NodeId], packets: Vec<QueuedPacket>) {
        for packet in packets {
            match packet {
                QueuedPacket::Broadcast { payload } => {
                    for &nb in neighbors {
                        let rss = *self.links.get(&(nb, addr)).unwrap_or(&-90);
                        self.queue.push_back((nb, Incoming::Broadcast { from: addr, payload: payload.clone(), rss }));
                    }
                }
                QueuedPacket::Unicast { dest, payload, .. } => {
                    if neighbors.contains(&dest) {
                        self.queue.push_back((dest, Incoming::Unicast { from: addr, payload }));
                    }
                    // Destination out of radio range: link-layer drop, no
                    // route at this hop. Trickle's own retry handles it.
                }
            }
        }
    }

    /// Drain every queued delivery (and whatever new traffic it provokes) to
    /// a fixed point at the current instant.
    fn drain_queue(&mut self, now: Instant) {
        while let Some((addr, incoming)) = self.queue.pop_front() {
            let neighbors = self.neighbors_of(addr);
            let Some(mote) = self.motes.get_mut(&addr) else { continue };
            let mut transport = MockTransport::new();
            match incoming {
                Incoming::Broadcast { from, payload, rss } => {
                    mote.on_broadcast_recv(from, &payload, RssSample(rss), now, &mut transport, &mut self.rng);
                }
                Incoming::Unicast { from, payload } => {
                    mote.on_unicast_recv(from, &payload, now, &mut transport, &mut self.rng);
                }
            }
            self.enqueue_outgoing(addr, &neighbors, transport.drain());
        }
    }

    /// Fire every mote's due timers at `now`, then settle the resulting
    /// traffic to a fixed point.
    pub fn tick(&mut self, now: Instant) {
        let addrs: Vec<NodeId> = self.motes.keys().copied().collect();
        for addr in addrs {
            let neighbors = self.neighbors_of(addr);
            let mut transport = MockTransport::new();
            {
                let mote = self.motes.get_mut(&addr).unwrap();
                while let Some(kind) = mote.scheduler.pop_due(now) {
                    mote.on_timer(kind, now, &mut transport, &mut self.rng);
                }
            }
            self.enqueue_outgoing(addr, &neighbors, transport.drain());
        }
        self.drain_queue(now);
    }

    /// Tick once every `step` from `start` through `start + total`.
    pub fn run_for(&mut self, start: Instant, total: Duration, step: Duration) {
        let mut now = start;
        let end = start + total;
        loop {
            self.tick(now);
            if now >= end {
                break;
            }
            now += step;
        }
    }

    pub fn mote(&self, addr: NodeId) -> &Mote {
        self.motes.get(&addr).expect("unknown mote")
    }

    pub fn mote_mut(&mut self, addr: NodeId) -> &mut Mote {
        self.motes.get_mut(&addr).expect("unknown mote")
    }

    /// Hand a batch of packets `from` just produced (outside the normal
    /// timer/recv dispatch, e.g. a gateway command or a hand-crafted test
    /// DATA send) to the mesh, then settle the resulting traffic at `now`.
    pub fn deliver(&mut self, from: NodeId, packets: Vec<QueuedPacket>, now: Instant) {
        let neighbors = self.neighbors_of(from);
        self.enqueue_outgoing(from, &neighbors, packets);
        self.drain_queue(now);
    }

    /// Issue a gateway OPEN command at `from` toward `dst_addr`, the way
    /// `src/bin/node.rs` turns a parsed `GatewayCommand::Open` into a call,
    /// then settle the resulting traffic at `now`.
    pub fn issue_open(&mut self, from: NodeId, dst_addr: NodeId, now: Instant) {
        let mut transport = MockTransport::new();
        self.mote_mut(from).send_open(dst_addr, &mut transport);
        self.deliver(from, transport.drain(), now);
    }
}
