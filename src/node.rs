//! Node identity, rank, role, and the owned `ParentRecord` (§3, §4.4).

use crate::config::INFINITE_RANK;
use embassy_time::Instant;

/// 16-bit mote address. Zero is reserved for "unassigned."
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u16);

impl NodeId {
    pub const UNASSIGNED: NodeId = NodeId(0);

    /// Link-layer byte order: high octet first.
    pub fn to_wire_bytes(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }

    pub fn from_wire_bytes(buf: &[u8]) -> Option<NodeId> {
        if buf.len() < 2 {
            return None;
        }
        Some(NodeId(u16::from_be_bytes([buf[0], buf[1]])))
    }
}

/// Distance from the root. `0` at the root, `INFINITE_RANK` means detached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Rank(pub u8);

impl Rank {
    pub const ROOT: Rank = Rank(0);
    pub const INFINITE: Rank = Rank(INFINITE_RANK);

    pub fn is_infinite(self) -> bool {
        self.0 == INFINITE_RANK
    }

    /// One hop further than this rank, saturating at `INFINITE_RANK`.
    pub fn next_hop_rank(self) -> Rank {
        if self.0 >= INFINITE_RANK - 1 { Rank::INFINITE } else { Rank(self.0 + 1) }
    }
}

/// Received signal strength indicator, dB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RssSample(pub i8);

/// Fixed at boot; never changes for the lifetime of a Mote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Root,
    Sensor,
    Compute,
}

/// Current parent, owned wholly by the Mote. Exists only while attached;
/// dropped as a unit on detach or replaced as a unit on parent-change rather
/// than mutated field-by-field, so there is never a half-updated parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentRecord {
    pub addr: NodeId,
    pub rank: Rank,
    pub rss: RssSample,
}

/// The physical valve: a boolean actuator with a timed auto-close (§1, §9
/// open question #2 — the actuator itself is only implied by `spec.md`,
/// this is the concrete type the forwarder and scheduler drive).
#[derive(Debug, Clone, Copy, Default)]
pub struct Valve {
    open_until: Option<Instant>,
}

impl Valve {
    pub fn open(&mut self, now: Instant, duration: embassy_time::Duration) {
        self.open_until = Some(now + duration);
    }

    pub fn is_open(&self, now: Instant) -> bool {
        self.open_until.is_some_and(|until| now < until)
    }

    pub fn close(&mut self) {
        self.open_until = None;
    }
}
