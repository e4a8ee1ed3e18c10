//! RPL-inspired topology, routing and in-network slope analysis for a
//! low-power air-quality sensor mesh (see `SPEC_FULL.md`).
//!
//! Each node is a single-threaded, cooperatively scheduled `Mote`. The
//! crate has no internal clock or I/O: callers drive a `Mote` by handing it
//! received packets (`Mote::on_broadcast_recv`/`on_unicast_recv`) and due
//! timers (`Mote::on_timer`), which is what makes the whole protocol
//! deterministically testable without an async runtime — see `tests/` for
//! the scenario drivers.

pub mod config;
pub mod error;
pub mod forwarder;
pub mod gateway;
pub mod mote;
pub mod node;
pub mod routing;
pub mod scheduler;
pub mod slope;
pub mod topology;
pub mod transport;
pub mod trickle;
pub mod wire;

pub use config::MoteConfig;
pub use mote::{Mote, MoteEvent};
pub use node::{NodeId, ParentRecord, Rank, Role, RssSample, Valve};
pub use scheduler::{Scheduler, TimerKind};
pub use transport::Transport;
pub use wire::Message;
