//! The `Mote` type (§3, §4.4): per-node state plus the dispatch glue that
//! decodes wire messages and routes timer fires to the topology engine,
//! forwarder and slope engine.
//!
//! A `Mote` is constructed once at power-on (§3 "Lifecycles") and is driven
//! entirely by its owner calling `on_broadcast_recv`/`on_unicast_recv`/
//! `on_timer` — there is no internal clock or I/O of its own, which is what
//! makes it possible to drive scenario tests without an async runtime.

use crate::config::MoteConfig;
use crate::error::WireError;
use crate::node::{NodeId, Rank, Role, RssSample, Valve};
use crate::routing::RoutingTable;
use crate::scheduler::{Scheduler, TimerKind};
use crate::slope::SlopeEngine;
use crate::transport::Transport;
use crate::trickle::TrickleTimer;
use crate::wire::Message;
use embassy_time::Instant;
use rand::Rng;

/// Air-quality readings are 0-500 (AQI convention, §1, glossary).
const AQI_MAX: u16 = 500;

/// Observable outcome of processing an incoming unicast packet that the
/// Mote's owner (the run loop, or a test scenario) needs to act on outside
/// the mesh itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoteEvent {
    /// A DATA message reached the root; hand it to the gateway adapter.
    DataForGateway { src_addr: NodeId, value: u16 },
}

pub struct Mote {
    pub addr: NodeId,
    pub role: Role,
    pub in_dodag: bool,
    pub rank: Rank,
    pub parent: Option<crate::node::ParentRecord>,
    pub routing: RoutingTable,
    pub scheduler: Scheduler,
    pub(crate) trickle_send: TrickleTimer,
    pub(crate) trickle_dao: TrickleTimer,
    pub slope: Option<SlopeEngine>,
    pub valve: Option<Valve>,
    pub config: MoteConfig,
}

impl Mote {
    fn new(addr: NodeId, role: Role, config: MoteConfig) -> Mote {
        let trickle = || TrickleTimer::new(config.t_min(), config.t_max());
        Mote {
            addr,
            role,
            in_dodag: role == Role::Root,
            rank: if role == Role::Root { Rank::ROOT } else { Rank::INFINITE },
            parent: None,
            routing: RoutingTable::new(config.initial_capacity, config.max_chain),
            scheduler: Scheduler::new(),
            trickle_send: trickle(),
            trickle_dao: trickle(),
            slope: (role == Role::Compute).then(|| {
                SlopeEngine::new(config.max_tracked, config.max_samples, config.min_samples, config.slope_threshold, config.timeout_children())
            }),
            valve: (role == Role::Sensor).then(Valve::default),
            config,
        }
    }

    pub fn new_root(addr: NodeId, config: MoteConfig) -> Mote {
        Mote::new(addr, Role::Root, config)
    }

    pub fn new_non_root(addr: NodeId, role: Role, config: MoteConfig) -> Mote {
        assert_ne!(role, Role::Root, "use new_root for the root role");
        Mote::new(addr, role, config)
    }

    /// Arm the timers this Mote should be running right after power-on:
    /// root broadcasts DIO and sweeps children immediately; a non-root
    /// starts DETACHED, broadcasting DIS only.
    pub fn start(&mut self, now: Instant) {
        self.scheduler.arm(TimerKind::Send, now, self.config.t_min());
        if self.role == Role::Root {
            self.scheduler.arm(TimerKind::Children, now, self.config.timeout_children());
        }
    }

    /// Process a packet received on the broadcast channel (DIS/DIO).
    pub fn on_broadcast_recv(&mut self, from: NodeId, payload: &[u8], rss: RssSample, now: Instant, transport: &mut impl Transport, rng: &mut impl Rng) {
        match Message::decode(payload) {
            Ok(Message::Dis) => self.handle_dis(),
            Ok(Message::Dio { rank }) => self.handle_dio(from, rank, rss, now, transport, rng),
            Ok(other) => {
                log::debug!("[{:?}] unexpected {:?} on broadcast channel, dropping", self.addr, other.tag());
            }
            Err(err) => self.log_wire_error(err),
        }
    }

    /// Process a packet received on the reliable-unicast channel
    /// (DAO/DATA/OPEN). `from` is the immediate sender, supplied by the
    /// transport layer.
    pub fn on_unicast_recv(&mut self, from: NodeId, payload: &[u8], now: Instant, transport: &mut impl Transport, rng: &mut impl Rng) -> Option<MoteEvent> {
        match Message::decode(payload) {
            Ok(Message::Dao { src_addr }) => {
                self.handle_dao(src_addr, from, now, rng);
                if self.role != Role::Root {
                    self.forward_dao(src_addr, transport);
                }
                None
            }
            Ok(Message::Data { src_addr, value }) => match self.handle_data(src_addr, value, now, transport) {
                crate::forwarder::DataDelivery::DeliverToGateway { src_addr, value } => {
                    Some(MoteEvent::DataForGateway { src_addr, value })
                }
                _ => None,
            },
            Ok(Message::Open { dst_addr }) => {
                self.handle_open(dst_addr, now, transport);
                None
            }
            Ok(other) => {
                log::debug!("[{:?}] unexpected {:?} on unicast channel, dropping", self.addr, other.tag());
                None
            }
            Err(err) => {
                self.log_wire_error(err);
                None
            }
        }
    }

    /// Dispatch a due timer by tag (§4.8, §9 "timers as values").
    pub fn on_timer(&mut self, kind: TimerKind, now: Instant, transport: &mut impl Transport, rng: &mut impl Rng) {
        match kind {
            TimerKind::Send => self.on_send_timer(now, transport, rng),
            TimerKind::Dao => self.on_dao_timer(now, transport, rng),
            TimerKind::Parent => self.on_parent_timer(now, rng),
            TimerKind::Children => self.on_children_timer(now, rng),
            TimerKind::Data => {
                let value = rng.gen_range(0..=AQI_MAX);
                self.on_data_timer(now, value, transport);
            }
            TimerKind::Open => self.on_open_timer(),
        }
    }

    fn log_wire_error(&self, err: WireError) {
        log::warn!("[{:?}] wire error: {err}", self.addr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn start_arms_send_timer_for_every_role() {
        let mut root = Mote::new_root(NodeId(1), MoteConfig::default());
        root.start(Instant::from_secs(0));
        assert!(root.scheduler.is_armed(TimerKind::Send));
        assert!(root.scheduler.is_armed(TimerKind::Children));

        let mut sensor = Mote::new_non_root(NodeId(2), Role::Sensor, MoteConfig::default());
        sensor.start(Instant::from_secs(0));
        assert!(sensor.scheduler.is_armed(TimerKind::Send));
        assert!(!sensor.scheduler.is_armed(TimerKind::Data));
    }

    #[test]
    fn unknown_wire_kind_on_unicast_is_dropped_without_panic() {
        let mut root = Mote::new_root(NodeId(1), MoteConfig::default());
        let mut t = MockTransport::new();
        let mut rng = StdRng::seed_from_u64(1);
        let event = root.on_unicast_recv(NodeId(2), &[200, 1, 2], Instant::from_secs(0), &mut t, &mut rng);
        assert_eq!(event, None);
    }

    #[test]
    fn data_reaching_root_is_reported_as_gateway_event() {
        let mut root = Mote::new_root(NodeId(1), MoteConfig::default());
        let mut t = MockTransport::new();
        let mut rng = StdRng::seed_from_u64(1);
        let payload = Message::Data { src_addr: NodeId(5), value: 77 }.encode();
        let event = root.on_unicast_recv(NodeId(2), &payload, Instant::from_secs(0), &mut t, &mut rng);
        assert_eq!(event, Some(MoteEvent::DataForGateway { src_addr: NodeId(5), value: 77 }));
    }
}
