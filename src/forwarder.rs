//! Upstream DATA and downstream OPEN forwarding (§4.6), plus the compute
//! role's slope-driven OPEN issuance (§4.7).
//!
//! Reworked from `sensor-mote.c`/`root-mote.c`'s forwarding loops and
//! `computation-mote.c`'s DATA-receive handler, generalized across roles.

use crate::mote::Mote;
use crate::node::{NodeId, Role};
use crate::slope::IngestOutcome;
use crate::transport::Transport;
use crate::wire::Message;
use embassy_time::Instant;

/// What the caller (root's gateway adapter, or nothing) should do with a
/// DATA message that reached the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataDelivery {
    /// Forwarded upstream by reliable unicast to the parent.
    Forwarded,
    /// This node is the root: the reading is ready for the gateway adapter.
    DeliverToGateway { src_addr: NodeId, value: u16 },
    /// A compute node consumed the reading for slope analysis.
    Consumed,
}

impl Mote {
    /// Send this sensor's own reading to its parent.
    pub fn send_data(&mut self, value: u16, transport: &mut impl Transport) {
        let Some(parent) = self.parent else {
            log::warn!("[{:?}] no parent, dropping own DATA", self.addr);
            return;
        };
        transport.send_unicast(
            parent.addr,
            Message::Data { src_addr: self.addr, value }.encode(),
            self.config.max_retransmits,
        );
    }

    /// Dispatch for the `Data` timer: sensor nodes only.
    pub fn on_data_timer(&mut self, now: Instant, value: u16, transport: &mut impl Transport) {
        if self.role != Role::Sensor {
            return;
        }
        self.send_data(value, transport);
        self.scheduler.arm(crate::scheduler::TimerKind::Data, now, self.config.data_period());
    }

    /// Handle a received DATA message, originated at `src_addr`.
    ///
    /// Root: deliver to the gateway adapter. Compute: ingest into the slope
    /// engine; `CANNOT_TRACK` falls through to forwarding upstream exactly
    /// like a non-tracking node would. Sensor (relay) and any other case:
    /// forward upstream verbatim, header untouched.
    pub fn handle_data(&mut self, src_addr: NodeId, value: u16, now: Instant, transport: &mut impl Transport) -> DataDelivery {
        if self.role == Role::Root {
            return DataDelivery::DeliverToGateway { src_addr, value };
        }

        if self.role == Role::Compute {
            if let Some(slope) = self.slope.as_mut() {
                match slope.ingest(src_addr, value, now) {
                    IngestOutcome::OpenValve => {
                        self.send_open(src_addr, transport);
                        return DataDelivery::Consumed;
                    }
                    IngestOutcome::CloseValve => return DataDelivery::Consumed,
                    IngestOutcome::CannotTrack => {
                        log::warn!("[{:?}] cannot track {:?}, forwarding DATA upstream", self.addr, src_addr);
                    }
                }
            }
        }

        self.forward_data(src_addr, value, transport);
        DataDelivery::Forwarded
    }

    /// Forward a DATA message upstream verbatim (header untouched).
    fn forward_data(&mut self, src_addr: NodeId, value: u16, transport: &mut impl Transport) {
        let Some(parent) = self.parent else {
            log::warn!("[{:?}] no parent, dropping DATA from {:?}", self.addr, src_addr);
            return;
        };
        transport.send_unicast(parent.addr, Message::Data { src_addr, value }.encode(), self.config.max_retransmits);
    }

    /// Issue an OPEN toward `dst_addr` by looking it up in the routing
    /// table and reliably unicasting to its next hop. No flooding
    /// fallback: a lookup miss is dropped with a diagnostic.
    pub fn send_open(&mut self, dst_addr: NodeId, transport: &mut impl Transport) {
        match self.routing.get(dst_addr) {
            Some(next_hop) => {
                transport.send_unicast(next_hop, Message::Open { dst_addr }.encode(), self.config.max_retransmits);
            }
            None => {
                log::warn!("[{:?}] no route to {:?}, dropping OPEN", self.addr, dst_addr);
            }
        }
    }

    /// Handle a received OPEN addressed to `dst_addr`.
    ///
    /// If this node is the target: actuate the valve (sensor role only — on
    /// any other role this is a programming/config error, logged and
    /// discarded, not a crash). Otherwise forward to the next hop.
    pub fn handle_open(&mut self, dst_addr: NodeId, now: Instant, transport: &mut impl Transport) {
        if dst_addr == self.addr {
            match self.role {
                Role::Sensor => {
                    if let Some(valve) = self.valve.as_mut() {
                        valve.open(now, self.config.open_duration());
                        self.scheduler.arm(crate::scheduler::TimerKind::Open, now, self.config.open_duration());
                        log::info!("[{:?}] valve opened", self.addr);
                    }
                }
                Role::Root | Role::Compute => {
                    log::error!("[{:?}] OPEN addressed to self on non-sensor role", self.addr);
                }
            }
            return;
        }

        self.send_open(dst_addr, transport);
    }

    /// Dispatch for the `Open` timer: auto-close the valve.
    pub fn on_open_timer(&mut self) {
        if let Some(valve) = self.valve.as_mut() {
            valve.close();
            log::info!("[{:?}] valve auto-closed", self.addr);
        }
    }
}
