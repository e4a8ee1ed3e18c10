//! Radio transport boundary (§5, §6).
//!
//! The radio MAC and reliable-unicast delivery (retransmission, sequence
//! numbers) are an assumed given service, not something this crate
//! implements — `spec.md` §1 calls them out explicitly as external
//! collaborators. `Transport` is the seam: the topology engine, forwarder
//! and gateway adapter only ever talk to `&mut dyn Transport`, never to a
//! concrete radio. A packet handed to `send_unicast` is fire-and-forget
//! from the Mote's point of view — a reliable-unicast failure is transient
//! and non-fatal (§7); Trickle's next periodic issue is the retry.
//!
//! [`MockTransport`] is the in-process stand-in used by tests, playing the
//! role the simulator's `radio_devices::simulator` plays for
//! `moonblokz-radio-lib`: it records every outbound packet instead of
//! putting it on the air, so a scenario driver can redeliver it to whichever
//! mock mote(s) should receive it.
//!
//! [`ChannelTransport`] is the production-facing binding: it hands
//! outgoing packets to an `embassy_sync` channel rather than to hardware
//! directly, the same indirection the simulator's node tasks use
//! (`RadioInputQueue`/`RadioOutputQueue`) to keep the radio HAL out of the
//! async task body.

use crate::node::NodeId;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::Channel;

/// Outbound radio operations available to Mote logic.
pub trait Transport {
    /// Broadcast a DIS/DIO payload on the broadcast channel.
    fn send_broadcast(&mut self, payload: Vec<u8>);

    /// Reliably unicast a DAO/DATA/OPEN payload to `dest`, with up to
    /// `max_retransmits` attempts handled entirely by the transport.
    fn send_unicast(&mut self, dest: NodeId, payload: Vec<u8>, max_retransmits: u8);
}

/// A packet queued by a [`MockTransport`] or [`ChannelTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueuedPacket {
    Broadcast { payload: Vec<u8> },
    Unicast { dest: NodeId, payload: Vec<u8>, max_retransmits: u8 },
}

/// In-process transport double for deterministic scenario tests. Every send
/// is recorded in order; nothing is ever actually delivered by this type
/// itself — a test scenario decodes [`QueuedPacket`]s and calls the
/// recipient mote's `on_broadcast_recv`/`on_unicast_recv` directly.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    pub sent: Vec<QueuedPacket>,
}

impl MockTransport {
    pub fn new() -> Self {
        MockTransport::default()
    }

    /// Drain every packet queued since the last drain, oldest first.
    pub fn drain(&mut self) -> Vec<QueuedPacket> {
        std::mem::take(&mut self.sent)
    }
}

impl Transport for MockTransport {
    fn send_broadcast(&mut self, payload: Vec<u8>) {
        self.sent.push(QueuedPacket::Broadcast { payload });
    }

    fn send_unicast(&mut self, dest: NodeId, payload: Vec<u8>, max_retransmits: u8) {
        self.sent.push(QueuedPacket::Unicast { dest, payload, max_retransmits });
    }
}

/// Capacity of the outgoing packet channel handed to the real radio driver.
pub const OUTGOING_QUEUE_SIZE: usize = 16;

/// Channel type used by [`ChannelTransport`] to hand packets to whatever
/// task owns the real radio device.
pub type OutgoingQueue = Channel<NoopRawMutex, QueuedPacket, OUTGOING_QUEUE_SIZE>;

/// Production transport: queues outgoing packets for a radio-owning task
/// instead of calling into hardware directly, keeping the radio HAL out of
/// the Mote's synchronous call path.
pub struct ChannelTransport<'a> {
    outgoing: embassy_sync::channel::Sender<'a, NoopRawMutex, QueuedPacket, OUTGOING_QUEUE_SIZE>,
}

impl<'a> ChannelTransport<'a> {
    pub fn new(outgoing: embassy_sync::channel::Sender<'a, NoopRawMutex, QueuedPacket, OUTGOING_QUEUE_SIZE>) -> Self {
        ChannelTransport { outgoing }
    }
}

impl Transport for ChannelTransport<'_> {
    fn send_broadcast(&mut self, payload: Vec<u8>) {
        if self.outgoing.try_send(QueuedPacket::Broadcast { payload }).is_err() {
            log::warn!("outgoing queue full, dropping broadcast");
        }
    }

    fn send_unicast(&mut self, dest: NodeId, payload: Vec<u8>, max_retransmits: u8) {
        if self.outgoing.try_send(QueuedPacket::Unicast { dest, payload, max_retransmits }).is_err() {
            log::warn!("outgoing queue full, dropping unicast to {:?}", dest);
        }
    }
}
