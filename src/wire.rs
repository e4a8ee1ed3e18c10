//! Fixed-layout wire codec for the five RPL-like message kinds.
//!
//! Every message is `type_tag (1 byte) || payload`, no length prefix and no
//! version byte — protocol identity is implicit in the channel plus tag, the
//! way the original firmware punned a leading byte on top of raw packet
//! buffers. Here the union is modeled explicitly as an enum and encoded by
//! hand instead of reinterpreting bytes.

use crate::error::WireError;
use crate::node::{NodeId, Rank};

pub const TAG_DATA: u8 = 0;
pub const TAG_OPEN: u8 = 1;
pub const TAG_DIS: u8 = 2;
pub const TAG_DIO: u8 = 3;
pub const TAG_DAO: u8 = 4;

/// A decoded control or data message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    /// Broadcast solicitation for a DIO.
    Dis,
    /// Broadcast rank advertisement.
    Dio { rank: Rank },
    /// Reliable-unicast destination announcement, verbatim-forwarded.
    Dao { src_addr: NodeId },
    /// Reliable-unicast sensor reading.
    Data { src_addr: NodeId, value: u16 },
    /// Reliable-unicast valve-open command.
    Open { dst_addr: NodeId },
}

impl Message {
    /// Leading type tag for this message kind.
    pub fn tag(&self) -> u8 {
        match self {
            Message::Dis => TAG_DIS,
            Message::Dio { .. } => TAG_DIO,
            Message::Dao { .. } => TAG_DAO,
            Message::Data { .. } => TAG_DATA,
            Message::Open { .. } => TAG_OPEN,
        }
    }

    /// Total encoded size in bytes, tag included.
    pub fn encoded_len(&self) -> usize {
        match self {
            Message::Dis => 1,
            Message::Dio { .. } => 2,
            Message::Dao { .. } => 3,
            Message::Data { .. } => 5,
            Message::Open { .. } => 3,
        }
    }

    /// Encode into a fresh buffer.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        buf.push(self.tag());
        match self {
            Message::Dis => {}
            Message::Dio { rank } => buf.push(rank.0),
            Message::Dao { src_addr } => buf.extend_from_slice(&src_addr.to_wire_bytes()),
            Message::Data { src_addr, value } => {
                buf.extend_from_slice(&src_addr.to_wire_bytes());
                buf.extend_from_slice(&value.to_be_bytes());
            }
            Message::Open { dst_addr } => buf.extend_from_slice(&dst_addr.to_wire_bytes()),
        }
        buf
    }

    /// Decode a packet. NodeId octets are link-layer order (high octet
    /// first); unknown tags or short payloads are rejected rather than
    /// partially parsed.
    pub fn decode(buf: &[u8]) -> Result<Message, WireError> {
        let &tag = buf.first().ok_or(WireError::Truncated { expected: 1, got: 0 })?;
        let payload = &buf[1..];
        match tag {
            TAG_DIS => Ok(Message::Dis),
            TAG_DIO => {
                let rank = *payload.first().ok_or(WireError::Truncated { expected: 2, got: buf.len() })?;
                Ok(Message::Dio { rank: Rank(rank) })
            }
            TAG_DAO => {
                let src_addr = NodeId::from_wire_bytes(payload).ok_or(WireError::Truncated { expected: 3, got: buf.len() })?;
                Ok(Message::Dao { src_addr })
            }
            TAG_DATA => {
                if payload.len() < 4 {
                    return Err(WireError::Truncated { expected: 5, got: buf.len() });
                }
                let src_addr = NodeId::from_wire_bytes(&payload[0..2]).expect("checked length above");
                let value = u16::from_be_bytes([payload[2], payload[3]]);
                Ok(Message::Data { src_addr, value })
            }
            TAG_OPEN => {
                let dst_addr = NodeId::from_wire_bytes(payload).ok_or(WireError::Truncated { expected: 3, got: buf.len() })?;
                Ok(Message::Open { dst_addr })
            }
            other => Err(WireError::UnknownKind(other)),
        }
    }
}
