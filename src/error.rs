//! Domain error types.
//!
//! Mirrors the split the rest of the codebase uses elsewhere in the pack:
//! flat enums with a `Display`/`Error` impl for library-internal faults
//! (never escalated past the topology engine or forwarder, per the error
//! handling design), and `anyhow` at the I/O boundary (config loading,
//! gateway serial line).

use std::fmt;

/// Failure decoding a received packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireError {
    /// The leading type tag did not match any known message kind.
    UnknownKind(u8),
    /// The packet was shorter than the fixed size its tag implies.
    Truncated { expected: usize, got: usize },
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::UnknownKind(tag) => write!(f, "unknown message kind: tag={tag}"),
            WireError::Truncated { expected, got } => {
                write!(f, "truncated packet: expected {expected} bytes, got {got}")
            }
        }
    }
}

impl std::error::Error for WireError {}

/// Outcome of [`crate::routing::RoutingTable::put`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// A new key was inserted.
    New,
    /// An existing key's next-hop/timestamp was overwritten.
    Update,
    /// The table could not grow further (allocator failure). The old table
    /// is left untouched; the caller should retry after an expiry sweep.
    OutOfMemory,
}

/// Outcome of [`crate::routing::RoutingTable::remove`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Ok,
    Missing,
}
