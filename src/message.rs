//! Tagged message values exchanged over the bus.
//!
//! Every message carries a Lamport timestamp assigned at publish time. The tag
//! determines routing in the distributor (see `crate::distributor`): `Broadcast`
//! fans out to every registered mailbox including the sender's, `Directed` goes
//! to exactly one destination, `Token` carries the critical-section token around
//! the ring.

use serde::{Deserialize, Serialize};

/// Dense, monotonically-allocated process identifier. See `crate::id`.
pub type ProcessId = u32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    /// Untagged value, not routed by the distributor. Mostly useful for tests
    /// and for application code that wants a `Message` without going through
    /// the bus at all.
    Plain { timestamp: u64, payload: String },
    Broadcast {
        timestamp: u64,
        sender: ProcessId,
        payload: String,
    },
    Directed {
        timestamp: u64,
        sender: ProcessId,
        to: ProcessId,
        payload: String,
    },
    Token {
        timestamp: u64,
        from: ProcessId,
        to: ProcessId,
    },
}

impl Message {
    pub fn timestamp(&self) -> u64 {
        match self {
            Message::Plain { timestamp, .. }
            | Message::Broadcast { timestamp, .. }
            | Message::Directed { timestamp, .. }
            | Message::Token { timestamp, .. } => *timestamp,
        }
    }

    pub fn payload(&self) -> Option<&str> {
        match self {
            Message::Plain { payload, .. }
            | Message::Broadcast { payload, .. }
            | Message::Directed { payload, .. } => Some(payload),
            Message::Token { .. } => None,
        }
    }

    pub fn sender(&self) -> Option<ProcessId> {
        match self {
            Message::Broadcast { sender, .. } | Message::Directed { sender, .. } => Some(*sender),
            Message::Token { from, .. } => Some(*from),
            Message::Plain { .. } => None,
        }
    }

    pub fn to(&self) -> Option<ProcessId> {
        match self {
            Message::Directed { to, .. } | Message::Token { to, .. } => Some(*to),
            Message::Plain { .. } | Message::Broadcast { .. } => None,
        }
    }

    pub fn is_broadcast(&self) -> bool {
        matches!(self, Message::Broadcast { .. })
    }

    pub fn is_token(&self) -> bool {
        matches!(self, Message::Token { .. })
    }
}
