//! Secure frame headers.
//!
//! Each secure frame is the packet header in the clear followed by the
//! sealed payload; the payload's first bytes are the payload header.
//!
//! ```text
//! +---------+-----------+-------------+
//! | version | key id    | counter     |   packet header (clear, AAD)
//! | 1 byte  | 2 LE      | 4 LE        |
//! +---------+-----------+-------------+
//! | flags   | exch id   | msg type | app payload...   (sealed)
//! | 1 byte  | 2 LE      | 1 byte   |
//! +---------+-----------+----------+
//! ```
//!
//! The packet header is authenticated as associated data, never
//! encrypted: the receiver needs the key id to pick the session and the
//! counter to build the nonce before it can open anything.

use crate::error::{Result, WeaveError};

/// Wire format version this crate speaks.
pub const PACKET_VERSION: u8 = 1;

/// Payload-header flag: sender opened the exchange.
pub const FLAG_INITIATOR: u8 = 0x01;

/// Clear-text frame header (7 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// Wire format version.
    pub version: u8,
    /// Receiver-side key id selecting the session.
    pub key_id: u16,
    /// Per-session message counter.
    pub counter: u32,
}

impl PacketHeader {
    /// Encoded size in bytes.
    pub const LEN: usize = 7;

    /// Serialize to wire bytes.
    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut buf = [0u8; Self::LEN];
        buf[0] = self.version;
        buf[1..3].copy_from_slice(&self.key_id.to_le_bytes());
        buf[3..7].copy_from_slice(&self.counter.to_le_bytes());
        buf
    }

    /// Parse from the start of `buf`.
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::LEN {
            return Err(WeaveError::UnexpectedEnd);
        }
        let version = buf[0];
        if version != PACKET_VERSION {
            return Err(WeaveError::Malformed("PacketHeader"));
        }
        Ok(Self {
            version,
            key_id: u16::from_le_bytes([buf[1], buf[2]]),
            counter: u32::from_le_bytes([buf[3], buf[4], buf[5], buf[6]]),
        })
    }
}

/// Sealed frame header (4 bytes), first in the plaintext payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadHeader {
    /// Flag bits; see [`FLAG_INITIATOR`].
    pub flags: u8,
    /// Exchange the message belongs to.
    pub exchange_id: u16,
    /// Application-defined message type.
    pub message_type: u8,
}

impl PayloadHeader {
    /// Encoded size in bytes.
    pub const LEN: usize = 4;

    /// Header for a message sent on an exchange.
    pub fn new(exchange_id: u16, message_type: u8, from_initiator: bool) -> Self {
        Self {
            flags: if from_initiator { FLAG_INITIATOR } else { 0 },
            exchange_id,
            message_type,
        }
    }

    /// True when the sender opened the exchange.
    pub fn is_initiator(&self) -> bool {
        self.flags & FLAG_INITIATOR != 0
    }

    /// Serialize to wire bytes.
    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut buf = [0u8; Self::LEN];
        buf[0] = self.flags;
        buf[1..3].copy_from_slice(&self.exchange_id.to_le_bytes());
        buf[3] = self.message_type;
        buf
    }

    /// Parse from the start of `buf`, returning the trailing payload too.
    pub fn from_bytes(buf: &[u8]) -> Result<(Self, &[u8])> {
        if buf.len() < Self::LEN {
            return Err(WeaveError::UnexpectedEnd);
        }
        let header = Self {
            flags: buf[0],
            exchange_id: u16::from_le_bytes([buf[1], buf[2]]),
            message_type: buf[3],
        };
        Ok((header, &buf[Self::LEN..]))
    }
}
