//! Protocol errors surfaced to the application

use crate::sequence::MessageId;
use thiserror::Error;

/// Errors delivered through [`crate::Connection::receive`] or returned by
/// [`crate::Connection::send`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Malformed or truncated frame; the rest of the datagram was dropped
    #[error("Invalid frame at offset {offset}: {reason}")]
    InvalidFrame { offset: usize, reason: &'static str },

    /// The peer signalled corruption; the rest of the datagram was dropped
    #[error("Peer reported corruption")]
    PeerCorruption,

    /// The peer confirmed a message can no longer be retransmitted
    #[error("Message {0} permanently missing")]
    MessageMissing(MessageId),

    #[error("Payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },
}
