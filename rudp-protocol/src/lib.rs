//! Reliable UDP Protocol Core
//!
//! This crate implements a reliable, ordered message protocol on top of an
//! unreliable, unordered, MTU-limited datagram channel: message framing,
//! 16-bit wire id reconstruction, gap detection and resend requests,
//! retransmission history with tick-based expiry, and in-order delivery.
//!
//! The core performs no I/O and reads no clock. Callers drive it with raw
//! datagrams and tick deltas through [`Connection::update`].

pub mod config;
pub mod connection;
pub mod error;
pub mod frame;
pub mod header;
pub mod message;
pub mod packet;
pub mod sequence;
pub mod stats;

pub use config::{ConfigError, ConnectionConfig};
pub use connection::{Connection, Delivery};
pub use error::ProtocolError;
pub use frame::{Frame, FrameReader};
pub use header::{FrameType, MAX_PAYLOAD_SIZE};
pub use message::{Message, MessageQueue};
pub use packet::{Packet, PacketBuilder, DEFAULT_PACKET_CAPACITY};
pub use sequence::MessageId;
pub use stats::ConnectionStats;
