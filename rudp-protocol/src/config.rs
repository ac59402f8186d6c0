//! Connection configuration

use crate::packet::{DATA_HEADER_RESERVE, DEFAULT_PACKET_CAPACITY};
use crate::sequence::MessageId;
use thiserror::Error;

/// Smallest packet capacity that still fits a data header plus a few bytes
pub const MIN_PACKET_CAPACITY: usize = 2 * DATA_HEADER_RESERVE;

/// Largest payload a single UDP datagram can carry over IPv4
pub const MAX_PACKET_CAPACITY: usize = 65_507;

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Packet capacity {capacity} below minimum {min}")]
    PacketCapacityTooSmall { capacity: usize, min: usize },

    #[error("Packet capacity {capacity} above maximum {max}")]
    PacketCapacityTooLarge { capacity: usize, max: usize },
}

/// Tuning for one connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Minimum ticks between two generation cycles
    pub send_delay: u64,
    /// Ticks a sent message stays in history for retransmission
    pub expired_after: u64,
    /// Soft packet size limit in bytes
    pub packet_capacity: usize,
    /// First message id on both sides; peers must agree on it
    pub initial_id: MessageId,
}

impl ConnectionConfig {
    pub fn new(send_delay: u64, expired_after: u64) -> Self {
        ConnectionConfig {
            send_delay,
            expired_after,
            ..Default::default()
        }
    }

    pub fn with_packet_capacity(mut self, capacity: usize) -> Self {
        self.packet_capacity = capacity;
        self
    }

    pub fn with_initial_id(mut self, id: MessageId) -> Self {
        self.initial_id = id;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.packet_capacity < MIN_PACKET_CAPACITY {
            return Err(ConfigError::PacketCapacityTooSmall {
                capacity: self.packet_capacity,
                min: MIN_PACKET_CAPACITY,
            });
        }
        if self.packet_capacity > MAX_PACKET_CAPACITY {
            return Err(ConfigError::PacketCapacityTooLarge {
                capacity: self.packet_capacity,
                max: MAX_PACKET_CAPACITY,
            });
        }
        Ok(())
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            send_delay: 1,
            expired_after: 5,
            packet_capacity: DEFAULT_PACKET_CAPACITY,
            initial_id: MessageId::new(0),
        }
    }
}
