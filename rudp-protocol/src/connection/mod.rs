//! Connection State and Protocol Driver
//!
//! A [`Connection`] models one peer relationship. It never performs I/O: the
//! embedder feeds it raw datagrams and tick deltas through [`Connection::update`]
//! and transmits whatever packets come back. All timing is expressed in
//! caller-supplied ticks, so a connection is fully deterministic.
//!
//! A connection is not internally synchronized. Embedders that share one
//! between threads must wrap it in a lock.

mod extract;
mod output;

use crate::config::{ConfigError, ConnectionConfig};
use crate::error::ProtocolError;
use crate::header::MAX_PAYLOAD_SIZE;
use crate::message::{Message, MessageQueue};
use crate::packet::Packet;
use crate::sequence::MessageId;
use crate::stats::ConnectionStats;
use bytes::Bytes;
use std::collections::BTreeSet;
use tracing::debug;

/// Result of [`Connection::receive`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Next in-order application message
    Data(Bytes),
    /// Nothing deliverable yet; retry after the next update
    Empty,
    /// A protocol error, reported once and ahead of any queued data
    Error(ProtocolError),
}

impl Delivery {
    pub fn is_empty(&self) -> bool {
        matches!(self, Delivery::Empty)
    }

    /// Payload, if this is a data delivery
    pub fn into_data(self) -> Option<Bytes> {
        match self {
            Delivery::Data(data) => Some(data),
            _ => None,
        }
    }
}

/// Reliable, ordered message connection over an unreliable datagram channel
#[derive(Debug)]
pub struct Connection {
    config: ConnectionConfig,
    /// Id assigned to the next sent message
    send_id: MessageId,
    current_tick: u64,
    /// Sent but not yet transmitted
    send_queue: MessageQueue,
    /// Transmitted and still eligible for retransmission
    send_history: MessageQueue,
    /// Received, awaiting in-order delivery
    recv_queue: MessageQueue,
    last_expired_tick: u64,
    last_send_tick: u64,
    /// One-shot error for the next `receive`
    error: Option<ProtocolError>,
    /// Ids the peer asked us to resend
    resend_requests: BTreeSet<MessageId>,
    /// Next id the application expects to consume
    recv_id_min: MessageId,
    /// Highest id reconstructed so far; anchor for wire id reconstruction
    recv_id_max: MessageId,
    stats: ConnectionStats,
}

impl Connection {
    /// Create a connection with the default packet capacity
    pub fn new(send_delay: u64, expired_after: u64) -> Self {
        Self::from_config(ConnectionConfig::new(send_delay, expired_after))
    }

    pub fn with_config(config: ConnectionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_config(config))
    }

    fn from_config(config: ConnectionConfig) -> Self {
        let initial_id = config.initial_id;
        Connection {
            config,
            send_id: initial_id,
            current_tick: 0,
            send_queue: MessageQueue::new(),
            send_history: MessageQueue::new(),
            recv_queue: MessageQueue::new(),
            last_expired_tick: 0,
            last_send_tick: 0,
            error: None,
            resend_requests: BTreeSet::new(),
            recv_id_min: initial_id,
            recv_id_max: initial_id,
            stats: ConnectionStats::default(),
        }
    }

    /// Queue a message for the next generation cycle
    ///
    /// The payload is copied. Returns the id assigned to it.
    pub fn send(&mut self, payload: &[u8]) -> Result<MessageId, ProtocolError> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }

        let id = self.send_id;
        self.send_id.increment();
        self.send_queue.push(Message::new(
            id,
            Bytes::copy_from_slice(payload),
            self.current_tick,
        ));
        self.stats.messages_sent += 1;

        Ok(id)
    }

    /// Pop the next in-order message
    ///
    /// A pending error is reported first and then cleared.
    pub fn receive(&mut self) -> Delivery {
        if let Some(error) = self.error.take() {
            return Delivery::Error(error);
        }

        let message = match self.recv_queue.pop(self.recv_id_min) {
            Some(message) => message,
            None => return Delivery::Empty,
        };
        self.recv_id_min.increment();

        // An empty payload stands for a message the peer can no longer resend
        let id = message.id();
        match message.into_payload() {
            Some(payload) if !payload.is_empty() => {
                self.stats.messages_delivered += 1;
                Delivery::Data(payload)
            }
            _ => Delivery::Error(ProtocolError::MessageMissing(id)),
        }
    }

    /// Advance time, ingest one datagram, and produce output when due
    ///
    /// `input` may be empty. Returns `None` while the send delay has not yet
    /// elapsed since the previous generation cycle.
    pub fn update(&mut self, input: &[u8], tick_delta: u64) -> Option<Vec<Packet>> {
        self.current_tick = self.current_tick.saturating_add(tick_delta);
        self.stats.bytes_ingested += input.len() as u64;

        self.extract_frames(input);

        if self.current_tick >= self.last_expired_tick.saturating_add(self.config.expired_after) {
            self.expire_history();
        }

        if self.current_tick >= self.last_send_tick.saturating_add(self.config.send_delay) {
            let packets = self.generate_output();
            self.last_send_tick = self.current_tick;
            return Some(packets);
        }

        None
    }

    /// Drop history queued before the previous expiry boundary
    fn expire_history(&mut self) {
        let expired = self.send_history.expire_before(self.last_expired_tick);
        if expired > 0 {
            debug!(
                expired,
                boundary = self.last_expired_tick,
                tick = self.current_tick,
                "expired send history"
            );
            self.stats.history_expired += expired as u64;
        }
        self.last_expired_tick = self.current_tick;
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    pub fn current_tick(&self) -> u64 {
        self.current_tick
    }

    /// Id the next `send` will assign
    pub fn next_send_id(&self) -> MessageId {
        self.send_id
    }

    /// Id the application will receive next
    pub fn expected_id(&self) -> MessageId {
        self.recv_id_min
    }

    /// Highest received id reconstructed so far
    pub fn highest_received_id(&self) -> MessageId {
        self.recv_id_max
    }

    /// Messages waiting for the next generation cycle
    pub fn pending_len(&self) -> usize {
        self.send_queue.len()
    }

    /// Messages retained for retransmission
    pub fn history_len(&self) -> usize {
        self.send_history.len()
    }

    /// Received messages not yet delivered
    pub fn received_len(&self) -> usize {
        self.recv_queue.len()
    }

    /// Whether an error is waiting for the next `receive`
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(bytes: &[u8]) -> Delivery {
        Delivery::Data(Bytes::copy_from_slice(bytes))
    }

    #[test]
    fn test_send_assigns_increasing_ids() {
        let mut conn = Connection::new(1, 5);
        assert_eq!(conn.send(&[1]).unwrap(), MessageId::new(0));
        assert_eq!(conn.send(&[2]).unwrap(), MessageId::new(1));
        assert_eq!(conn.send(&[]).unwrap(), MessageId::new(2));
        assert_eq!(conn.pending_len(), 3);
        assert_eq!(conn.next_send_id(), MessageId::new(3));
    }

    #[test]
    fn test_send_rejects_oversized_payload() {
        let mut conn = Connection::new(1, 5);
        let payload = vec![0u8; MAX_PAYLOAD_SIZE + 1];
        assert!(matches!(
            conn.send(&payload),
            Err(ProtocolError::PayloadTooLarge { .. })
        ));
        assert_eq!(conn.pending_len(), 0);
        assert!(conn.send(&payload[..MAX_PAYLOAD_SIZE]).is_ok());
    }

    #[test]
    fn test_initial_id_seeds_both_directions() {
        let config = ConnectionConfig::new(1, 5).with_initial_id(MessageId::new(65530));
        let mut conn = Connection::with_config(config).unwrap();
        assert_eq!(conn.send(&[1]).unwrap(), MessageId::new(65530));
        assert_eq!(conn.expected_id(), MessageId::new(65530));
    }

    #[test]
    fn test_with_config_validates() {
        let config = ConnectionConfig::new(1, 5).with_packet_capacity(2);
        assert!(Connection::with_config(config).is_err());

        let config = ConnectionConfig::new(1, 5).with_packet_capacity(usize::MAX);
        assert!(matches!(
            Connection::with_config(config),
            Err(ConfigError::PacketCapacityTooLarge { .. })
        ));

        let config = ConnectionConfig::new(1, 5)
            .with_packet_capacity(crate::config::MAX_PACKET_CAPACITY);
        let mut conn = Connection::with_config(config).unwrap();
        conn.send(&[1, 2, 3]).unwrap();
        assert_eq!(conn.update(&[], 1).unwrap().len(), 1);
    }

    #[test]
    fn test_update_respects_send_delay() {
        let mut conn = Connection::new(3, 100);
        assert!(conn.update(&[], 1).is_none());
        assert!(conn.update(&[], 1).is_none());
        assert!(conn.update(&[], 1).is_some());
        assert!(conn.update(&[], 2).is_none());
        assert!(conn.update(&[], 1).is_some());
        assert_eq!(conn.current_tick(), 6);
    }

    #[test]
    fn test_zero_delay_generates_every_update() {
        let mut conn = Connection::new(0, 100);
        assert!(conn.update(&[], 0).is_some());
        assert!(conn.update(&[], 0).is_some());
    }

    #[test]
    fn test_receive_in_order_only() {
        let mut conn = Connection::new(100, 100);
        // id 1 arrives before id 0
        conn.update(&[0x05, 0x00, 0x01, 0xBB], 1);
        assert_eq!(conn.receive(), Delivery::Empty);

        conn.update(&[0x05, 0x00, 0x00, 0xAA], 1);
        assert_eq!(conn.receive(), data(&[0xAA]));
        assert_eq!(conn.receive(), data(&[0xBB]));
        assert_eq!(conn.receive(), Delivery::Empty);
        assert_eq!(conn.expected_id(), MessageId::new(2));
        assert_eq!(conn.stats().messages_delivered, 2);
    }

    #[test]
    fn test_error_takes_precedence_over_data() {
        let mut conn = Connection::new(100, 100);
        // Valid data frame, then a request frame missing its id
        conn.update(&[0x05, 0x00, 0x00, 0xAA, 0x02, 0x00], 1);
        assert!(conn.has_error());

        assert!(matches!(
            conn.receive(),
            Delivery::Error(ProtocolError::InvalidFrame { offset: 5, .. })
        ));
        assert_eq!(conn.receive(), data(&[0xAA]));
        assert_eq!(conn.receive(), Delivery::Empty);
    }

    #[test]
    fn test_empty_payload_reported_missing() {
        let mut conn = Connection::new(100, 100);
        conn.update(&[0x04, 0x00, 0x00, 0x05, 0x00, 0x01, 0xCC], 1);

        assert_eq!(
            conn.receive(),
            Delivery::Error(ProtocolError::MessageMissing(MessageId::new(0)))
        );
        assert_eq!(conn.receive(), data(&[0xCC]));
        assert_eq!(conn.stats().messages_delivered, 1);
    }

    #[test]
    fn test_history_expiry_boundary() {
        let mut conn = Connection::new(1, 5);
        conn.send(&[1]).unwrap(); // tick 0
        conn.update(&[], 1);
        conn.update(&[], 2);
        conn.send(&[2]).unwrap(); // tick 3
        conn.update(&[], 1);
        assert_eq!(conn.history_len(), 2);

        // tick 5: boundary is the previous expiry tick 0, nothing is older
        conn.update(&[], 1);
        assert_eq!(conn.history_len(), 2);

        // tick 10: entries before tick 5 go
        conn.update(&[], 5);
        assert_eq!(conn.history_len(), 0);
        assert_eq!(conn.stats().history_expired, 2);
    }
}
