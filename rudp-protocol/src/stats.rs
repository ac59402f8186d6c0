//! Connection statistics

/// Counters maintained by a [`crate::Connection`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    /// Messages accepted by `send`
    pub messages_sent: u64,
    /// Data frames accepted into the receive queue
    pub messages_received: u64,
    /// Messages handed to the application
    pub messages_delivered: u64,
    /// Data frames dropped as duplicates
    pub duplicates_dropped: u64,
    /// Packets produced by generation cycles
    pub packets_generated: u64,
    /// Bytes in produced packets
    pub bytes_generated: u64,
    /// Raw bytes fed into `update`
    pub bytes_ingested: u64,
    /// History messages resent on peer request
    pub retransmissions: u64,
    /// Missing notices sent for expired history
    pub missing_sent: u64,
    /// Missing notices received from the peer
    pub missing_received: u64,
    /// Resend requests sent for receive gaps
    pub requests_sent: u64,
    /// Resend requests received from the peer
    pub requests_received: u64,
    /// Heartbeat-only cycles
    pub heartbeats_sent: u64,
    /// History messages dropped by expiry
    pub history_expired: u64,
    /// Datagrams abandoned on malformed frames
    pub invalid_frames: u64,
}
