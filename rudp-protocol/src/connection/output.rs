//! Output generation for one send cycle

use super::Connection;
use crate::packet::{Packet, PacketBuilder};
use tracing::{debug, trace};

impl Connection {
    /// Build every packet due this cycle
    ///
    /// Order on the wire: requests for receive gaps, replies to the peer's
    /// resend requests, then pending sends. A cycle with nothing to say
    /// carries a single heartbeat.
    pub(super) fn generate_output(&mut self) -> Vec<Packet> {
        let mut builder = PacketBuilder::new(self.config.packet_capacity);

        self.request_gaps(&mut builder);
        self.reply_requests(&mut builder);
        self.flush_pending(&mut builder);

        if builder.frame_count() == 0 {
            builder.pack_heartbeat();
            self.stats.heartbeats_sent += 1;
        }

        let packets = builder.finish();
        self.stats.packets_generated += packets.len() as u64;
        self.stats.bytes_generated += packets.iter().map(|p| p.len() as u64).sum::<u64>();
        trace!(
            tick = self.current_tick,
            packets = packets.len(),
            history = self.send_history.len(),
            "generated output"
        );

        packets
    }

    /// Request every id missing between the delivery point and the newest
    /// received message
    fn request_gaps(&mut self, builder: &mut PacketBuilder) {
        let mut expected = self.recv_id_min;
        for message in self.recv_queue.iter() {
            while expected < message.id() {
                builder.pack_request(expected);
                self.stats.requests_sent += 1;
                expected.increment();
            }
            expected = message.id().next();
        }
    }

    /// Answer the peer's resend requests from history
    ///
    /// Requests and history are both ascending, so one forward pass over
    /// history serves every request.
    fn reply_requests(&mut self, builder: &mut PacketBuilder) {
        if self.resend_requests.is_empty() {
            return;
        }

        let requests = std::mem::take(&mut self.resend_requests);
        let mut history = self.send_history.iter().peekable();
        let mut resent = 0u64;
        let mut missing = 0u64;

        for id in requests {
            while history.next_if(|message| message.id() < id).is_some() {}

            match history.peek() {
                Some(message) if message.id() == id => {
                    builder.pack_message(message);
                    resent += 1;
                }
                _ => {
                    builder.pack_missing(id);
                    missing += 1;
                }
            }
        }

        debug!(resent, missing, tick = self.current_tick, "answered resend requests");
        self.stats.retransmissions += resent;
        self.stats.missing_sent += missing;
    }

    /// Transmit pending sends and move them into history
    fn flush_pending(&mut self, builder: &mut PacketBuilder) {
        for message in self.send_queue.iter() {
            builder.pack_message(message);
        }
        self.send_history.append(&mut self.send_queue);
    }
}
