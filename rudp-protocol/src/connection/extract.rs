//! Frame extraction: applies an incoming datagram to receive state

use super::Connection;
use crate::error::ProtocolError;
use crate::frame::{Frame, FrameReader};
use crate::message::Message;
use crate::sequence::MessageId;
use bytes::Bytes;
use tracing::{trace, warn};

impl Connection {
    /// Walk every frame of `datagram` in order
    ///
    /// Stops at the first malformed frame or corruption notice, leaving the
    /// error for the next `receive`. Frames before that point keep their effect.
    pub(super) fn extract_frames(&mut self, datagram: &[u8]) {
        for frame in FrameReader::new(datagram) {
            match frame {
                Ok(Frame::Heartbeat) => {
                    trace!(tick = self.current_tick, "peer heartbeat");
                }
                Ok(Frame::Corrupt) => {
                    warn!(tick = self.current_tick, "peer reported corruption");
                    self.error = Some(ProtocolError::PeerCorruption);
                    return;
                }
                Ok(Frame::Request(wire_id)) => {
                    // Requests name our own messages, so they are anchored
                    // on the send side rather than the receive side
                    let anchor = MessageId::new(self.send_id.as_raw() - 1);
                    self.add_request(MessageId::reconstruct(wire_id, anchor));
                }
                Ok(Frame::Missing(wire_id)) => {
                    let id = MessageId::reconstruct(wire_id, self.recv_id_max);
                    self.add_missing(id);
                }
                Ok(Frame::Data { wire_id, payload }) => {
                    let id = MessageId::reconstruct(wire_id, self.recv_id_max);
                    self.insert_message(Message::new(
                        id,
                        Bytes::copy_from_slice(payload),
                        self.current_tick,
                    ));
                }
                Err(error) => {
                    warn!(%error, len = datagram.len(), "dropping rest of datagram");
                    self.stats.invalid_frames += 1;
                    self.error = Some(error);
                    return;
                }
            }
        }
    }

    fn add_request(&mut self, id: MessageId) {
        self.stats.requests_received += 1;
        self.resend_requests.insert(id);
    }

    /// The peer's history no longer has `id`; hold its slot with a placeholder
    /// so delivery reports it instead of stalling
    fn add_missing(&mut self, id: MessageId) {
        self.stats.missing_received += 1;
        self.insert_message(Message::placeholder(id));
    }

    /// Insert into the receive queue, dropping duplicates and consumed ids
    fn insert_message(&mut self, message: Message) {
        let id = message.id();
        if id < self.recv_id_min {
            self.stats.duplicates_dropped += 1;
            return;
        }

        if self.recv_queue.is_empty() || id > self.recv_id_max {
            self.recv_queue.push(message);
            self.recv_id_max = self.recv_id_max.max(id);
            self.stats.messages_received += 1;
            return;
        }

        if self.recv_queue.insert(message) {
            self.stats.messages_received += 1;
        } else {
            self.stats.duplicates_dropped += 1;
        }
    }
}
