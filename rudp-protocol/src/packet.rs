//! Outbound packets and packet building
//!
//! Frames produced during one generation cycle are packed into packets of at
//! most `capacity` bytes. A data message too large to share a packet gets a
//! packet of its own, which may exceed the capacity.

use crate::frame::FrameReader;
use crate::header::{self, FrameType, WIRE_ID_SIZE};
use crate::message::Message;
use crate::sequence::MessageId;
use bytes::{BufMut, Bytes, BytesMut};

/// Default packet capacity in bytes
pub const DEFAULT_PACKET_CAPACITY: usize = 128;

/// Bytes reserved for a data frame header (2-byte tag + 2-byte id)
pub const DATA_HEADER_RESERVE: usize = 4;

/// Encoded size of a request or missing frame
pub const CONTROL_FRAME_SIZE: usize = 1 + WIRE_ID_SIZE;

/// A finished packet, ready for the datagram channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    payload: Bytes,
}

impl Packet {
    pub fn new(payload: Bytes) -> Self {
        Packet { payload }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_bytes(self) -> Bytes {
        self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Decode the frames carried by this packet
    pub fn frames(&self) -> FrameReader<'_> {
        FrameReader::new(&self.payload)
    }
}

impl AsRef<[u8]> for Packet {
    fn as_ref(&self) -> &[u8] {
        &self.payload
    }
}

/// Accumulates frames into capacity-bounded packets for one generation cycle
#[derive(Debug)]
pub struct PacketBuilder {
    capacity: usize,
    buffer: BytesMut,
    packets: Vec<Packet>,
    frames: usize,
}

impl PacketBuilder {
    pub fn new(capacity: usize) -> Self {
        PacketBuilder {
            capacity,
            buffer: BytesMut::with_capacity(capacity.min(DEFAULT_PACKET_CAPACITY)),
            packets: Vec::new(),
            frames: 0,
        }
    }

    /// Bytes still free in the packet being built
    #[inline]
    fn remaining(&self) -> usize {
        self.capacity.saturating_sub(self.buffer.len())
    }

    /// Close the packet being built, if it holds anything
    fn finish_packet(&mut self) {
        if !self.buffer.is_empty() {
            let payload = self.buffer.split().freeze();
            self.packets.push(Packet::new(payload));
        }
    }

    /// Ask the peer to resend `id`
    pub fn pack_request(&mut self, id: MessageId) {
        self.pack_control(FrameType::Request, id);
    }

    /// Tell the peer `id` can no longer be resent
    pub fn pack_missing(&mut self, id: MessageId) {
        self.pack_control(FrameType::Missing, id);
    }

    fn pack_control(&mut self, frame_type: FrameType, id: MessageId) {
        if self.remaining() < CONTROL_FRAME_SIZE {
            self.finish_packet();
        }
        header::encode_header(&mut self.buffer, frame_type, id);
        self.frames += 1;
    }

    /// Liveness frame, used when a cycle has nothing else to say
    pub fn pack_heartbeat(&mut self) {
        if self.remaining() == 0 {
            self.finish_packet();
        }
        header::encode_header(&mut self.buffer, FrameType::Heartbeat, MessageId::default());
        self.frames += 1;
    }

    /// Pack a data frame for `message`
    ///
    /// Messages larger than `capacity - 4` bytes go out as a dedicated packet
    /// so they never disturb the accounting of the shared buffer.
    pub fn pack_message(&mut self, message: &Message) {
        let payload: &[u8] = match message.payload() {
            Some(p) => p,
            None => &[],
        };
        let frame_type = FrameType::Data(payload.len());

        if payload.len() > self.capacity.saturating_sub(DATA_HEADER_RESERVE) {
            self.finish_packet();
            let mut dedicated =
                BytesMut::with_capacity(header::header_len(frame_type) + payload.len());
            header::encode_header(&mut dedicated, frame_type, message.id());
            dedicated.put_slice(payload);
            self.packets.push(Packet::new(dedicated.freeze()));
            self.frames += 1;
            return;
        }

        if payload.len() + DATA_HEADER_RESERVE > self.remaining() {
            self.finish_packet();
        }
        header::encode_header(&mut self.buffer, frame_type, message.id());
        self.buffer.put_slice(payload);
        self.frames += 1;
    }

    /// Number of frames packed so far
    pub fn frame_count(&self) -> usize {
        self.frames
    }

    /// Close the last packet and hand over the packet list
    pub fn finish(mut self) -> Vec<Packet> {
        self.finish_packet();
        self.packets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: i64, len: usize) -> Message {
        Message::new(MessageId::new(id), Bytes::from(vec![0x11; len]), 0)
    }

    #[test]
    fn test_small_messages_share_a_packet() {
        let mut builder = PacketBuilder::new(DEFAULT_PACKET_CAPACITY);
        builder.pack_message(&Message::new(
            MessageId::new(0),
            Bytes::from_static(&[1, 2, 3, 4]),
            0,
        ));
        builder.pack_message(&Message::new(
            MessageId::new(1),
            Bytes::from_static(&[5, 6, 7, 8]),
            0,
        ));

        let packets = builder.finish();
        assert_eq!(packets.len(), 1);
        assert_eq!(
            packets[0].as_bytes(),
            &[0x08, 0x00, 0x00, 1, 2, 3, 4, 0x08, 0x00, 0x01, 5, 6, 7, 8]
        );
    }

    #[test]
    fn test_split_when_capacity_exceeded() {
        let mut builder = PacketBuilder::new(DEFAULT_PACKET_CAPACITY);
        for id in 0..5 {
            // 60 + 3 bytes each; two fit per packet
            builder.pack_message(&message(id, 60));
        }

        let packets = builder.finish();
        assert_eq!(packets.len(), 3);
        for packet in &packets {
            assert!(packet.len() <= DEFAULT_PACKET_CAPACITY);
        }
        assert_eq!(packets[0].frames().count(), 2);
        assert_eq!(packets[2].frames().count(), 1);
    }

    #[test]
    fn test_largest_shared_message_fills_packet() {
        let mut builder = PacketBuilder::new(DEFAULT_PACKET_CAPACITY);
        builder.pack_message(&message(0, DEFAULT_PACKET_CAPACITY - DATA_HEADER_RESERVE));

        let packets = builder.finish();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].len(), DEFAULT_PACKET_CAPACITY);
    }

    #[test]
    fn test_oversized_message_gets_dedicated_packet() {
        let mut builder = PacketBuilder::new(DEFAULT_PACKET_CAPACITY);
        builder.pack_message(&message(0, 10));
        builder.pack_message(&message(1, 256));
        builder.pack_message(&message(2, 4));

        let packets = builder.finish();
        assert_eq!(packets.len(), 3);
        assert_eq!(packets[0].len(), 13);
        assert_eq!(packets[1].len(), 4 + 256);
        assert_eq!(&packets[1].as_bytes()[..4], &[0x81, 0x04, 0x00, 0x01]);
        assert_eq!(packets[2].as_bytes(), &[0x08, 0x00, 0x02, 0x11, 0x11, 0x11, 0x11]);
    }

    #[test]
    fn test_oversized_message_alone_leaves_no_empty_packet() {
        let mut builder = PacketBuilder::new(DEFAULT_PACKET_CAPACITY);
        builder.pack_message(&message(0, 300));

        let packets = builder.finish();
        assert_eq!(packets.len(), 1);
        assert_eq!(total_frames(&packets), 1);
    }

    fn total_frames(packets: &[Packet]) -> usize {
        packets.iter().map(|p| p.frames().count()).sum()
    }

    #[test]
    fn test_requests_split_at_capacity() {
        let mut builder = PacketBuilder::new(DEFAULT_PACKET_CAPACITY);
        for id in 0..50 {
            builder.pack_request(MessageId::new(id));
        }
        assert_eq!(builder.frame_count(), 50);

        let packets = builder.finish();
        // 42 requests fill 126 bytes, leaving 2 which is too few for another
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].len(), 42 * CONTROL_FRAME_SIZE);
        assert_eq!(packets[1].len(), 8 * CONTROL_FRAME_SIZE);
    }

    #[test]
    fn test_missing_frame_encoding() {
        let mut builder = PacketBuilder::new(DEFAULT_PACKET_CAPACITY);
        builder.pack_missing(MessageId::new(0x1_0203));
        let packets = builder.finish();
        assert_eq!(packets[0].as_bytes(), &[0x03, 0x02, 0x03]);
    }

    #[test]
    fn test_unbounded_capacity_packs_into_one_packet() {
        let mut builder = PacketBuilder::new(usize::MAX);
        for id in 0..100 {
            builder.pack_message(&message(id, 20));
        }
        builder.pack_request(MessageId::new(7));

        let packets = builder.finish();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].len(), 100 * 23 + CONTROL_FRAME_SIZE);
    }

    #[test]
    fn test_empty_builder_produces_nothing() {
        let builder = PacketBuilder::new(DEFAULT_PACKET_CAPACITY);
        assert!(builder.finish().is_empty());
    }
}
