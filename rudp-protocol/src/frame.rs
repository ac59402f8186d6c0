//! Frame Structures and Parsing
//!
//! A datagram is a plain concatenation of frames with no padding. This module
//! walks a datagram left to right and yields borrowed frames; applying them to
//! connection state is the connection's job.

use crate::error::ProtocolError;
use crate::header::{self, FrameType, WIRE_ID_SIZE};
use crate::sequence::MessageId;
use bytes::BufMut;

/// One decoded frame, borrowing its payload from the datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame<'a> {
    /// Liveness signal, no body
    Heartbeat,
    /// Peer detected corruption; nothing after it in the datagram is valid
    Corrupt,
    /// Peer asks for the message with this wire id to be resent
    Request(u16),
    /// Peer no longer has the message with this wire id
    Missing(u16),
    /// Application data
    Data { wire_id: u16, payload: &'a [u8] },
}

impl<'a> Frame<'a> {
    pub fn frame_type(&self) -> FrameType {
        match self {
            Frame::Heartbeat => FrameType::Heartbeat,
            Frame::Corrupt => FrameType::Corrupt,
            Frame::Request(_) => FrameType::Request,
            Frame::Missing(_) => FrameType::Missing,
            Frame::Data { payload, .. } => FrameType::Data(payload.len()),
        }
    }

    fn wire_id(&self) -> u16 {
        match self {
            Frame::Heartbeat | Frame::Corrupt => 0,
            Frame::Request(id) | Frame::Missing(id) => *id,
            Frame::Data { wire_id, .. } => *wire_id,
        }
    }

    /// Encoded size of this frame
    pub fn encoded_len(&self) -> usize {
        let body = match self {
            Frame::Data { payload, .. } => payload.len(),
            _ => 0,
        };
        header::header_len(self.frame_type()) + body
    }

    /// Append the wire form of this frame
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        header::encode_header(
            buf,
            self.frame_type(),
            MessageId::new(i64::from(self.wire_id())),
        );
        if let Frame::Data { payload, .. } = self {
            buf.put_slice(payload);
        }
    }
}

/// Iterator over the frames of one datagram
///
/// Yields an error at most once; iteration ends after the first error.
#[derive(Debug, Clone)]
pub struct FrameReader<'a> {
    remaining: &'a [u8],
    offset: usize,
}

impl<'a> FrameReader<'a> {
    pub fn new(datagram: &'a [u8]) -> Self {
        FrameReader {
            remaining: datagram,
            offset: 0,
        }
    }

    /// Offset of the next unread byte within the datagram
    pub fn offset(&self) -> usize {
        self.offset
    }

    fn advance(&mut self, n: usize) {
        self.remaining = &self.remaining[n..];
        self.offset += n;
    }

    fn fail(&mut self, reason: &'static str) -> ProtocolError {
        let offset = self.offset;
        self.remaining = &[];
        ProtocolError::InvalidFrame { offset, reason }
    }

    fn read_wire_id(&mut self) -> Result<u16, ProtocolError> {
        let remaining = self.remaining;
        match remaining {
            [hi, lo, ..] => {
                let id = u16::from_be_bytes([*hi, *lo]);
                self.advance(WIRE_ID_SIZE);
                Ok(id)
            }
            _ => Err(self.fail("truncated message id")),
        }
    }

    fn read_frame(&mut self) -> Result<Frame<'a>, ProtocolError> {
        let (tag, tag_len) = match header::decode_tag(self.remaining, self.offset) {
            Ok(decoded) => decoded,
            Err(e) => {
                self.remaining = &[];
                return Err(e);
            }
        };
        self.advance(tag_len);

        match FrameType::from_tag(tag) {
            FrameType::Heartbeat => Ok(Frame::Heartbeat),
            FrameType::Corrupt => Ok(Frame::Corrupt),
            FrameType::Request => Ok(Frame::Request(self.read_wire_id()?)),
            FrameType::Missing => Ok(Frame::Missing(self.read_wire_id()?)),
            FrameType::Data(len) => {
                if self.remaining.len() < WIRE_ID_SIZE + len {
                    return Err(self.fail("truncated data frame"));
                }
                let wire_id = self.read_wire_id()?;
                let data: &'a [u8] = self.remaining;
                let payload = &data[..len];
                self.advance(len);
                Ok(Frame::Data { wire_id, payload })
            }
        }
    }
}

impl<'a> Iterator for FrameReader<'a> {
    type Item = Result<Frame<'a>, ProtocolError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining.is_empty() {
            return None;
        }
        Some(self.read_frame())
    }
}
