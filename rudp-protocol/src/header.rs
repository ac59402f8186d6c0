//! Frame Header Codec
//!
//! Every frame starts with a variable-length tag:
//!
//! ```text
//! tag < 128:   [tag]                               (1 byte)
//! tag >= 128:  [0x80 | (tag >> 8) & 0x7F][tag & 0xFF] (2 bytes, 15-bit tag)
//! ```
//!
//! Tags 0-3 are control frames. Any larger tag is a data frame whose payload
//! length is `tag - 4`. Request, missing and data frames follow the tag with
//! the big-endian low 16 bits of the message id.

use crate::error::ProtocolError;
use crate::sequence::MessageId;
use bytes::BufMut;

/// Heartbeat tag
pub const TAG_HEARTBEAT: u16 = 0;

/// Peer corruption tag
pub const TAG_CORRUPT: u16 = 1;

/// Retransmission request tag
pub const TAG_REQUEST: u16 = 2;

/// Missing-data notice tag
pub const TAG_MISSING: u16 = 3;

/// First data tag; a data frame's tag is `payload length + TAG_DATA`
pub const TAG_DATA: u16 = 4;

/// Largest tag the 15-bit extended form can carry
pub const MAX_TAG: u16 = 0x7FFF;

/// Largest payload a single data frame can carry
pub const MAX_PAYLOAD_SIZE: usize = (MAX_TAG - TAG_DATA) as usize;

/// Tags at or above this need the 2-byte form
const EXTENDED_TAG: u16 = 0x80;

/// Size of the wire id following the tag
pub const WIRE_ID_SIZE: usize = 2;

/// Frame kind as determined by its tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Heartbeat,
    Corrupt,
    Request,
    Missing,
    /// Data frame with the given payload length
    Data(usize),
}

impl FrameType {
    pub fn from_tag(tag: u16) -> Self {
        match tag {
            TAG_HEARTBEAT => FrameType::Heartbeat,
            TAG_CORRUPT => FrameType::Corrupt,
            TAG_REQUEST => FrameType::Request,
            TAG_MISSING => FrameType::Missing,
            data => FrameType::Data(usize::from(data - TAG_DATA)),
        }
    }

    /// Tag for this frame type
    ///
    /// Data lengths are clamped to [`MAX_PAYLOAD_SIZE`]; callers reject
    /// longer payloads before they reach the codec.
    pub fn tag(self) -> u16 {
        match self {
            FrameType::Heartbeat => TAG_HEARTBEAT,
            FrameType::Corrupt => TAG_CORRUPT,
            FrameType::Request => TAG_REQUEST,
            FrameType::Missing => TAG_MISSING,
            FrameType::Data(len) => len.min(MAX_PAYLOAD_SIZE) as u16 + TAG_DATA,
        }
    }

    /// Whether a wire id follows the tag
    pub fn has_id(self) -> bool {
        !matches!(self, FrameType::Heartbeat | FrameType::Corrupt)
    }
}

/// Number of bytes the tag occupies on the wire
#[inline]
pub fn tag_len(tag: u16) -> usize {
    if tag < EXTENDED_TAG {
        1
    } else {
        2
    }
}

/// Encoded header length (tag plus optional id) for a frame type
pub fn header_len(frame_type: FrameType) -> usize {
    let id_len = if frame_type.has_id() { WIRE_ID_SIZE } else { 0 };
    tag_len(frame_type.tag()) + id_len
}

/// Write a frame header
///
/// The id is written only for frame types that carry one.
pub fn encode_header<B: BufMut>(buf: &mut B, frame_type: FrameType, id: MessageId) {
    let tag = frame_type.tag();
    if tag < EXTENDED_TAG {
        buf.put_u8(tag as u8);
    } else {
        buf.put_u8(0x80 | ((tag >> 8) & 0x7F) as u8);
        buf.put_u8((tag & 0xFF) as u8);
    }

    if frame_type.has_id() {
        buf.put_u16(id.wire());
    }
}

/// Read a tag from the start of `bytes`
///
/// Returns the tag and the number of bytes it occupied. `offset` is the
/// position of `bytes` within the datagram, for error reporting.
pub fn decode_tag(bytes: &[u8], offset: usize) -> Result<(u16, usize), ProtocolError> {
    match bytes {
        [] => Err(ProtocolError::InvalidFrame {
            offset,
            reason: "empty frame",
        }),
        [first, rest @ ..] if *first >= EXTENDED_TAG as u8 => match rest.first() {
            Some(second) => {
                let tag = (u16::from(*first) << 8 | u16::from(*second)) & MAX_TAG;
                Ok((tag, 2))
            }
            None => Err(ProtocolError::InvalidFrame {
                offset,
                reason: "truncated extended tag",
            }),
        },
        [first, ..] => Ok((u16::from(*first), 1)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    fn encode(frame_type: FrameType, id: i64) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_header(&mut buf, frame_type, MessageId::new(id));
        buf.to_vec()
    }

    #[test]
    fn test_control_headers() {
        assert_eq!(encode(FrameType::Heartbeat, 7), vec![0x00]);
        assert_eq!(encode(FrameType::Corrupt, 7), vec![0x01]);
        assert_eq!(encode(FrameType::Request, 0x1234), vec![0x02, 0x12, 0x34]);
        assert_eq!(encode(FrameType::Missing, 0x1_0001), vec![0x03, 0x00, 0x01]);
    }

    #[test]
    fn test_short_data_header() {
        assert_eq!(encode(FrameType::Data(4), 1), vec![0x08, 0x00, 0x01]);
        assert_eq!(encode(FrameType::Data(123), 0), vec![0x7F, 0x00, 0x00]);
    }

    #[test]
    fn test_extended_data_header() {
        // 124 + 4 = 128 is the first tag needing two bytes
        assert_eq!(encode(FrameType::Data(124), 2), vec![0x80, 0x80, 0x00, 0x02]);
        // 256 + 4 = 0x104
        assert_eq!(encode(FrameType::Data(256), 2), vec![0x81, 0x04, 0x00, 0x02]);
    }

    #[test]
    fn test_header_len() {
        assert_eq!(header_len(FrameType::Heartbeat), 1);
        assert_eq!(header_len(FrameType::Request), 3);
        assert_eq!(header_len(FrameType::Data(10)), 3);
        assert_eq!(header_len(FrameType::Data(124)), 4);
    }

    #[test]
    fn test_decode_tag() {
        assert_eq!(decode_tag(&[0x05, 0xAA], 0).unwrap(), (5, 1));
        assert_eq!(decode_tag(&[0x81, 0x04], 0).unwrap(), (0x104, 2));
        assert_eq!(decode_tag(&[0xFF, 0xFF], 0).unwrap(), (MAX_TAG, 2));
    }

    #[test]
    fn test_decode_truncated_extended_tag() {
        let err = decode_tag(&[0x81], 9).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidFrame { offset: 9, .. }));
    }

    #[test]
    fn test_frame_type_roundtrip() {
        for tag in [0u16, 1, 2, 3, 4, 127, 128, MAX_TAG] {
            assert_eq!(FrameType::from_tag(tag).tag(), tag);
        }
    }
}
