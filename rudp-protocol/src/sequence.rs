//! Message Id Handling
//!
//! Messages carry an absolute, monotonically increasing id on each side of the
//! connection, but only its low 16 bits travel on the wire. The receiver
//! rebuilds the absolute id from those 16 bits using a sliding window of
//! ±32768 centred on the highest absolute id it has reconstructed so far.

use std::fmt;
use std::ops::{Add, AddAssign, Sub};

/// Bits of the id carried on the wire
pub const WIRE_ID_MASK: i64 = 0xFFFF;

/// Size of one wire epoch (the 16-bit id space)
pub const WIRE_EPOCH: i64 = 0x1_0000;

/// Half the wire epoch; the reconstruction window on either side of the anchor
pub const HALF_WINDOW: i64 = 0x8000;

/// Absolute message id
///
/// Signed so that an id reconstructed backwards across the first epoch
/// boundary (anchor 5, wire id 60000) stays representable as a negative
/// value that sorts before every real id.
#[derive(Copy, Clone, Default, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct MessageId(i64);

impl MessageId {
    /// Create a message id from its absolute value
    #[inline]
    pub const fn new(value: i64) -> Self {
        MessageId(value)
    }

    /// Get the absolute value
    #[inline]
    pub fn as_raw(self) -> i64 {
        self.0
    }

    /// Low 16 bits, as sent on the wire
    #[inline]
    pub fn wire(self) -> u16 {
        (self.0 & WIRE_ID_MASK) as u16
    }

    /// Increment the id by 1
    #[inline]
    pub fn increment(&mut self) {
        self.0 += 1;
    }

    /// Get the next id
    #[inline]
    pub fn next(self) -> Self {
        MessageId(self.0 + 1)
    }

    /// Signed distance from this id to `other`
    #[inline]
    pub fn distance_to(self, other: MessageId) -> i64 {
        other.0 - self.0
    }

    /// Rebuild the absolute id for a 16-bit wire id
    ///
    /// The wire id is placed in the anchor's epoch first. If that lands more
    /// than half an epoch below the anchor, the sender has wrapped into the
    /// next epoch; if it lands more than half an epoch above, it is a late
    /// id from the previous epoch.
    ///
    /// Correct only while the true id never moves more than 32768 past the
    /// anchor between two observations.
    pub fn reconstruct(wire: u16, anchor: MessageId) -> MessageId {
        let mut id = i64::from(wire) | (anchor.0 & !WIRE_ID_MASK);

        if id < anchor.0 - HALF_WINDOW {
            id += WIRE_EPOCH;
        } else if id > anchor.0 + HALF_WINDOW {
            id -= WIRE_EPOCH;
        }

        MessageId(id)
    }
}

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageId({})", self.0)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for MessageId {
    fn from(value: i64) -> Self {
        MessageId(value)
    }
}

impl From<MessageId> for i64 {
    fn from(id: MessageId) -> i64 {
        id.0
    }
}

impl Add<i64> for MessageId {
    type Output = MessageId;

    fn add(self, rhs: i64) -> MessageId {
        MessageId(self.0 + rhs)
    }
}

impl AddAssign<i64> for MessageId {
    fn add_assign(&mut self, rhs: i64) {
        self.0 += rhs;
    }
}

impl Sub for MessageId {
    type Output = i64;

    fn sub(self, rhs: MessageId) -> i64 {
        rhs.distance_to(self)
    }
}
