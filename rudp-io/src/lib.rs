//! RUDP I/O
//!
//! Drives protocol connections over real UDP sockets: a non-blocking socket
//! wrapper, a clock that turns wall time into protocol ticks, and an
//! endpoint that ties one connection to one peer.

pub mod clock;
pub mod endpoint;
pub mod socket;

pub use clock::TickClock;
pub use endpoint::{Endpoint, EndpointError, EndpointHandle, MAX_DATAGRAM_SIZE};
pub use socket::{RudpSocket, SocketError};
