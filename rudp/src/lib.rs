//! RUDP - Reliable ordered messaging over unreliable datagrams
//!
//! High-level Rust API re-exporting the protocol core and its UDP driver.

pub use rudp_io as io;
pub use rudp_protocol as protocol;

// Re-export commonly used types
pub use io::{Endpoint, EndpointError, EndpointHandle, RudpSocket, TickClock};
pub use protocol::{
    Connection, ConnectionConfig, ConnectionStats, Delivery, MessageId, Packet, ProtocolError,
};
