//! UDP socket wrapper
//!
//! A non-blocking datagram socket configured through socket2. The protocol
//! tolerates loss, so a send that would block is reported to the caller as
//! a dropped datagram rather than retried.

use rudp_protocol::Packet;
use socket2::{Domain, Protocol, SockRef, Socket, Type};
use std::io::{self, ErrorKind};
use std::net::{SocketAddr, UdpSocket};
use thiserror::Error;
use tracing::trace;

/// Socket errors
#[derive(Error, Debug)]
pub enum SocketError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid socket address")]
    InvalidAddress,
}

/// Non-blocking UDP socket carrying protocol packets
#[derive(Debug)]
pub struct RudpSocket {
    inner: UdpSocket,
}

impl RudpSocket {
    /// Create a socket bound to the given address
    pub fn bind(addr: SocketAddr) -> Result<Self, SocketError> {
        let domain = if addr.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };

        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&addr.into())?;
        socket.set_nonblocking(true)?;

        Ok(RudpSocket {
            inner: socket.into(),
        })
    }

    /// Parse and bind an address string such as `127.0.0.1:9000`
    pub fn bind_str(addr: &str) -> Result<Self, SocketError> {
        let addr: SocketAddr = addr.parse().map_err(|_| SocketError::InvalidAddress)?;
        Self::bind(addr)
    }

    pub fn set_send_buffer_size(&self, size: usize) -> Result<(), SocketError> {
        SockRef::from(&self.inner).set_send_buffer_size(size)?;
        Ok(())
    }

    pub fn set_recv_buffer_size(&self, size: usize) -> Result<(), SocketError> {
        SockRef::from(&self.inner).set_recv_buffer_size(size)?;
        Ok(())
    }

    pub fn send_buffer_size(&self) -> Result<usize, SocketError> {
        Ok(SockRef::from(&self.inner).send_buffer_size()?)
    }

    pub fn recv_buffer_size(&self) -> Result<usize, SocketError> {
        Ok(SockRef::from(&self.inner).recv_buffer_size()?)
    }

    /// Get the local address this socket is bound to
    pub fn local_addr(&self) -> Result<SocketAddr, SocketError> {
        Ok(self.inner.local_addr()?)
    }

    /// Send one datagram
    ///
    /// Returns `Ok(None)` if the socket buffer is full and the datagram was
    /// not sent.
    pub fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<Option<usize>, SocketError> {
        match self.inner.send_to(buf, target) {
            Ok(n) => Ok(Some(n)),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(SocketError::Io(e)),
        }
    }

    /// Send each packet as its own datagram
    ///
    /// Returns the number of bytes actually sent.
    pub fn send_packets(&self, packets: &[Packet], target: SocketAddr) -> Result<usize, SocketError> {
        let mut sent = 0;
        for packet in packets {
            match self.send_to(packet.as_bytes(), target)? {
                Some(n) => sent += n,
                None => trace!(len = packet.len(), %target, "socket full, datagram dropped"),
            }
        }
        Ok(sent)
    }

    /// Receive one datagram if one is waiting
    pub fn try_recv_from(&self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>, SocketError> {
        match self.inner.recv_from(buf) {
            Ok((n, addr)) => Ok(Some((n, addr))),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
            // ICMP port unreachable from an earlier send surfaces here on some
            // platforms; the peer may simply not be up yet
            Err(e) if e.kind() == ErrorKind::ConnectionReset => Ok(None),
            Err(e) => Err(SocketError::Io(e)),
        }
    }

    pub fn try_clone(&self) -> Result<Self, SocketError> {
        Ok(RudpSocket {
            inner: self.inner.try_clone()?,
        })
    }

    /// Get a reference to the underlying socket
    pub fn as_udp_socket(&self) -> &UdpSocket {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::thread;
    use std::time::Duration;

    fn localhost() -> RudpSocket {
        RudpSocket::bind("127.0.0.1:0".parse().unwrap()).unwrap()
    }

    fn recv_with_retry(socket: &RudpSocket, buf: &mut [u8]) -> (usize, SocketAddr) {
        for _ in 0..50 {
            if let Some(received) = socket.try_recv_from(buf).unwrap() {
                return received;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("Failed to receive data");
    }

    #[test]
    fn test_socket_creation() {
        let socket = localhost();
        let addr = socket.local_addr().unwrap();
        assert!(addr.port() > 0);
    }

    #[test]
    fn test_bind_str_rejects_garbage() {
        assert!(matches!(
            RudpSocket::bind_str("not an address"),
            Err(SocketError::InvalidAddress)
        ));
    }

    #[test]
    fn test_socket_buffer_sizes() {
        let socket = localhost();
        socket.set_send_buffer_size(262144).unwrap();
        socket.set_recv_buffer_size(262144).unwrap();

        // May not match exactly due to OS limits
        assert!(socket.send_buffer_size().unwrap() > 0);
        assert!(socket.recv_buffer_size().unwrap() > 0);
    }

    #[test]
    fn test_try_recv_on_idle_socket() {
        let socket = localhost();
        let mut buf = [0u8; 64];
        assert!(socket.try_recv_from(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_send_packets() {
        let sender = localhost();
        let receiver = localhost();
        let receiver_addr = receiver.local_addr().unwrap();

        let packets = vec![
            Packet::new(Bytes::from_static(&[0x08, 0x00, 0x00, 1, 2, 3, 4])),
            Packet::new(Bytes::from_static(&[0x00])),
        ];
        let sent = sender.send_packets(&packets, receiver_addr).unwrap();
        assert_eq!(sent, 8);

        let mut buf = [0u8; 1024];
        let (n, from) = recv_with_retry(&receiver, &mut buf);
        assert_eq!(&buf[..n], packets[0].as_bytes());
        assert_eq!(from, sender.local_addr().unwrap());

        let (n, _) = recv_with_retry(&receiver, &mut buf);
        assert_eq!(&buf[..n], &[0x00]);
    }

    #[test]
    fn test_socket_ipv6() {
        // May fail on systems without IPv6
        if let Ok(socket) = RudpSocket::bind("[::1]:0".parse().unwrap()) {
            assert!(socket.local_addr().unwrap().is_ipv6());
        }
    }
}
