//! Endpoint driver
//!
//! Binds one [`Connection`] to one UDP peer. Each pump feeds every waiting
//! datagram into the connection with a zero tick delta, then advances the
//! connection by the wall-clock ticks that elapsed, sends whatever it
//! produced and drains the deliveries.

use crate::clock::TickClock;
use crate::socket::{RudpSocket, SocketError};
use crossbeam::channel::{self, Receiver, RecvTimeoutError};
use parking_lot::Mutex;
use rudp_protocol::{Connection, ConnectionStats, Delivery, MessageId, ProtocolError};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Largest datagram the endpoint will read
pub const MAX_DATAGRAM_SIZE: usize = 65_536;

/// Endpoint errors
#[derive(Error, Debug)]
pub enum EndpointError {
    #[error("Socket error: {0}")]
    Socket(#[from] SocketError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Failed to start endpoint thread: {0}")]
    Spawn(#[from] io::Error),

    #[error("Endpoint has stopped")]
    Disconnected,
}

/// One connection bound to one peer address
pub struct Endpoint {
    socket: RudpSocket,
    peer: SocketAddr,
    connection: Arc<Mutex<Connection>>,
    clock: TickClock,
    recv_buf: Vec<u8>,
}

impl Endpoint {
    pub fn new(socket: RudpSocket, peer: SocketAddr, connection: Connection, tick: Duration) -> Self {
        Endpoint {
            socket,
            peer,
            connection: Arc::new(Mutex::new(connection)),
            clock: TickClock::new(tick),
            recv_buf: vec![0u8; MAX_DATAGRAM_SIZE],
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn local_addr(&self) -> Result<SocketAddr, SocketError> {
        self.socket.local_addr()
    }

    /// Shared handle to the connection state
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.connection)
    }

    /// Queue a message for the peer
    pub fn send(&self, payload: &[u8]) -> Result<MessageId, EndpointError> {
        Ok(self.connection.lock().send(payload)?)
    }

    pub fn stats(&self) -> ConnectionStats {
        self.connection.lock().stats().clone()
    }

    /// Run one receive/update/send cycle
    ///
    /// Returns every delivery that became available, in order.
    pub fn pump(&mut self) -> Result<Vec<Delivery>, EndpointError> {
        let mut connection = self.connection.lock();

        while let Some((len, from)) = self.socket.try_recv_from(&mut self.recv_buf)? {
            if from != self.peer {
                warn!(%from, peer = %self.peer, "Ignoring datagram from unknown address");
                continue;
            }
            if let Some(packets) = connection.update(&self.recv_buf[..len], 0) {
                self.socket.send_packets(&packets, self.peer)?;
            }
        }

        let ticks = self.clock.advance();
        if let Some(packets) = connection.update(&[], ticks) {
            self.socket.send_packets(&packets, self.peer)?;
        }

        let mut deliveries = Vec::new();
        loop {
            match connection.receive() {
                Delivery::Empty => break,
                delivery => deliveries.push(delivery),
            }
        }
        Ok(deliveries)
    }

    /// Move the endpoint onto a background thread
    ///
    /// The thread pumps every `poll_interval` and forwards deliveries to the
    /// returned handle until the handle is shut down or dropped.
    pub fn spawn(mut self, poll_interval: Duration) -> Result<EndpointHandle, EndpointError> {
        let (tx, rx) = channel::unbounded();
        let running = Arc::new(AtomicBool::new(true));
        let connection = self.connection();

        let flag = Arc::clone(&running);
        let thread = thread::Builder::new()
            .name("rudp-endpoint".into())
            .spawn(move || {
                info!(peer = %self.peer, "Endpoint started");
                while flag.load(Ordering::Acquire) {
                    match self.pump() {
                        Ok(deliveries) => {
                            for delivery in deliveries {
                                if tx.send(delivery).is_err() {
                                    debug!("Delivery receiver dropped");
                                    flag.store(false, Ordering::Release);
                                    return;
                                }
                            }
                        }
                        Err(e) => {
                            error!(error = %e, "Endpoint stopped");
                            flag.store(false, Ordering::Release);
                            return;
                        }
                    }
                    thread::sleep(poll_interval);
                }
                info!(peer = %self.peer, "Endpoint stopped");
            })?;

        Ok(EndpointHandle {
            connection,
            deliveries: rx,
            running,
            thread: Some(thread),
        })
    }
}

/// Handle to an endpoint running on its own thread
pub struct EndpointHandle {
    connection: Arc<Mutex<Connection>>,
    deliveries: Receiver<Delivery>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl EndpointHandle {
    /// Queue a message for the peer
    pub fn send(&self, payload: &[u8]) -> Result<MessageId, EndpointError> {
        if !self.is_running() {
            return Err(EndpointError::Disconnected);
        }
        Ok(self.connection.lock().send(payload)?)
    }

    /// Next delivery, if one is already waiting
    pub fn try_recv(&self) -> Option<Delivery> {
        self.deliveries.try_recv().ok()
    }

    /// Wait up to `timeout` for the next delivery
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<Delivery>, EndpointError> {
        match self.deliveries.recv_timeout(timeout) {
            Ok(delivery) => Ok(Some(delivery)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(EndpointError::Disconnected),
        }
    }

    /// Channel the endpoint thread delivers into
    pub fn deliveries(&self) -> &Receiver<Delivery> {
        &self.deliveries
    }

    pub fn stats(&self) -> ConnectionStats {
        self.connection.lock().stats().clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stop the endpoint thread and wait for it to exit
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Endpoint thread panicked");
            }
        }
    }
}

impl Drop for EndpointHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::time::Instant;

    const TICK: Duration = Duration::from_millis(1);

    fn pair() -> (Endpoint, Endpoint) {
        let a = RudpSocket::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let b = RudpSocket::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let a_addr = a.local_addr().unwrap();
        let b_addr = b.local_addr().unwrap();
        (
            Endpoint::new(a, b_addr, Connection::new(1, 1000), TICK),
            Endpoint::new(b, a_addr, Connection::new(1, 1000), TICK),
        )
    }

    #[test]
    fn test_pump_delivers_in_order() {
        let (mut a, mut b) = pair();
        for i in 0..10u8 {
            a.send(&[i; 4]).unwrap();
        }

        let mut received = Vec::new();
        let deadline = Instant::now() + Duration::from_secs(5);
        while received.len() < 10 && Instant::now() < deadline {
            a.pump().unwrap();
            for delivery in b.pump().unwrap() {
                received.push(delivery.into_data().unwrap());
            }
            thread::sleep(Duration::from_millis(2));
        }

        let expected: Vec<Bytes> = (0..10u8).map(|i| Bytes::from(vec![i; 4])).collect();
        assert_eq!(received, expected);
        assert_eq!(a.stats().messages_sent, 10);
        assert_eq!(b.stats().messages_delivered, 10);
    }

    #[test]
    fn test_datagrams_from_strangers_are_ignored() {
        let (_a, mut b) = pair();
        let stranger = RudpSocket::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        stranger
            .send_to(&[0x08, 0x00, 0x00, 1, 2, 3, 4], b.local_addr().unwrap())
            .unwrap();

        thread::sleep(Duration::from_millis(20));
        assert!(b.pump().unwrap().is_empty());
        assert_eq!(b.stats().messages_received, 0);
    }

    #[test]
    fn test_send_rejects_oversized_payload() {
        let (a, _b) = pair();
        let payload = vec![0u8; rudp_protocol::MAX_PAYLOAD_SIZE + 1];
        assert!(matches!(
            a.send(&payload),
            Err(EndpointError::Protocol(ProtocolError::PayloadTooLarge { .. }))
        ));
    }

    #[test]
    fn test_spawned_endpoints_exchange_messages() {
        let (a, b) = pair();
        let a = a.spawn(Duration::from_millis(1)).unwrap();
        let b = b.spawn(Duration::from_millis(1)).unwrap();

        a.send(b"ping").unwrap();
        let delivery = b.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(delivery, Some(Delivery::Data(Bytes::from_static(b"ping"))));

        b.send(b"pong").unwrap();
        let delivery = a.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(delivery, Some(Delivery::Data(Bytes::from_static(b"pong"))));

        a.shutdown();
        b.shutdown();
    }

    #[test]
    fn test_send_after_shutdown_fails() {
        let (a, _b) = pair();
        let handle = a.spawn(Duration::from_millis(1)).unwrap();
        handle.running.store(false, Ordering::Release);
        assert!(matches!(handle.send(b"late"), Err(EndpointError::Disconnected)));
    }
}
