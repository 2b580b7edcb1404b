//! Network links and datagram ports.
//!
//! A [`Link`] reports whether the remote end is reachable and opens a
//! [`DatagramPort`] on demand. The controller never holds a port across a
//! failure: it drops the cached sender and asks the link for a new one.
//!
//! Two links ship here: [`UdpLink`] for real traffic and [`LoopbackLink`],
//! an in-memory link whose failures can be scripted.

use std::cell::{Cell, RefCell};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::rc::Rc;
use std::time::{Duration, Instant};

use flockbus_core::{TransportError, TransportResult};
use serde::Serialize;

/// Whether a link currently accepts new senders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// New senders can be built.
    Connected,
    /// The remote end is unreachable; no sender is built.
    Disconnected,
}

impl ConnectionState {
    /// Shorthand for `self == ConnectionState::Connected`.
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }
}

/// Connectionless byte sink.
pub trait DatagramPort {
    /// Send one datagram.
    fn transmit(&mut self, datagram: &[u8]) -> TransportResult<()>;
}

/// Source of datagram ports.
pub trait Link {
    /// Port type produced by [`open`](Self::open).
    type Port: DatagramPort;

    /// Current connection state.
    fn state(&self) -> ConnectionState;

    /// Open a fresh port.
    ///
    /// May fail even when [`state`](Self::state) just reported
    /// [`ConnectionState::Connected`].
    fn open(&self) -> TransportResult<Self::Port>;
}

// =============================================================================
// UDP
// =============================================================================

/// UDP link to a fixed receiver address.
///
/// UDP has no connection of its own, so the state is derived from recent
/// failures: after a failed open or transmit the link reports
/// [`ConnectionState::Disconnected`] until the back-off has elapsed.
#[derive(Debug, Clone)]
pub struct UdpLink {
    target: SocketAddr,
    backoff: Duration,
    last_failure: Rc<Cell<Option<Instant>>>,
}

impl UdpLink {
    /// Link to `target` that stays disconnected for `backoff` after a failure.
    pub fn new(target: SocketAddr, backoff: Duration) -> Self {
        Self {
            target,
            backoff,
            last_failure: Rc::new(Cell::new(None)),
        }
    }

    /// Receiver address.
    pub fn target(&self) -> SocketAddr {
        self.target
    }

    fn record_failure(&self) {
        self.last_failure.set(Some(Instant::now()));
    }

    fn bind_any(&self) -> std::io::Result<UdpSocket> {
        let local: SocketAddr = if self.target.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local)?;
        socket.connect(self.target)?;
        socket.set_nonblocking(true)?;
        Ok(socket)
    }
}

impl Link for UdpLink {
    type Port = UdpPort;

    fn state(&self) -> ConnectionState {
        match self.last_failure.get() {
            Some(at) if at.elapsed() < self.backoff => ConnectionState::Disconnected,
            _ => ConnectionState::Connected,
        }
    }

    fn open(&self) -> TransportResult<UdpPort> {
        match self.bind_any() {
            Ok(socket) => {
                log::debug!("opened UDP port to {}", self.target);
                Ok(UdpPort {
                    socket,
                    last_failure: Rc::clone(&self.last_failure),
                })
            }
            Err(e) => {
                self.record_failure();
                Err(TransportError::Io(e))
            }
        }
    }
}

/// Port opened by a [`UdpLink`].
#[derive(Debug)]
pub struct UdpPort {
    socket: UdpSocket,
    last_failure: Rc<Cell<Option<Instant>>>,
}

impl DatagramPort for UdpPort {
    fn transmit(&mut self, datagram: &[u8]) -> TransportResult<()> {
        match self.socket.send(datagram) {
            Ok(_) => Ok(()),
            Err(e) => {
                self.last_failure.set(Some(Instant::now()));
                Err(TransportError::Io(e))
            }
        }
    }
}

// =============================================================================
// Loopback
// =============================================================================

#[derive(Debug)]
struct LoopbackState {
    connected: bool,
    fail_next_open: bool,
    fail_transmits: bool,
    disconnect_on_open: bool,
    opened: usize,
    sent: Vec<Vec<u8>>,
}

/// In-memory link that records every datagram.
///
/// Clones share state, so a test keeps one handle while the controller owns
/// another.
#[derive(Debug, Clone)]
pub struct LoopbackLink {
    state: Rc<RefCell<LoopbackState>>,
}

impl Default for LoopbackLink {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackLink {
    /// A connected link with nothing sent.
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(LoopbackState {
                connected: true,
                fail_next_open: false,
                fail_transmits: false,
                disconnect_on_open: false,
                opened: 0,
                sent: Vec::new(),
            })),
        }
    }

    /// Set the state reported by [`state`](Link::state).
    ///
    /// Open ports fail to transmit while disconnected.
    pub fn set_connected(&self, connected: bool) {
        self.state.borrow_mut().connected = connected;
    }

    /// Make the next [`open`](Link::open) fail with an I/O error.
    pub fn fail_next_open(&self) {
        self.state.borrow_mut().fail_next_open = true;
    }

    /// Make the link drop between the state check and the next open.
    ///
    /// The open then fails with [`TransportError::NotConnected`].
    pub fn disconnect_on_next_open(&self) {
        self.state.borrow_mut().disconnect_on_open = true;
    }

    /// Make every transmit fail until cleared.
    pub fn fail_transmits(&self, fail: bool) {
        self.state.borrow_mut().fail_transmits = fail;
    }

    /// Ports opened so far.
    pub fn opened(&self) -> usize {
        self.state.borrow().opened
    }

    /// Copy of every datagram sent so far.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.state.borrow().sent.clone()
    }

    /// Take the datagrams sent so far.
    pub fn take_sent(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.state.borrow_mut().sent)
    }
}

impl Link for LoopbackLink {
    type Port = LoopbackPort;

    fn state(&self) -> ConnectionState {
        if self.state.borrow().connected {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    fn open(&self) -> TransportResult<LoopbackPort> {
        let mut state = self.state.borrow_mut();
        if state.disconnect_on_open {
            state.disconnect_on_open = false;
            state.connected = false;
        }
        if !state.connected {
            return Err(TransportError::NotConnected);
        }
        if state.fail_next_open {
            state.fail_next_open = false;
            return Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "loopback open refused",
            )));
        }
        state.opened += 1;
        Ok(LoopbackPort {
            state: Rc::clone(&self.state),
        })
    }
}

/// Port opened by a [`LoopbackLink`].
#[derive(Debug)]
pub struct LoopbackPort {
    state: Rc<RefCell<LoopbackState>>,
}

impl DatagramPort for LoopbackPort {
    fn transmit(&mut self, datagram: &[u8]) -> TransportResult<()> {
        let mut state = self.state.borrow_mut();
        if !state.connected {
            return Err(TransportError::NotConnected);
        }
        if state.fail_transmits {
            return Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "loopback transmit failed",
            )));
        }
        state.sent.push(datagram.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loopback_records_datagrams() {
        let link = LoopbackLink::new();
        let mut port = link.open().unwrap();
        port.transmit(b"one").unwrap();
        port.transmit(b"two").unwrap();

        assert_eq!(link.opened(), 1);
        assert_eq!(link.take_sent(), vec![b"one".to_vec(), b"two".to_vec()]);
        assert!(link.sent().is_empty());
    }

    #[test]
    fn test_loopback_open_fails_when_disconnected() {
        let link = LoopbackLink::new();
        link.set_connected(false);
        assert_eq!(link.state(), ConnectionState::Disconnected);
        assert!(matches!(link.open(), Err(TransportError::NotConnected)));
    }

    #[test]
    fn test_loopback_scripted_open_failure_is_one_shot() {
        let link = LoopbackLink::new();
        link.fail_next_open();
        assert!(matches!(link.open(), Err(TransportError::Io(_))));
        assert!(link.open().is_ok());
        assert_eq!(link.opened(), 1);
    }

    #[test]
    fn test_loopback_port_fails_after_disconnect() {
        let link = LoopbackLink::new();
        let mut port = link.open().unwrap();
        link.set_connected(false);
        assert!(port.transmit(b"x").is_err());
        link.set_connected(true);
        link.fail_transmits(true);
        assert!(port.transmit(b"x").is_err());
        assert!(link.sent().is_empty());
    }

    #[test]
    fn test_udp_link_sends_to_receiver() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let link = UdpLink::new(receiver.local_addr().unwrap(), Duration::from_millis(500));

        assert_eq!(link.state(), ConnectionState::Connected);
        let mut port = link.open().unwrap();
        port.transmit(b"hello").unwrap();

        let mut buf = [0u8; 16];
        let len = receiver.recv(&mut buf).unwrap();
        assert_eq!(&buf[..len], b"hello");
    }

    #[test]
    fn test_udp_link_reports_disconnected_during_backoff() {
        let link = UdpLink::new("127.0.0.1:9".parse().unwrap(), Duration::from_secs(60));
        link.record_failure();
        assert_eq!(link.state(), ConnectionState::Disconnected);

        let link = UdpLink::new("127.0.0.1:9".parse().unwrap(), Duration::ZERO);
        link.record_failure();
        assert_eq!(link.state(), ConnectionState::Connected);
    }
}
