//! Network input for the offsets channel.
//!
//! [`OffsetReceiver`] owns a non-blocking UDP socket. The receiver loop polls
//! it right before each apply tick, so the apply tick itself never touches
//! I/O. Every decoded frame is handed to [`UnifiedBus::submit_offset_frame`].

use std::io;
use std::net::{SocketAddr, UdpSocket};

use serde::Serialize;

use crate::bus::UnifiedBus;
use crate::error::WireError;
use crate::wire::{decode_datagram, MAX_DATAGRAM_SIZE};

/// Datagrams read by one [`OffsetReceiver::poll`] before it returns.
pub const MAX_DATAGRAMS_PER_POLL: usize = 64;

/// Running totals kept by an [`OffsetReceiver`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReceiverStats {
    /// Datagrams read from the socket.
    pub datagrams: u64,
    /// Frames submitted to the bus.
    pub frames: u64,
    /// Datagrams dropped as malformed.
    pub malformed: u64,
}

/// Decode a datagram and queue its frames on the bus.
///
/// Returns the number of frames submitted. Malformed datagrams are rejected
/// as a whole and nothing is queued.
pub fn ingest_datagram(bus: &UnifiedBus, bytes: &[u8]) -> Result<usize, WireError> {
    let frames = decode_datagram(bytes)?;
    for frame in &frames {
        bus.submit_offset_frame(frame);
    }
    Ok(frames.len())
}

/// Non-blocking UDP listener for offset frames.
#[derive(Debug)]
pub struct OffsetReceiver {
    socket: UdpSocket,
    buffer: Vec<u8>,
    stats: ReceiverStats,
}

impl OffsetReceiver {
    /// Bind a non-blocking socket.
    pub fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_nonblocking(true)?;
        log::info!("offset receiver listening on {}", socket.local_addr()?);
        Ok(Self {
            socket,
            buffer: vec![0u8; MAX_DATAGRAM_SIZE],
            stats: ReceiverStats::default(),
        })
    }

    /// Address the socket is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Totals since bind.
    pub fn stats(&self) -> ReceiverStats {
        self.stats
    }

    /// Drain waiting datagrams and queue their frames.
    ///
    /// Never blocks and reads at most [`MAX_DATAGRAMS_PER_POLL`] datagrams,
    /// leaving the rest for the next poll. Returns the number of frames
    /// submitted.
    pub fn poll(&mut self, bus: &UnifiedBus) -> usize {
        let mut submitted = 0;
        for _ in 0..MAX_DATAGRAMS_PER_POLL {
            let (len, from) = match self.socket.recv_from(&mut self.buffer) {
                Ok(received) => received,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    // e.g. ICMP port unreachable surfaced on some platforms
                    log::debug!("offset receiver: recv failed: {e}");
                    break;
                }
            };
            self.stats.datagrams += 1;

            match ingest_datagram(bus, &self.buffer[..len]) {
                Ok(frames) => {
                    self.stats.frames += frames as u64;
                    submitted += frames;
                }
                Err(e) => {
                    self.stats.malformed += 1;
                    log::warn!("dropped malformed datagram from {from}: {e}");
                }
            }
        }
        submitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{encode_frame, OffsetFrame};
    use std::time::{Duration, Instant};

    fn poll_until(receiver: &mut OffsetReceiver, bus: &UnifiedBus, frames: usize) -> usize {
        let deadline = Instant::now() + Duration::from_secs(2);
        let mut total = 0;
        while total < frames && Instant::now() < deadline {
            total += receiver.poll(bus);
            std::thread::sleep(Duration::from_millis(1));
        }
        total
    }

    #[test]
    fn test_ingest_datagram_queues_frame() {
        let bus = UnifiedBus::with_defaults();
        bus.initialize();
        let frame = OffsetFrame::new(vec![(0, 10.0)]).unwrap();

        let frames = ingest_datagram(&bus, &encode_frame(&frame).unwrap()).unwrap();
        bus.tick();

        assert_eq!(frames, 1);
        assert_eq!(bus.effective().get(0), Some(450.0));
    }

    #[test]
    fn test_ingest_malformed_queues_nothing() {
        let bus = UnifiedBus::with_defaults();
        bus.initialize();
        assert!(ingest_datagram(&bus, b"not osc at all").is_err());
        assert_eq!(bus.status().pending_offsets, 0);
    }

    #[test]
    fn test_non_finite_wire_offset_is_stored_as_zero() {
        let bus = UnifiedBus::with_defaults();
        bus.initialize();
        let message = rosc::OscMessage {
            addr: crate::wire::OFFSETS_ADDRESS.to_string(),
            args: vec![
                rosc::OscType::Int(1),
                rosc::OscType::Float(f32::NAN),
                rosc::OscType::Int(2),
                rosc::OscType::Float(0.5),
            ],
        };
        let bytes = rosc::encoder::encode(&rosc::OscPacket::Message(message)).unwrap();

        assert_eq!(ingest_datagram(&bus, &bytes).unwrap(), 1);
        let report = bus.tick().unwrap();

        assert_eq!(bus.offset(1), Some(0.0));
        assert_eq!(bus.offset(2), Some(0.5));
        assert_eq!(report.rejected, 1);
        assert!(bus.effective().get(1).is_some_and(f32::is_finite));
    }

    #[test]
    fn test_bundle_with_bad_message_queues_nothing() {
        let bus = UnifiedBus::with_defaults();
        bus.initialize();
        let good = OffsetFrame::new(vec![(0, 10.0)]).unwrap();
        let bad = rosc::OscMessage {
            addr: "/elsewhere".to_string(),
            args: vec![],
        };
        let packet = rosc::OscPacket::Bundle(rosc::OscBundle {
            timetag: rosc::OscTime {
                seconds: 0,
                fractional: 1,
            },
            content: vec![
                rosc::OscPacket::Message(good.to_message()),
                rosc::OscPacket::Message(bad),
            ],
        });
        let bytes = rosc::encoder::encode(&packet).unwrap();

        assert!(ingest_datagram(&bus, &bytes).is_err());
        assert_eq!(bus.status().pending_offsets, 0);
        bus.tick();
        assert_eq!(bus.effective().get(0), Some(440.0));
    }

    #[test]
    fn test_poll_empty_socket_returns_immediately() {
        let bus = UnifiedBus::with_defaults();
        let mut receiver = OffsetReceiver::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        assert_eq!(receiver.poll(&bus), 0);
        assert_eq!(receiver.stats(), ReceiverStats::default());
    }

    #[test]
    fn test_poll_reads_a_bounded_number_of_datagrams() {
        let bus = UnifiedBus::with_defaults();
        bus.initialize();
        let mut receiver = OffsetReceiver::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let target = receiver.local_addr().unwrap();

        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        let datagram = encode_frame(&OffsetFrame::new(vec![(0, 1.0)]).unwrap()).unwrap();
        let total = MAX_DATAGRAMS_PER_POLL + 6;
        for _ in 0..total {
            sender.send_to(&datagram, target).unwrap();
        }
        std::thread::sleep(Duration::from_millis(50));

        assert_eq!(receiver.poll(&bus), MAX_DATAGRAMS_PER_POLL);
        assert_eq!(poll_until(&mut receiver, &bus, 6), 6);
        assert_eq!(receiver.stats().datagrams, total as u64);
    }

    #[test]
    fn test_poll_receives_udp_frames() {
        let bus = UnifiedBus::with_defaults();
        bus.initialize();
        let mut receiver = OffsetReceiver::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let target = receiver.local_addr().unwrap();

        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        let frame = OffsetFrame::new(vec![(2, 0.5)]).unwrap();
        sender.send_to(&encode_frame(&frame).unwrap(), target).unwrap();
        sender.send_to(b"junk", target).unwrap();

        assert_eq!(poll_until(&mut receiver, &bus, 1), 1);
        // The junk datagram may arrive in the same or a later poll
        let deadline = Instant::now() + Duration::from_secs(2);
        while receiver.stats().malformed == 0 && Instant::now() < deadline {
            receiver.poll(&bus);
            std::thread::sleep(Duration::from_millis(1));
        }
        bus.tick();

        assert_eq!(bus.offset(2), Some(0.5));
        assert_eq!(receiver.stats().frames, 1);
        assert_eq!(receiver.stats().malformed, 1);
    }
}
