//! Offset sender: aggregate, encode, transmit.

use flockbus_core::{encode_frame, OffsetFrame, TransportResult};

use crate::mapping::{aggregate, Contribution};
use crate::transport::DatagramPort;

/// What a send call put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Every contribution cancelled out or was dropped; nothing sent.
    Empty,
    /// One datagram sent.
    Sent {
        /// Index/value pairs in the datagram.
        pairs: usize,
    },
}

/// Sends aggregated offsets over one port.
///
/// A sender is bound to the port it was built with. After a transport error
/// it should be discarded; the controller builds a new one through the
/// [`SenderSlot`](crate::lifecycle::SenderSlot).
#[derive(Debug)]
pub struct OffsetSender<P> {
    port: P,
    datagrams: u64,
}

impl<P: DatagramPort> OffsetSender<P> {
    /// Wrap a freshly opened port.
    pub fn new(port: P) -> Self {
        Self { port, datagrams: 0 }
    }

    /// Aggregate a batch and send it as one datagram.
    ///
    /// An empty aggregate sends nothing. Transport errors are returned to the
    /// caller, which owns the decision to drop this sender.
    pub fn send_offsets(&mut self, contributions: &[Contribution]) -> TransportResult<SendOutcome> {
        let aggregation = aggregate(contributions);
        if aggregation.dropped > 0 {
            log::debug!("{} contributions dropped before sending", aggregation.dropped);
        }
        self.send_frame(&aggregation.frame)
    }

    /// Send an already aggregated frame.
    pub fn send_frame(&mut self, frame: &OffsetFrame) -> TransportResult<SendOutcome> {
        if frame.is_empty() {
            return Ok(SendOutcome::Empty);
        }
        let datagram = encode_frame(frame)?;
        self.port.transmit(&datagram)?;
        self.datagrams += 1;
        log::trace!("sent {} offset pairs", frame.len());
        Ok(SendOutcome::Sent { pairs: frame.len() })
    }

    /// Datagrams sent through this sender.
    pub fn datagrams(&self) -> u64 {
        self.datagrams
    }
}
