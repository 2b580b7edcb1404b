//! # flockbus-sender
//!
//! Sender side of the flockbus modulation bus: turns generator output into
//! typed offset datagrams.
//!
//! ```text
//! ModulationGenerator --snapshot--> aggregate --> OffsetSender --> Link
//!                               └--------------> VisualizationSink
//! ```
//!
//! [`Controller`] owns every piece and runs them in a fixed order per tick.

pub mod controller;
pub mod flock;
pub mod generator;
pub mod lifecycle;
pub mod mapping;
pub mod sender;
pub mod transport;
pub mod visual;

pub use controller::{Controller, NetworkOutcome, PipelineStatus, TickOutcome};
pub use flock::{Flock, FlockParams};
pub use generator::{CellValue, GeneratorSnapshot, ModulationGenerator, Position};
pub use lifecycle::SenderSlot;
pub use mapping::{aggregate, map_cell, Aggregation, Contribution, COLUMN_COUNT, ROW_COUNT};
pub use sender::{OffsetSender, SendOutcome};
pub use transport::{
    ConnectionState, DatagramPort, Link, LoopbackLink, LoopbackPort, UdpLink, UdpPort,
};
pub use visual::{NullSink, RecordedFrame, RecordingSink, VisualFrame, VisualizationSink};
