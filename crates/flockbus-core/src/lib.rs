//! # flockbus-core
//!
//! Receiver side of the flockbus modulation bus, plus the pieces both sides
//! share.
//!
//! ## Architecture
//!
//! ```text
//! control surface --set_base/enable/clear--> PendingQueues ─┐
//! network --OffsetReceiver--> submit_offset_frame ----------┤
//!                                                           ▼
//!                                              UnifiedBus::tick (apply)
//!                                                           │
//!                                          EffectiveTable (read-only, any thread)
//! ```
//!
//! - [`registry`]: the immutable table of 149 targets
//! - [`bus`]: value stores, pending queues, atomic disable, apply tick
//! - [`effective`]: lock-free published effective values
//! - [`wire`]: typed OSC encoding of offset frames
//! - [`inbound`]: non-blocking UDP receiver for offset frames
//! - [`cadence`]: fixed-period scheduling for tick loops
//! - [`config`]: runtime and on-disk configuration
//! - [`error`]: error types

pub mod bus;
pub mod cadence;
pub mod config;
pub mod effective;
pub mod error;
pub mod inbound;
pub mod registry;
pub mod wire;

pub use bus::{ApplyObserver, ApplyReport, BusStatus, UnifiedBus};
pub use cadence::Cadence;
pub use config::{BusConfig, ConfigFile, PipelineConfig};
pub use effective::EffectiveTable;
pub use error::{ConfigError, MappingError, TransportError, TransportResult, WireError};
pub use inbound::{ingest_datagram, OffsetReceiver, ReceiverStats, MAX_DATAGRAMS_PER_POLL};
pub use registry::{Registry, Target, TargetRef, TargetUnit, TARGET_COUNT};
pub use wire::{decode_datagram, encode_frame, OffsetFrame, OFFSETS_ADDRESS};
