//! # flockbus
//!
//! Deterministic modulation bus for a synthesizer, fed by a networked
//! procedural generator.
//!
//! ## Architecture
//!
//! ```text
//! sender process                         receiver process
//! ───────────────                        ────────────────
//! Flock (ModulationGenerator)            OffsetReceiver (UDP)
//!        ↓                                      ↓
//! aggregate → OffsetSender ── OSC/UDP ──→ UnifiedBus::tick
//!        ↓                                      ↓
//! VisualizationSink                      EffectiveTable → synthesis engine
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use flockbus::prelude::*;
//!
//! // Receiver side
//! let bus = UnifiedBus::with_defaults();
//! bus.initialize();
//! bus.set_base("osc1.freq", 220.0);
//! bus.tick();
//! assert_eq!(bus.effective().get(0), Some(220.0));
//!
//! // Sender side
//! let config = PipelineConfig::new();
//! let link = UdpLink::new(config.target_addr, config.reconnect_backoff);
//! let mut controller = Controller::new(Flock::with_seed(1), link, NullSink, &config);
//! controller.tick();
//! ```

// Re-export sub-crates
pub use flockbus_core as core;
pub use flockbus_sender as sender;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use flockbus::prelude::*;
/// ```
pub mod prelude {
    pub use flockbus_core::{
        // Registry
        Registry, Target, TargetRef, TargetUnit, TARGET_COUNT,
        // Apply engine
        ApplyObserver, ApplyReport, BusStatus, EffectiveTable, UnifiedBus,
        // Wire and network input
        decode_datagram, encode_frame, ingest_datagram, OffsetFrame, OffsetReceiver,
        ReceiverStats, OFFSETS_ADDRESS,
        // Scheduling and configuration
        BusConfig, Cadence, ConfigFile, PipelineConfig,
        // Errors
        ConfigError, MappingError, TransportError, TransportResult, WireError,
    };

    pub use flockbus_sender::{
        // Generator surface
        Contribution, Flock, FlockParams, GeneratorSnapshot, ModulationGenerator,
        // Mapping
        aggregate, map_cell,
        // Sending
        ConnectionState, DatagramPort, Link, LoopbackLink, OffsetSender, SendOutcome,
        SenderSlot, UdpLink,
        // Orchestration
        Controller, NetworkOutcome, PipelineStatus, TickOutcome,
        // Visualization
        NullSink, RecordingSink, VisualFrame, VisualizationSink,
    };
}
