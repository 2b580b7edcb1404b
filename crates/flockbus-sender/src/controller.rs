//! Sender-side tick orchestration.
//!
//! One [`Controller::tick`] runs, in order:
//!
//! 1. return early when disabled
//! 2. advance the generator once
//! 3. take one snapshot
//! 4. acquire a sender (errors mean no send this tick)
//! 5. send the snapshot's contributions (errors drop the cached sender)
//! 6. emit the same snapshot to the visualization sink
//!
//! Nothing in a tick propagates an error. Transport trouble only changes the
//! [`NetworkOutcome`].

use std::time::Duration;

use flockbus_core::PipelineConfig;
use serde::Serialize;

use crate::generator::ModulationGenerator;
use crate::lifecycle::SenderSlot;
use crate::sender::SendOutcome;
use crate::transport::{ConnectionState, Link};
use crate::visual::{VisualFrame, VisualizationSink};

/// What happened on the network during one enabled tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkOutcome {
    /// No cached sender and the link is disconnected.
    Unavailable,
    /// The link reported connected but building a sender failed.
    AcquireFailed,
    /// Every contribution was dropped or cancelled out.
    NothingToSend,
    /// One datagram sent.
    Sent {
        /// Index/value pairs in the datagram.
        pairs: usize,
    },
    /// Transmission failed and the cached sender was dropped.
    SendFailed,
}

/// Result of [`Controller::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Pipeline disabled; nothing ran.
    Disabled,
    /// The tick ran to completion.
    Ran {
        /// Enabled ticks run so far, including this one.
        tick: u64,
        /// Network result of this tick.
        network: NetworkOutcome,
    },
}

/// Introspection for the sender side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PipelineStatus {
    /// Whether ticks run the pipeline.
    pub enabled: bool,
    /// Configured controller period in milliseconds.
    pub tick_interval_ms: u64,
    /// Link state at the time of the report.
    pub connection: ConnectionState,
    /// Enabled ticks run so far.
    pub ticks: u64,
    /// Datagrams sent.
    pub sends: u64,
    /// Failed acquisitions plus failed sends.
    pub failures: u64,
    /// A sender is cached for the next tick.
    pub sender_cached: bool,
    /// Senders built over the controller's lifetime.
    pub senders_constructed: u64,
}

/// Drives generator, sender and visualization on the sender's cadence.
pub struct Controller<G, L: Link, V> {
    generator: G,
    link: L,
    sink: V,
    slot: SenderSlot<L::Port>,
    enabled: bool,
    interval: Duration,
    ticks: u64,
    sends: u64,
    failures: u64,
    failing: bool,
}

impl<G, L, V> Controller<G, L, V>
where
    G: ModulationGenerator,
    L: Link,
    V: VisualizationSink,
{
    /// Build a controller with an empty sender cache.
    ///
    /// The enabled flag and tick period come from `config`.
    pub fn new(generator: G, link: L, sink: V, config: &PipelineConfig) -> Self {
        log::info!(
            "controller ready (interval {:?}, enabled {})",
            config.controller_interval,
            config.enabled_at_start
        );
        Self {
            generator,
            link,
            sink,
            slot: SenderSlot::new(),
            enabled: config.enabled_at_start,
            interval: config.controller_interval,
            ticks: 0,
            sends: 0,
            failures: 0,
            failing: false,
        }
    }

    /// Run one tick.
    pub fn tick(&mut self) -> TickOutcome {
        if !self.enabled {
            return TickOutcome::Disabled;
        }

        self.generator.advance();
        let snapshot = self.generator.snapshot();
        self.ticks += 1;

        let network = match self.slot.get_sender(&self.link) {
            Ok(None) => NetworkOutcome::Unavailable,
            Err(e) => {
                self.note_failure(format_args!("sender acquisition failed: {e}"));
                NetworkOutcome::AcquireFailed
            }
            Ok(Some(sender)) => match sender.send_offsets(&snapshot.contributions) {
                Ok(SendOutcome::Empty) => NetworkOutcome::NothingToSend,
                Ok(SendOutcome::Sent { pairs }) => {
                    self.sends += 1;
                    if self.failing {
                        log::info!("offset sending recovered");
                        self.failing = false;
                    }
                    NetworkOutcome::Sent { pairs }
                }
                Err(e) => {
                    self.slot.invalidate();
                    self.note_failure(format_args!("offset send failed: {e}"));
                    NetworkOutcome::SendFailed
                }
            },
        };

        self.sink.emit(&VisualFrame {
            tick: self.ticks,
            positions: &snapshot.positions,
            cells: &snapshot.cells,
        });

        log::trace!("controller tick {}: {network:?}", self.ticks);
        TickOutcome::Ran {
            tick: self.ticks,
            network,
        }
    }

    fn note_failure(&mut self, message: std::fmt::Arguments<'_>) {
        self.failures += 1;
        if self.failing {
            log::debug!("{message}");
        } else {
            log::warn!("{message}");
            self.failing = true;
        }
    }

    /// Enable or disable the pipeline.
    ///
    /// A disabled controller neither advances the generator nor sends or emits.
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled != enabled {
            log::info!("pipeline {}", if enabled { "enabled" } else { "disabled" });
        }
        self.enabled = enabled;
    }

    /// Whether ticks run the pipeline.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Configured tick period.
    pub fn tick_interval(&self) -> Duration {
        self.interval
    }

    /// The generator driven by this controller.
    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// The link senders are built from.
    pub fn link(&self) -> &L {
        &self.link
    }

    /// The visualization sink.
    pub fn sink(&self) -> &V {
        &self.sink
    }

    /// Introspection snapshot.
    pub fn status(&self) -> PipelineStatus {
        PipelineStatus {
            enabled: self.enabled,
            tick_interval_ms: self.interval.as_millis() as u64,
            connection: self.link.state(),
            ticks: self.ticks,
            sends: self.sends,
            failures: self.failures,
            sender_cached: self.slot.is_cached(),
            senders_constructed: self.slot.constructed(),
        }
    }
}
