//! Visualization output.
//!
//! Frames go out from the controller only, once per enabled tick.

use crate::generator::{CellValue, Position};

/// One tick's worth of display data.
#[derive(Debug, Clone, Copy)]
pub struct VisualFrame<'a> {
    /// Controller tick that produced the frame.
    pub tick: u64,
    /// Agent positions from the tick's snapshot.
    pub positions: &'a [Position],
    /// Occupied cells from the tick's snapshot.
    pub cells: &'a [CellValue],
}

/// Receiver of visualization frames.
pub trait VisualizationSink {
    /// Consume one frame. Called once per enabled controller tick.
    fn emit(&mut self, frame: &VisualFrame<'_>);
}

/// Discards every frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl VisualizationSink for NullSink {
    fn emit(&mut self, _frame: &VisualFrame<'_>) {}
}

/// Owned copy of a [`VisualFrame`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedFrame {
    /// Controller tick that produced the frame.
    pub tick: u64,
    /// Agent positions.
    pub positions: Vec<Position>,
    /// Occupied cells.
    pub cells: Vec<CellValue>,
}

/// Keeps every frame it receives.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    frames: Vec<RecordedFrame>,
}

impl RecordingSink {
    /// An empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames received so far, oldest first.
    pub fn frames(&self) -> &[RecordedFrame] {
        &self.frames
    }
}

impl VisualizationSink for RecordingSink {
    fn emit(&mut self, frame: &VisualFrame<'_>) {
        self.frames.push(RecordedFrame {
            tick: frame.tick,
            positions: frame.positions.to_vec(),
            cells: frame.cells.to_vec(),
        });
    }
}
