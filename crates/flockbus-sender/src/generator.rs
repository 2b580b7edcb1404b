//! Modulation generator surface.

use serde::Serialize;

use crate::mapping::Contribution;

/// Agent position in grid space (`x` across columns, `y` across rows).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    /// Horizontal position, `0.0..COLUMN_COUNT`.
    pub x: f32,
    /// Vertical position, `0.0..ROW_COUNT`.
    pub y: f32,
}

/// Summed value of one occupied grid cell, for display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CellValue {
    /// Grid row.
    pub row: i32,
    /// Grid column.
    pub col: i32,
    /// Sum of the contributions landing on this cell.
    pub value: f32,
}

/// Everything one generator step produced, read from a single state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GeneratorSnapshot {
    /// Raw contributions for the sender.
    pub contributions: Vec<Contribution>,
    /// Agent positions, for display.
    pub positions: Vec<Position>,
    /// Occupied cells in row-major order, for display.
    pub cells: Vec<CellValue>,
}

/// An autonomous simulation that yields contributions once per step.
pub trait ModulationGenerator {
    /// Advance the simulation by one step.
    fn advance(&mut self);

    /// Read the current state.
    ///
    /// Must not change the state: two calls without an
    /// [`advance`](Self::advance) in between return equal snapshots.
    fn snapshot(&self) -> GeneratorSnapshot;
}

impl<G: ModulationGenerator + ?Sized> ModulationGenerator for Box<G> {
    fn advance(&mut self) {
        (**self).advance();
    }

    fn snapshot(&self) -> GeneratorSnapshot {
        (**self).snapshot()
    }
}
