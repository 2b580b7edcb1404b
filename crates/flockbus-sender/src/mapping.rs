//! Column mapping and aggregation of raw contributions.
//!
//! The generator works on a 2D grid of [`ROW_COUNT`] rows by
//! [`COLUMN_COUNT`] columns. Each column is one target, so the mapping is the
//! identity on the column and ignores the row. Contributions that land on
//! the same target are summed regardless of row.

use flockbus_core::{MappingError, OffsetFrame, TARGET_COUNT};
use serde::Serialize;

/// Rows in the generator grid.
pub const ROW_COUNT: i32 = 16;

/// Columns in the generator grid, one per target.
pub const COLUMN_COUNT: i32 = TARGET_COUNT as i32;

/// One raw contribution from the modulation generator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Contribution {
    /// Grid row, `0..ROW_COUNT`.
    pub row: i32,
    /// Grid column, `0..COLUMN_COUNT`.
    pub col: i32,
    /// Signed amount.
    pub value: f32,
}

impl Contribution {
    /// Create a contribution.
    pub const fn new(row: i32, col: i32, value: f32) -> Self {
        Self { row, col, value }
    }
}

/// Map a grid cell to a target index.
///
/// The column is the sole determinant: for every valid row the result is
/// `col`. Cells outside the grid are an error.
pub fn map_cell(row: i32, col: i32) -> Result<usize, MappingError> {
    if !(0..ROW_COUNT).contains(&row) {
        return Err(MappingError::RowOutOfRange(row));
    }
    if !(0..COLUMN_COUNT).contains(&col) {
        return Err(MappingError::ColumnOutOfRange(col));
    }
    Ok(col as usize)
}

/// Result of aggregating one batch of contributions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregation {
    /// Non-zero per-target sums, ascending by index.
    pub frame: OffsetFrame,
    /// Contributions dropped during validation.
    pub dropped: usize,
}

/// Validate, map and sum contributions per target.
///
/// Non-finite values, unmappable cells and mapped indices outside the target
/// range are dropped. Targets whose sum is zero are left out of the frame.
pub fn aggregate(contributions: &[Contribution]) -> Aggregation {
    let mut sums = [0.0f32; TARGET_COUNT];
    let mut dropped = 0;

    for contribution in contributions {
        if !contribution.value.is_finite() {
            log::debug!("dropped non-finite contribution {contribution:?}");
            dropped += 1;
            continue;
        }
        let index = match map_cell(contribution.row, contribution.col) {
            Ok(index) => index,
            Err(e) => {
                log::debug!("dropped contribution {contribution:?}: {e}");
                dropped += 1;
                continue;
            }
        };
        // Guards against a mapping change producing an index past the table
        if index >= TARGET_COUNT {
            log::debug!("dropped contribution {contribution:?}: mapped index {index} out of range");
            dropped += 1;
            continue;
        }
        sums[index] += contribution.value;
    }

    let mut pairs = Vec::new();
    for (index, &sum) in sums.iter().enumerate() {
        if sum == 0.0 {
            continue;
        }
        if !sum.is_finite() {
            log::debug!("dropped target #{index}: sum overflowed to {sum}");
            continue;
        }
        pairs.push((index as i32, sum));
    }

    let frame = match OffsetFrame::new(pairs) {
        Ok(frame) => frame,
        Err(e) => {
            // Unreachable with ascending in-range indices; send nothing rather than garbage
            log::error!("aggregation produced an invalid frame: {e}");
            OffsetFrame::default()
        }
    };

    Aggregation { frame, dropped }
}
