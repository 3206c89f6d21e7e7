//! Message contract between a host and a background simulation scheduler.
//!
//! ```text
//! Host -> Scheduler:
//!   init:        { type: "init", rows, cols, buffer, baseInterval, speed }
//!   updateSpeed: { type: "updateSpeed", speed }
//!   stop:        { type: "stop" }
//!
//! Scheduler -> Host:
//!   patch:       { type: "patch", rows, data, bytesPerRow, cols }
//!   stabilized:  { type: "stabilized" }
//! ```
//!
//! `buffer` and `data` are packed bitsets (see [`crate::compute::BitGrid`]).
//! Messages own their buffers; sending one moves the bytes to the receiver.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::compute::{BitGrid, Grid, GridError, unpack_row};

/// Host -> Scheduler messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HostMessage {
    /// Start (or restart) a run from a packed board.
    Init {
        rows: usize,
        cols: usize,
        buffer: Vec<u8>,
        /// Reference tick period in milliseconds.
        #[serde(rename = "baseInterval")]
        base_interval: f64,
        speed: f64,
    },
    /// Change the speed multiplier of the current run.
    UpdateSpeed { speed: f64 },
    /// Halt the current run.
    Stop,
}

/// Scheduler -> Host messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WorkerMessage {
    /// Rows that changed in one generation.
    Patch(RowPatch),
    /// The board stopped changing; the run has ended.
    Stabilized,
}

/// Changed rows of one generation, packed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowPatch {
    /// Changed row indices, ascending.
    #[serde(rename = "rows")]
    pub row_indices: Vec<u32>,
    /// `row_indices.len() * bytes_per_row` bytes, one packed row per index.
    #[serde(rename = "data")]
    pub packed_row_bytes: Vec<u8>,
    #[serde(rename = "bytesPerRow")]
    pub bytes_per_row: usize,
    pub cols: usize,
}

impl RowPatch {
    /// Collect rows of `next` whose bytes differ from `prev`.
    ///
    /// Returns `None` when nothing differs.
    pub fn diff(prev: &BitGrid, next: &BitGrid) -> Option<Self> {
        let row_indices: Vec<u32> = (0..next.rows())
            .filter(|&r| prev.row_differs(next, r))
            .map(|r| r as u32)
            .collect();
        if row_indices.is_empty() {
            return None;
        }
        Some(Self::from_rows(next, row_indices))
    }

    /// Every row of `grid`.
    pub fn full(grid: &BitGrid) -> Self {
        Self::from_rows(grid, (0..grid.rows() as u32).collect())
    }

    fn from_rows(grid: &BitGrid, row_indices: Vec<u32>) -> Self {
        let bpr = grid.bytes_per_row();
        let mut packed_row_bytes = Vec::with_capacity(row_indices.len() * bpr);
        for &r in &row_indices {
            packed_row_bytes.extend_from_slice(grid.row_bytes(r as usize));
        }
        Self {
            row_indices,
            packed_row_bytes,
            bytes_per_row: bpr,
            cols: grid.cols(),
        }
    }

    /// Number of rows carried.
    pub fn len(&self) -> usize {
        self.row_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_indices.is_empty()
    }

    /// Iterate `(row_index, packed_bytes)` pairs.
    pub fn rows(&self) -> impl Iterator<Item = (usize, &[u8])> {
        self.row_indices
            .iter()
            .zip(self.packed_row_bytes.chunks_exact(self.bytes_per_row.max(1)))
            .map(|(&r, bytes)| (r as usize, bytes))
    }

    /// Check the patch fits a board of `rows × cols`.
    pub fn validate_for(&self, rows: usize, cols: usize) -> Result<(), GridError> {
        let bpr = crate::compute::bytes_per_row(cols);
        if self.cols != cols || self.bytes_per_row != bpr {
            return Err(GridError::PatchMismatch {
                patch_cols: self.cols,
                patch_bytes_per_row: self.bytes_per_row,
                cols,
            });
        }
        let expected = self.row_indices.len() * bpr;
        if self.packed_row_bytes.len() != expected {
            return Err(GridError::BufferLength {
                expected,
                found: self.packed_row_bytes.len(),
            });
        }
        if let Some(&r) = self.row_indices.iter().find(|&&r| r as usize >= rows) {
            return Err(GridError::OutOfBounds {
                row: r as usize,
                col: 0,
                rows,
                cols,
            });
        }
        Ok(())
    }

    /// Replace the listed rows of `grid`; unlisted rows are left untouched.
    ///
    /// The patch is validated first, so on error `grid` is unchanged.
    pub fn apply_to(&self, grid: &mut Grid) -> Result<(), GridError> {
        self.validate_for(grid.rows(), grid.cols())?;
        for (r, bytes) in self.rows() {
            grid.replace_row(r, Arc::new(unpack_row(bytes, self.cols)))?;
        }
        Ok(())
    }

    /// Replace the listed rows of a packed board.
    pub fn apply_to_bits(&self, bits: &mut BitGrid) -> Result<(), GridError> {
        self.validate_for(bits.rows(), bits.cols())?;
        for (r, bytes) in self.rows() {
            bits.set_row_bytes(r, bytes);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::transition::tests::{arb_cells, reference_step};
    use proptest::prelude::*;

    #[test]
    fn test_host_message_wire_shape() {
        let init = HostMessage::Init {
            rows: 2,
            cols: 3,
            buffer: vec![1, 4],
            base_interval: 200.0,
            speed: 2.0,
        };
        let json = serde_json::to_value(&init).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "init",
                "rows": 2,
                "cols": 3,
                "buffer": [1, 4],
                "baseInterval": 200.0,
                "speed": 2.0
            })
        );

        let speed: HostMessage =
            serde_json::from_str(r#"{"type":"updateSpeed","speed":20}"#).unwrap();
        assert_eq!(speed, HostMessage::UpdateSpeed { speed: 20.0 });
        let stop: HostMessage = serde_json::from_str(r#"{"type":"stop"}"#).unwrap();
        assert_eq!(stop, HostMessage::Stop);
    }

    #[test]
    fn test_worker_message_wire_shape() {
        let patch = WorkerMessage::Patch(RowPatch {
            row_indices: vec![0, 2],
            packed_row_bytes: vec![7, 1],
            bytes_per_row: 1,
            cols: 3,
        });
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            serde_json::json!({
                "type": "patch",
                "rows": [0, 2],
                "data": [7, 1],
                "bytesPerRow": 1,
                "cols": 3
            })
        );
        assert_eq!(
            serde_json::to_string(&WorkerMessage::Stabilized).unwrap(),
            r#"{"type":"stabilized"}"#
        );
    }

    #[test]
    fn test_diff_lists_exactly_changed_rows() {
        let prev = BitGrid::encode(&Grid::from_strings(&["#..", "...", ".#.", "..#"]).unwrap());
        let next = BitGrid::encode(&Grid::from_strings(&["#..", "#..", ".#.", "..."]).unwrap());
        let patch = RowPatch::diff(&prev, &next).unwrap();
        assert_eq!(patch.row_indices, vec![1, 3]);
        assert_eq!(patch.packed_row_bytes, vec![0b001, 0b000]);
        assert!(RowPatch::diff(&prev, &prev).is_none());
    }

    proptest! {
        #[test]
        fn prop_diff_lists_exactly_differing_rows(cells in arb_cells()) {
            let stepped = reference_step(&cells);
            let expected: Vec<u32> = (0..cells.len())
                .filter(|&r| cells[r] != stepped[r])
                .map(|r| r as u32)
                .collect();
            let prev = BitGrid::encode(&Grid::from_rows(cells).unwrap());
            let next = BitGrid::encode(&Grid::from_rows(stepped).unwrap());

            match RowPatch::diff(&prev, &next) {
                None => prop_assert!(expected.is_empty()),
                Some(patch) => {
                    let packed: Vec<u8> = expected
                        .iter()
                        .flat_map(|&r| next.row_bytes(r as usize).iter().copied())
                        .collect();
                    prop_assert_eq!(&patch.row_indices, &expected);
                    prop_assert_eq!(&patch.packed_row_bytes, &packed);

                    let mut merged = prev.clone();
                    patch.apply_to_bits(&mut merged).unwrap();
                    prop_assert_eq!(merged, next);
                }
            }
        }
    }

    #[test]
    fn test_apply_replaces_only_listed_rows() {
        let mut grid = Grid::from_strings(&["#..", "...", ".#."]).unwrap();
        let before = grid.clone();
        let patch = RowPatch {
            row_indices: vec![1],
            packed_row_bytes: vec![0b110],
            bytes_per_row: 1,
            cols: 3,
        };
        patch.apply_to(&mut grid).unwrap();

        assert_eq!(grid, Grid::from_strings(&["#..", ".##", ".#."]).unwrap());
        assert!(Arc::ptr_eq(before.row(0), grid.row(0)));
        assert!(Arc::ptr_eq(before.row(2), grid.row(2)));
    }

    #[test]
    fn test_apply_rejects_mismatched_patch_without_mutation() {
        let mut grid = Grid::from_strings(&["#..", "..."]).unwrap();
        let before = grid.clone();

        let wrong_cols = RowPatch {
            row_indices: vec![0],
            packed_row_bytes: vec![0],
            bytes_per_row: 1,
            cols: 9,
        };
        assert!(matches!(
            wrong_cols.apply_to(&mut grid),
            Err(GridError::PatchMismatch { .. })
        ));

        let out_of_range = RowPatch {
            row_indices: vec![1, 5],
            packed_row_bytes: vec![1, 1],
            bytes_per_row: 1,
            cols: 3,
        };
        assert!(matches!(
            out_of_range.apply_to(&mut grid),
            Err(GridError::OutOfBounds { row: 5, .. })
        ));
        assert!(grid.ptr_eq(&before));
    }
}
