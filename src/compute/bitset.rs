//! Bit-per-cell board encoding and the in-place bitset stepper.
//!
//! Layout: `bytes_per_row = ceil(cols / 8)`. Bit `c` of row `r` lives at byte
//! `r * bytes_per_row + (c >> 3)`, bit position `c & 7`. Padding bits past
//! `cols` in the last byte of a row are always zero.

use std::sync::Arc;

#[cfg(not(target_arch = "wasm32"))]
use rayon::prelude::*;

use super::{Grid, GridError, Row, next_cell_state};

/// Boards with at least this many rows are stepped in parallel on native targets.
pub const PARALLEL_ROW_THRESHOLD: usize = 128;

/// Bytes needed to hold one row of `cols` cells.
#[inline]
pub fn bytes_per_row(cols: usize) -> usize {
    cols.div_ceil(8)
}

/// Packed length of a `rows x cols` board, or `TooLarge` if it overflows.
fn buffer_len(rows: usize, cols: usize) -> Result<usize, GridError> {
    rows.checked_mul(bytes_per_row(cols))
        .ok_or(GridError::TooLarge { rows, cols })
}

/// Mask of valid bits in the last byte of a row.
#[inline]
fn last_byte_mask(cols: usize) -> u8 {
    match cols & 7 {
        0 => 0xFF,
        n => (1u8 << n) - 1,
    }
}

/// Packed board state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitGrid {
    rows: usize,
    cols: usize,
    bytes_per_row: usize,
    bytes: Vec<u8>,
}

/// Result of one bitset step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepSummary {
    /// Rows containing at least one flipped cell.
    pub changed_rows: usize,
    /// Total flipped cells.
    pub changed_cells: usize,
}

impl StepSummary {
    #[inline]
    pub fn any_change(&self) -> bool {
        self.changed_cells > 0
    }
}

impl BitGrid {
    /// Create an all-dead bitset grid.
    pub fn new(rows: usize, cols: usize) -> Result<Self, GridError> {
        if rows == 0 {
            return Err(GridError::Empty);
        }
        if cols == 0 {
            return Err(GridError::ZeroColumns);
        }
        let bytes_per_row = bytes_per_row(cols);
        let len = buffer_len(rows, cols)?;
        Ok(Self {
            rows,
            cols,
            bytes_per_row,
            bytes: vec![0u8; len],
        })
    }

    /// All-dead grid with the same dimensions as `other`.
    pub fn zeroed_like(other: &BitGrid) -> Self {
        Self {
            rows: other.rows,
            cols: other.cols,
            bytes_per_row: other.bytes_per_row,
            bytes: vec![0u8; other.bytes.len()],
        }
    }

    /// Adopt a packed buffer, taking ownership of it.
    ///
    /// Padding bits are cleared so that row comparisons only see real cells.
    pub fn from_bytes(rows: usize, cols: usize, mut bytes: Vec<u8>) -> Result<Self, GridError> {
        if rows == 0 {
            return Err(GridError::Empty);
        }
        if cols == 0 {
            return Err(GridError::ZeroColumns);
        }
        let bpr = bytes_per_row(cols);
        let expected = buffer_len(rows, cols)?;
        if bytes.len() != expected {
            return Err(GridError::BufferLength {
                expected,
                found: bytes.len(),
            });
        }

        let mask = last_byte_mask(cols);
        if mask != 0xFF {
            for row in bytes.chunks_exact_mut(bpr) {
                row[bpr - 1] &= mask;
            }
        }

        Ok(Self {
            rows,
            cols,
            bytes_per_row: bpr,
            bytes,
        })
    }

    /// Pack a grid.
    pub fn encode(grid: &Grid) -> Self {
        let cols = grid.cols();
        let bpr = bytes_per_row(cols);
        let mut bytes = vec![0u8; grid.rows() * bpr];
        for (row, out) in grid.iter_rows().zip(bytes.chunks_exact_mut(bpr)) {
            pack_row(row, out);
        }
        Self {
            rows: grid.rows(),
            cols,
            bytes_per_row: bpr,
            bytes,
        }
    }

    /// Unpack into a grid.
    pub fn decode(&self) -> Grid {
        let rows = (0..self.rows).map(|r| self.decode_row(r)).collect();
        Grid::from_parts(rows, self.cols)
    }

    /// Unpack one row.
    pub fn decode_row(&self, row: usize) -> Row {
        Arc::new(unpack_row(self.row_bytes(row), self.cols))
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn bytes_per_row(&self) -> usize {
        self.bytes_per_row
    }

    #[inline]
    pub fn cell_count(&self) -> usize {
        self.rows.saturating_mul(self.cols)
    }

    /// Raw packed bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Give up the packed buffer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Packed bytes of one row.
    #[inline]
    pub fn row_bytes(&self, row: usize) -> &[u8] {
        let start = row * self.bytes_per_row;
        &self.bytes[start..start + self.bytes_per_row]
    }

    /// Overwrite one row from packed bytes. Padding is masked off.
    pub fn set_row_bytes(&mut self, row: usize, src: &[u8]) {
        let bpr = self.bytes_per_row;
        let start = row * bpr;
        let dst = &mut self.bytes[start..start + bpr];
        dst.copy_from_slice(src);
        dst[bpr - 1] &= last_byte_mask(self.cols);
    }

    /// True if `row` differs between `self` and `other`.
    #[inline]
    pub fn row_differs(&self, other: &BitGrid, row: usize) -> bool {
        self.row_bytes(row) != other.row_bytes(row)
    }

    /// Read a bit. Out-of-bounds reads as dead.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> bool {
        if row >= self.rows || col >= self.cols {
            return false;
        }
        (self.bytes[row * self.bytes_per_row + (col >> 3)] >> (col & 7)) & 1 == 1
    }

    /// Write a bit.
    pub fn set(&mut self, row: usize, col: usize, alive: bool) -> Result<(), GridError> {
        if row >= self.rows || col >= self.cols {
            return Err(GridError::OutOfBounds {
                row,
                col,
                rows: self.rows,
                cols: self.cols,
            });
        }
        let byte = &mut self.bytes[row * self.bytes_per_row + (col >> 3)];
        if alive {
            *byte |= 1 << (col & 7);
        } else {
            *byte &= !(1 << (col & 7));
        }
        Ok(())
    }

    /// Count live cells.
    pub fn population(&self) -> usize {
        self.bytes.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// Compute the next generation into `next`, which must have the same shape.
    ///
    /// Every byte of `next` is overwritten, so it may hold any previous state.
    pub fn step_into(&self, next: &mut BitGrid) -> StepSummary {
        assert_eq!(
            (self.rows, self.cols),
            (next.rows, next.cols),
            "bitset step requires matching shapes"
        );
        let bpr = self.bytes_per_row;

        #[cfg(not(target_arch = "wasm32"))]
        {
            if self.rows >= PARALLEL_ROW_THRESHOLD {
                return next
                    .bytes
                    .par_chunks_exact_mut(bpr)
                    .enumerate()
                    .map(|(r, out)| self.step_row(r, out))
                    .reduce(StepSummary::default, merge_summary);
            }
        }

        next.bytes
            .chunks_exact_mut(bpr)
            .enumerate()
            .map(|(r, out)| self.step_row(r, out))
            .fold(StepSummary::default(), merge_summary)
    }

    /// Step a single row into `out`; returns that row's contribution.
    fn step_row(&self, r: usize, out: &mut [u8]) -> StepSummary {
        out.fill(0);
        let above = r.checked_sub(1).map(|i| self.row_bytes(i));
        let below = (r + 1 < self.rows).then(|| self.row_bytes(r + 1));
        let at = self.row_bytes(r);
        let cols = self.cols;

        let mut flipped = 0usize;
        for c in 0..cols {
            let mut n = 0u8;
            for line in [above, below].into_iter().flatten() {
                if c > 0 {
                    n += bit(line, c - 1);
                }
                n += bit(line, c);
                if c + 1 < cols {
                    n += bit(line, c + 1);
                }
            }
            if c > 0 {
                n += bit(at, c - 1);
            }
            if c + 1 < cols {
                n += bit(at, c + 1);
            }

            let alive = bit(at, c) == 1;
            let next_alive = next_cell_state(alive, n);
            if next_alive {
                out[c >> 3] |= 1 << (c & 7);
            }
            flipped += (next_alive != alive) as usize;
        }

        StepSummary {
            changed_rows: (flipped > 0) as usize,
            changed_cells: flipped,
        }
    }
}

#[inline]
fn bit(row: &[u8], col: usize) -> u8 {
    (row[col >> 3] >> (col & 7)) & 1
}

fn merge_summary(a: StepSummary, b: StepSummary) -> StepSummary {
    StepSummary {
        changed_rows: a.changed_rows + b.changed_rows,
        changed_cells: a.changed_cells + b.changed_cells,
    }
}

/// Pack boolean cells into `out` (which must be zeroed and `ceil(len/8)` long).
pub fn pack_row(cells: &[bool], out: &mut [u8]) {
    for (c, _) in cells.iter().enumerate().filter(|(_, alive)| **alive) {
        out[c >> 3] |= 1 << (c & 7);
    }
}

/// Unpack the first `cols` bits of a packed row, ignoring padding.
pub fn unpack_row(bytes: &[u8], cols: usize) -> Vec<bool> {
    (0..cols).map(|c| bit(bytes, c) == 1).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::transition::tests::{arb_cells, reference_step};
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_encode_decode_roundtrip(cells in arb_cells()) {
            let grid = Grid::from_rows(cells).unwrap();
            let bits = BitGrid::encode(&grid);
            prop_assert_eq!(bits.as_bytes().len(), grid.rows() * bytes_per_row(grid.cols()));
            prop_assert_eq!(bits.decode(), grid);
        }

        #[test]
        fn prop_step_matches_reference(cells in arb_cells()) {
            let expected = reference_step(&cells);
            let changed_rows = cells.iter().zip(&expected).filter(|(a, b)| a != b).count();
            let bits = BitGrid::encode(&Grid::from_rows(cells).unwrap());
            let mut next = BitGrid::zeroed_like(&bits);
            let summary = bits.step_into(&mut next);
            prop_assert_eq!(next.decode().to_vecs(), expected);
            prop_assert_eq!(summary.changed_rows, changed_rows);
        }
    }

    #[test]
    fn test_layout_matches_bit_addressing() {
        let mut grid = Grid::new(2, 11).unwrap();
        grid.set(0, 0, true).unwrap();
        grid.set(0, 9, true).unwrap();
        grid.set(1, 7, true).unwrap();
        grid.set(1, 10, true).unwrap();

        let bits = BitGrid::encode(&grid);
        assert_eq!(bits.bytes_per_row(), 2);
        assert_eq!(bits.as_bytes(), &[0b0000_0001, 0b0000_0010, 0b1000_0000, 0b0000_0100]);
        assert!(bits.get(1, 10));
        assert!(!bits.get(1, 11));
    }

    #[test]
    fn test_decode_ignores_padding() {
        // 3 columns use bits 0..3; the high bits are padding.
        let bits = BitGrid::from_bytes(2, 3, vec![0b1111_1010, 0b1111_1000]).unwrap();
        assert_eq!(bits.as_bytes(), &[0b0000_0010, 0b0000_0000]);
        assert_eq!(
            bits.decode().to_vecs(),
            vec![vec![false, true, false], vec![false, false, false]]
        );
    }

    #[test]
    fn test_from_bytes_rejects_bad_length() {
        assert_eq!(
            BitGrid::from_bytes(3, 9, vec![0; 5]).unwrap_err(),
            GridError::BufferLength {
                expected: 6,
                found: 5
            }
        );
        assert_eq!(
            BitGrid::from_bytes(0, 9, vec![]).unwrap_err(),
            GridError::Empty
        );
    }

    #[test]
    fn test_overflowing_dimensions_rejected() {
        let rows = (1usize << (usize::BITS - 1)) + 1;
        assert_eq!(
            BitGrid::from_bytes(rows, 9, vec![0; 2]).unwrap_err(),
            GridError::TooLarge { rows, cols: 9 }
        );
        assert_eq!(
            BitGrid::new(usize::MAX, 16).unwrap_err(),
            GridError::TooLarge {
                rows: usize::MAX,
                cols: 16
            }
        );
    }

    #[test]
    fn test_step_overwrites_stale_next_buffer() {
        let bits = BitGrid::new(4, 4).unwrap();
        let mut next = BitGrid::from_bytes(4, 4, vec![0x0F; 4]).unwrap();
        let summary = bits.step_into(&mut next);
        assert!(!summary.any_change());
        assert_eq!(next.population(), 0);
    }

    #[test]
    fn test_parallel_path_matches_sequential() {
        let rows = PARALLEL_ROW_THRESHOLD + 3;
        let cells: Vec<Vec<bool>> = (0..rows)
            .map(|r| (0..37).map(|c| (r * 7 + c * 3) % 5 == 0).collect())
            .collect();
        let expected = reference_step(&cells);
        let bits = BitGrid::encode(&Grid::from_rows(cells).unwrap());
        let mut next = BitGrid::zeroed_like(&bits);
        bits.step_into(&mut next);
        assert_eq!(next.decode().to_vecs(), expected);
    }
}
