//! Transition functions for Conway's Game of Life.
//!
//! Neighborhoods are the 8-connected Moore neighborhood with dead cells
//! beyond the border (no wraparound). Every variant here and the bitset
//! stepper in [`super::bitset`] produce identical generations.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{BitGrid, Grid, Row};

/// Apply Conway's rule to one cell.
#[inline]
pub fn next_cell_state(alive: bool, live_neighbors: u8) -> bool {
    matches!((alive, live_neighbors), (true, 2) | (true, 3) | (false, 3))
}

/// Which transition implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// Fresh grid and fresh rows every generation.
    Baseline,
    /// Reuse unchanged rows, and the whole grid when nothing changed.
    #[default]
    RowSharing,
    /// Encode to a bitset, step, decode.
    Bitset,
}

/// Count live neighbors of `(row, col)` given the rows above, at, and below.
#[inline]
fn count_neighbors(above: Option<&[bool]>, at: &[bool], below: Option<&[bool]>, col: usize) -> u8 {
    let cols = at.len();
    let left = col.checked_sub(1);
    let right = (col + 1 < cols).then_some(col + 1);

    let mut n = 0u8;
    for line in [above, below].into_iter().flatten() {
        n += left.is_some_and(|c| line[c]) as u8;
        n += line[col] as u8;
        n += right.is_some_and(|c| line[c]) as u8;
    }
    n += left.is_some_and(|c| at[c]) as u8;
    n += right.is_some_and(|c| at[c]) as u8;
    n
}

/// Baseline transition: allocates the whole next grid.
pub fn next_generation(grid: &Grid) -> Grid {
    let rows = grid.rows();
    let next: Vec<Row> = (0..rows)
        .map(|r| {
            let above = r.checked_sub(1).map(|i| grid.row(i).as_slice());
            let below = (r + 1 < rows).then(|| grid.row(r + 1).as_slice());
            let at = grid.row(r).as_slice();
            Arc::new(
                (0..grid.cols())
                    .map(|c| next_cell_state(at[c], count_neighbors(above, at, below, c)))
                    .collect(),
            )
        })
        .collect();

    Grid::from_parts(next, grid.cols())
}

/// Row-sharing transition.
///
/// A row is cloned only when one of its cells flips; all other rows are the
/// same `Arc` as in `grid`. When no cell flips anywhere the input handle
/// itself is returned, so `result.ptr_eq(grid)` holds.
pub fn next_generation_shared(grid: &Grid) -> Grid {
    let rows = grid.rows();
    let mut any_change = false;
    let mut next: Vec<Row> = Vec::with_capacity(rows);

    for r in 0..rows {
        let row = grid.row(r);
        let above = r.checked_sub(1).map(|i| grid.row(i).as_slice());
        let below = (r + 1 < rows).then(|| grid.row(r + 1).as_slice());

        // Cloned lazily on the first flip in this row.
        let mut changed: Option<Vec<bool>> = None;
        for c in 0..grid.cols() {
            let alive = row[c];
            let next_alive = next_cell_state(alive, count_neighbors(above, row, below, c));
            if next_alive != alive {
                changed.get_or_insert_with(|| row.as_ref().clone())[c] = next_alive;
            }
        }

        match changed {
            Some(cells) => {
                any_change = true;
                next.push(Arc::new(cells));
            }
            None => next.push(Arc::clone(row)),
        }
    }

    if any_change {
        Grid::from_parts(next, grid.cols())
    } else {
        grid.clone()
    }
}

/// Bitset transition on a nested grid (encode, step, decode).
pub fn next_generation_bitset(grid: &Grid) -> Grid {
    let current = BitGrid::encode(grid);
    let mut next = BitGrid::zeroed_like(&current);
    current.step_into(&mut next);
    next.decode()
}

impl Grid {
    /// Advance one generation with the chosen implementation.
    pub fn step_with(&self, kind: TransitionKind) -> Grid {
        match kind {
            TransitionKind::Baseline => next_generation(self),
            TransitionKind::RowSharing => next_generation_shared(self),
            TransitionKind::Bitset => next_generation_bitset(self),
        }
    }
}
