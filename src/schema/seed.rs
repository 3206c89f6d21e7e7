//! Seed types for initializing a board.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::compute::{Grid, GridError};

/// Complete seed specification for board initialization.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Seed {
    /// Pattern to use for seeding.
    pub pattern: Pattern,
}

/// Predefined patterns for initialization.
///
/// Shaped patterns are centered on the board. Cells that fall outside the
/// board are skipped.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Pattern {
    /// All cells dead.
    #[default]
    Empty,
    /// 2x2 still life.
    Block,
    /// Period-2 oscillator, horizontal phase.
    Blinker,
    /// Glider heading down and to the right.
    Glider,
    /// Each cell alive with probability `density`.
    Random {
        density: f64,
        /// Fixed seed for reproducible boards; entropy when absent.
        #[serde(default)]
        seed: Option<u64>,
    },
    /// Explicit live cells as `(row, col)`.
    Cells { cells: Vec<(usize, usize)> },
}

const BLOCK: &[(usize, usize)] = &[(0, 0), (0, 1), (1, 0), (1, 1)];
const BLINKER: &[(usize, usize)] = &[(0, 0), (0, 1), (0, 2)];
const GLIDER: &[(usize, usize)] = &[(0, 1), (1, 2), (2, 0), (2, 1), (2, 2)];

impl Seed {
    pub fn new(pattern: Pattern) -> Self {
        Self { pattern }
    }

    /// Generate a `rows x cols` board from this seed.
    pub fn generate(&self, rows: usize, cols: usize) -> Result<Grid, GridError> {
        let mut grid = Grid::new(rows, cols)?;

        match &self.pattern {
            Pattern::Empty => {}
            Pattern::Block => stamp_centered(&mut grid, BLOCK, (2, 2))?,
            Pattern::Blinker => stamp_centered(&mut grid, BLINKER, (1, 3))?,
            Pattern::Glider => stamp_centered(&mut grid, GLIDER, (3, 3))?,
            Pattern::Random { density, seed } => {
                let mut rng = match seed {
                    Some(seed) => StdRng::seed_from_u64(*seed),
                    None => StdRng::from_entropy(),
                };
                let density = if density.is_nan() {
                    0.0
                } else {
                    density.clamp(0.0, 1.0)
                };
                for r in 0..rows {
                    for c in 0..cols {
                        if rng.gen_bool(density) {
                            grid.set(r, c, true)?;
                        }
                    }
                }
            }
            Pattern::Cells { cells } => {
                for &(r, c) in cells {
                    if r < rows && c < cols {
                        grid.set(r, c, true)?;
                    }
                }
            }
        }

        Ok(grid)
    }
}

/// Off-board cells of a shape larger than the board are dropped.
fn stamp_centered(
    grid: &mut Grid,
    shape: &[(usize, usize)],
    extent: (usize, usize),
) -> Result<(), GridError> {
    let top = grid.rows().saturating_sub(extent.0) / 2;
    let left = grid.cols().saturating_sub(extent.1) / 2;
    for &(dr, dc) in shape {
        let (r, c) = (top + dr, left + dc);
        if r < grid.rows() && c < grid.cols() {
            grid.set(r, c, true)?;
        }
    }
    Ok(())
}
