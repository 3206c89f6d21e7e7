//! Pointer-to-cell mapping for board editing.

use serde::{Deserialize, Serialize};

use crate::compute::{Grid, GridError};

/// Side length of one cell in canvas pixels when none is configured.
pub const DEFAULT_CELL_SIZE: f64 = 10.0;

/// What a pointer stroke does to the cells it touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditMode {
    /// Set cells alive.
    #[default]
    Draw,
    /// Set cells dead.
    Erase,
    /// Flip cells.
    Toggle,
}

impl EditMode {
    /// Apply this mode to one cell, returning its new state.
    pub fn apply(self, grid: &mut Grid, row: usize, col: usize) -> Result<bool, GridError> {
        match self {
            EditMode::Draw => grid.set(row, col, true).map(|()| true),
            EditMode::Erase => grid.set(row, col, false).map(|()| false),
            EditMode::Toggle => grid.toggle(row, col),
        }
    }
}

/// On-screen rectangle of the rendered board, in display units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DisplayRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// Maps display coordinates to board cells.
///
/// The canvas may be drawn at a different resolution than it is displayed,
/// so coordinates are scaled by `canvas / display` before dividing by the
/// cell size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellLocator {
    pub rect: DisplayRect,
    pub canvas_width: f64,
    pub canvas_height: f64,
    pub cell_size: f64,
}

impl CellLocator {
    /// Locator for a canvas sized exactly to `rows x cols` cells.
    pub fn for_board(rect: DisplayRect, rows: usize, cols: usize, cell_size: f64) -> Self {
        Self {
            rect,
            canvas_width: cols as f64 * cell_size,
            canvas_height: rows as f64 * cell_size,
            cell_size,
        }
    }

    /// The `(row, col)` under a pointer, or `None` when it is off the board.
    pub fn locate(&self, x: f64, y: f64, rows: usize, cols: usize) -> Option<(usize, usize)> {
        if self.rect.width <= 0.0 || self.rect.height <= 0.0 || self.cell_size <= 0.0 {
            return None;
        }
        let scale_x = self.canvas_width / self.rect.width;
        let scale_y = self.canvas_height / self.rect.height;
        let col = ((x - self.rect.left) * scale_x / self.cell_size).floor();
        let row = ((y - self.rect.top) * scale_y / self.cell_size).floor();

        // Negative and NaN coordinates both fail these checks.
        if !(row >= 0.0 && col >= 0.0) {
            return None;
        }
        let (row, col) = (row as usize, col as usize);
        (row < rows && col < cols).then_some((row, col))
    }
}

/// Board dimensions that fit a `width x height` area at `cell_size`.
/// Never smaller than 1x1.
pub fn fit_dimensions(width: f64, height: f64, cell_size: f64) -> (usize, usize) {
    let fit = |extent: f64| {
        let cells = (extent / cell_size).floor();
        if cells.is_finite() && cells >= 1.0 {
            cells as usize
        } else {
            1
        }
    };
    (fit(height), fit(width))
}
