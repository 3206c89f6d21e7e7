//! Grid model - rectangular boolean board with shareable rows.
//!
//! Rows are reference counted so a transition can hand unchanged rows to the
//! next generation without copying them. Writes go through `Arc::make_mut`,
//! which clones a row only if another generation still holds it.

use std::sync::Arc;

/// A single row of cells.
pub type Row = Arc<Vec<bool>>;

/// Rectangular Game of Life board.
///
/// Cloning is cheap: it shares the row table with the original until either
/// side is written to.
#[derive(Debug, Clone)]
pub struct Grid {
    rows: Arc<Vec<Row>>,
    cols: usize,
}

impl Grid {
    /// Create an all-dead grid of `rows × cols`.
    pub fn new(rows: usize, cols: usize) -> Result<Self, GridError> {
        check_dimensions(rows, cols)?;
        let row: Row = Arc::new(vec![false; cols]);
        // Every row starts as the same allocation; the first write to a row detaches it.
        Ok(Self {
            rows: Arc::new(vec![row; rows]),
            cols,
        })
    }

    /// Build a grid from nested vectors, rejecting ragged or empty input.
    pub fn from_rows(rows: Vec<Vec<bool>>) -> Result<Self, GridError> {
        let cols = rows.first().map(Vec::len).ok_or(GridError::Empty)?;
        check_dimensions(rows.len(), cols)?;
        for (row, cells) in rows.iter().enumerate() {
            if cells.len() != cols {
                return Err(GridError::Ragged {
                    row,
                    expected: cols,
                    found: cells.len(),
                });
            }
        }

        Ok(Self {
            rows: Arc::new(rows.into_iter().map(Arc::new).collect()),
            cols,
        })
    }

    /// Construct from parts that are known to be rectangular.
    pub(crate) fn from_parts(rows: Vec<Row>, cols: usize) -> Self {
        debug_assert!(!rows.is_empty() && cols > 0);
        debug_assert!(rows.iter().all(|r| r.len() == cols));
        Self {
            rows: Arc::new(rows),
            cols,
        }
    }

    /// Parse a grid from text rows using `#`/`O` for alive and `.` for dead.
    pub fn from_strings(lines: &[&str]) -> Result<Self, GridError> {
        Self::from_rows(
            lines
                .iter()
                .map(|line| line.chars().map(|c| c == '#' || c == 'O').collect())
                .collect(),
        )
    }

    /// Number of rows.
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns.
    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Get total cell count (rows * cols).
    #[inline]
    pub fn cell_count(&self) -> usize {
        self.rows.len() * self.cols
    }

    /// Get cell state. Out-of-bounds coordinates read as dead.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> bool {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .copied()
            .unwrap_or(false)
    }

    /// Set cell state.
    pub fn set(&mut self, row: usize, col: usize, alive: bool) -> Result<(), GridError> {
        self.check_bounds(row, col)?;
        if self.rows[row][col] != alive {
            let rows = Arc::make_mut(&mut self.rows);
            Arc::make_mut(&mut rows[row])[col] = alive;
        }
        Ok(())
    }

    /// Flip a cell, returning its new state.
    pub fn toggle(&mut self, row: usize, col: usize) -> Result<bool, GridError> {
        self.check_bounds(row, col)?;
        let alive = !self.rows[row][col];
        let rows = Arc::make_mut(&mut self.rows);
        Arc::make_mut(&mut rows[row])[col] = alive;
        Ok(alive)
    }

    /// Shared handle to a row.
    #[inline]
    pub fn row(&self, row: usize) -> &Row {
        &self.rows[row]
    }

    /// Iterate over rows.
    pub fn iter_rows(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter()
    }

    /// Replace a whole row. The row width must match.
    pub fn replace_row(&mut self, row: usize, cells: Row) -> Result<(), GridError> {
        if row >= self.rows.len() {
            return Err(GridError::OutOfBounds {
                row,
                col: 0,
                rows: self.rows.len(),
                cols: self.cols,
            });
        }
        if cells.len() != self.cols {
            return Err(GridError::Ragged {
                row,
                expected: self.cols,
                found: cells.len(),
            });
        }
        Arc::make_mut(&mut self.rows)[row] = cells;
        Ok(())
    }

    /// Count live cells.
    pub fn population(&self) -> usize {
        self.rows
            .iter()
            .map(|r| r.iter().filter(|&&c| c).count())
            .sum()
    }

    /// True when both handles point at the same row table.
    ///
    /// Renderers use this to skip redraws after a generation that changed nothing.
    #[inline]
    pub fn ptr_eq(&self, other: &Grid) -> bool {
        Arc::ptr_eq(&self.rows, &other.rows)
    }

    /// Return a copy resized to `rows × cols`, keeping the overlapping region.
    pub fn resized(&self, rows: usize, cols: usize) -> Result<Self, GridError> {
        check_dimensions(rows, cols)?;
        let resized = (0..rows)
            .map(|r| {
                let mut cells = vec![false; cols];
                if let Some(src) = self.rows.get(r) {
                    let keep = cols.min(self.cols);
                    cells[..keep].copy_from_slice(&src[..keep]);
                }
                Arc::new(cells)
            })
            .collect();
        Ok(Self::from_parts(resized, cols))
    }

    /// Kill every cell.
    pub fn clear(&mut self) {
        let row: Row = Arc::new(vec![false; self.cols]);
        self.rows = Arc::new(vec![row; self.rows.len()]);
    }

    /// Copy out as nested vectors.
    pub fn to_vecs(&self) -> Vec<Vec<bool>> {
        self.rows.iter().map(|r| r.as_ref().clone()).collect()
    }

    fn check_bounds(&self, row: usize, col: usize) -> Result<(), GridError> {
        if row >= self.rows.len() || col >= self.cols {
            return Err(GridError::OutOfBounds {
                row,
                col,
                rows: self.rows.len(),
                cols: self.cols,
            });
        }
        Ok(())
    }
}

impl PartialEq for Grid {
    fn eq(&self, other: &Self) -> bool {
        self.cols == other.cols
            && self.rows.len() == other.rows.len()
            && self
                .rows
                .iter()
                .zip(other.rows.iter())
                .all(|(a, b)| Arc::ptr_eq(a, b) || a == b)
    }
}

impl Eq for Grid {}

fn check_dimensions(rows: usize, cols: usize) -> Result<(), GridError> {
    if rows == 0 {
        return Err(GridError::Empty);
    }
    if cols == 0 {
        return Err(GridError::ZeroColumns);
    }
    Ok(())
}

/// Grid shape and addressing errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("Grid must have at least one row")]
    Empty,
    #[error("Grid must have at least one column")]
    ZeroColumns,
    #[error("Row {row} has {found} cells, expected {expected}")]
    Ragged {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("A {rows}x{cols} grid does not fit in memory")]
    TooLarge { rows: usize, cols: usize },
    #[error("Bitset buffer holds {found} bytes, expected {expected}")]
    BufferLength { expected: usize, found: usize },
    #[error("Cell ({row}, {col}) is outside the {rows}x{cols} grid")]
    OutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },
    #[error("Patch for {patch_cols} columns ({patch_bytes_per_row} bytes/row) does not fit a grid of {cols} columns")]
    PatchMismatch {
        patch_cols: usize,
        patch_bytes_per_row: usize,
        cols: usize,
    },
}
