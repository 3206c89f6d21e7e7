//! Stabilization detection.
//!
//! A board is considered settled after a run of generations that changed
//! nothing. The run length scales with board size and shrinks for boards
//! whose last activity was sparse.

/// Lower bound of the no-change run length.
pub const MIN_THRESHOLD: u32 = 3;
/// Upper bound of the no-change run length.
pub const MAX_THRESHOLD: u32 = 30;
/// Changed-row fraction below which activity counts as sparse.
pub const SPARSE_DENSITY: f64 = 0.02;
/// Reduction applied to the threshold for sparse boards.
pub const SPARSE_REDUCTION: u32 = 2;

/// `clamp(round(log2(total_cells + 1)), 3, 30)`.
pub fn base_threshold(total_cells: usize) -> u32 {
    let raw = ((total_cells as f64) + 1.0).log2().round() as u32;
    raw.clamp(MIN_THRESHOLD, MAX_THRESHOLD)
}

/// Threshold after the density adjustment.
pub fn adaptive_threshold(total_cells: usize, changed_row_fraction: f64) -> u32 {
    let base = base_threshold(total_cells);
    if changed_row_fraction < SPARSE_DENSITY {
        base.saturating_sub(SPARSE_REDUCTION).max(MIN_THRESHOLD)
    } else {
        base
    }
}

/// What a generation meant for stability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stability {
    /// At least one cell changed.
    Changed,
    /// Nothing changed; `quiet` consecutive quiet generations so far.
    Quiet { quiet: u32, threshold: u32 },
    /// The quiet run reached the threshold.
    Stabilized,
}

/// Tracks consecutive quiet generations for one board.
#[derive(Debug, Clone)]
pub struct StabilizationTracker {
    rows: usize,
    total_cells: usize,
    quiet: u32,
    /// Changed-row fraction of the most recent changing generation.
    ///
    /// Starts at zero: a board that has never changed is treated as sparse.
    last_density: f64,
}

impl StabilizationTracker {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            total_cells: rows.saturating_mul(cols),
            quiet: 0,
            last_density: 0.0,
        }
    }

    /// Current threshold.
    pub fn threshold(&self) -> u32 {
        adaptive_threshold(self.total_cells, self.last_density)
    }

    /// Consecutive quiet generations.
    pub fn quiet_count(&self) -> u32 {
        self.quiet
    }

    /// Record one generation given how many rows changed in it.
    pub fn record(&mut self, changed_rows: usize) -> Stability {
        if changed_rows > 0 {
            self.quiet = 0;
            self.last_density = changed_rows as f64 / self.rows as f64;
            return Stability::Changed;
        }

        self.quiet += 1;
        let threshold = self.threshold();
        if self.quiet >= threshold {
            Stability::Stabilized
        } else {
            Stability::Quiet {
                quiet: self.quiet,
                threshold,
            }
        }
    }

    /// Forget all history.
    pub fn reset(&mut self) {
        self.quiet = 0;
        self.last_density = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_threshold_clamps() {
        assert_eq!(base_threshold(1), MIN_THRESHOLD);
        // log2(101) = 6.66
        assert_eq!(base_threshold(100), 7);
        // log2(2501) = 11.29
        assert_eq!(base_threshold(50 * 50), 11);
        assert_eq!(base_threshold(usize::MAX / 2), MAX_THRESHOLD);
    }

    #[test]
    fn test_tracker_saturates_cell_count() {
        let tracker = StabilizationTracker::new(usize::MAX, 2);
        assert_eq!(tracker.threshold(), MAX_THRESHOLD - SPARSE_REDUCTION);
    }

    #[test]
    fn test_sparse_reduction_floors_at_min() {
        assert_eq!(adaptive_threshold(100, 0.0), 5);
        assert_eq!(adaptive_threshold(100, 0.5), 7);
        assert_eq!(adaptive_threshold(16, 0.0), MIN_THRESHOLD);
        assert_eq!(adaptive_threshold(4, 0.0), MIN_THRESHOLD);
    }

    #[test]
    fn test_untouched_board_stabilizes_at_reduced_threshold() {
        let mut tracker = StabilizationTracker::new(10, 10);
        for quiet in 1..5 {
            assert_eq!(
                tracker.record(0),
                Stability::Quiet {
                    quiet,
                    threshold: 5
                }
            );
        }
        assert_eq!(tracker.record(0), Stability::Stabilized);
    }

    #[test]
    fn test_dense_change_uses_full_threshold() {
        let mut tracker = StabilizationTracker::new(10, 10);
        assert_eq!(tracker.record(5), Stability::Changed);
        assert_eq!(tracker.threshold(), 7);
        for _ in 0..6 {
            assert!(matches!(tracker.record(0), Stability::Quiet { .. }));
        }
        assert_eq!(tracker.record(0), Stability::Stabilized);
    }

    #[test]
    fn test_change_resets_counter() {
        let mut tracker = StabilizationTracker::new(10, 10);
        tracker.record(0);
        tracker.record(0);
        assert_eq!(tracker.quiet_count(), 2);
        tracker.record(1);
        assert_eq!(tracker.quiet_count(), 0);
        tracker.reset();
        assert_eq!(tracker.threshold(), 5);
    }
}
