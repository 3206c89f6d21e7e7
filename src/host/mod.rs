//! Host module - Owns the authoritative board and drives a scheduler.
//!
//! The host keeps the grid a renderer reads, hands it to the scheduler on
//! `run`, and merges incoming patches in the order they arrive. Editing is
//! refused while a run is active.

mod editor;

use std::time::Duration;

use crate::compute::{Grid, TransitionKind};
use crate::protocol::WorkerMessage;
use crate::scheduler::{
    Cadence, Scheduler, SchedulerError, SchedulerKind, SchedulerState, create_scheduler,
};
use crate::schema::SimulationConfig;

pub use editor::*;

/// What a pump merged into the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PumpSummary {
    /// Patches applied, in generation order.
    pub patches: usize,
    /// The scheduler reported that the board stopped changing.
    pub stabilized: bool,
}

impl PumpSummary {
    #[inline]
    pub fn changed(&self) -> bool {
        self.patches > 0
    }
}

/// Board owner wired to a scheduler.
pub struct SimulationHost {
    grid: Grid,
    scheduler: Box<dyn Scheduler>,
    cadence: Cadence,
    transition: TransitionKind,
    /// Generations merged into `grid` since the host was created.
    generation: u64,
}

impl SimulationHost {
    /// Create a host for `grid`, picking a scheduler as `config` requests.
    pub fn new(grid: Grid, config: &SimulationConfig) -> Result<Self, SchedulerError> {
        let scheduler = create_scheduler(config.scheduler, config.diff);
        Self::with_scheduler(grid, config, scheduler)
    }

    /// Create a host seeded from `config`.
    pub fn from_config(config: &SimulationConfig) -> Result<Self, SchedulerError> {
        let grid = config.seed.generate(config.rows, config.cols)?;
        Self::new(grid, config)
    }

    /// Create a host around an existing scheduler.
    pub fn with_scheduler(
        grid: Grid,
        config: &SimulationConfig,
        scheduler: Box<dyn Scheduler>,
    ) -> Result<Self, SchedulerError> {
        let cadence = Cadence::new(config.base_interval(), config.speed)?;
        log::debug!(
            "host created: {}x{} board, {:?} scheduler",
            grid.rows(),
            grid.cols(),
            scheduler.kind()
        );
        Ok(Self {
            grid,
            scheduler,
            cadence,
            transition: config.transition,
            generation: 0,
        })
    }

    /// The current board.
    #[inline]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.scheduler.state().is_running()
    }

    #[inline]
    pub fn state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    #[inline]
    pub fn scheduler_kind(&self) -> SchedulerKind {
        self.scheduler.kind()
    }

    #[inline]
    pub fn speed(&self) -> f64 {
        self.cadence.speed()
    }

    /// Start a run from the current board.
    pub fn run(&mut self) -> Result<(), SchedulerError> {
        self.scheduler
            .start(&self.grid, self.cadence.base_interval(), self.cadence.speed())
    }

    /// Halt the run. Patches still in flight are discarded.
    pub fn stop(&mut self) {
        self.scheduler.stop();
    }

    /// Change the speed, for the current run and later ones.
    pub fn set_speed(&mut self, speed: f64) -> Result<(), SchedulerError> {
        let mut cadence = self.cadence;
        cadence.set_speed(speed)?;
        if self.is_running() {
            self.scheduler.set_speed(speed)?;
        }
        self.cadence = cadence;
        Ok(())
    }

    /// Merge every message that is ready, without blocking.
    pub fn pump(&mut self) -> Result<PumpSummary, SchedulerError> {
        let mut summary = PumpSummary::default();
        for message in self.scheduler.poll() {
            self.merge(message, &mut summary)?;
        }
        Ok(summary)
    }

    /// Wait up to `timeout` for one message and merge it.
    pub fn pump_wait(&mut self, timeout: Duration) -> Result<PumpSummary, SchedulerError> {
        let mut summary = PumpSummary::default();
        if let Some(message) = self.scheduler.next_message(timeout) {
            self.merge(message, &mut summary)?;
        }
        Ok(summary)
    }

    fn merge(
        &mut self,
        message: WorkerMessage,
        summary: &mut PumpSummary,
    ) -> Result<(), SchedulerError> {
        match message {
            WorkerMessage::Patch(patch) => {
                patch.apply_to(&mut self.grid)?;
                self.generation += 1;
                summary.patches += 1;
            }
            WorkerMessage::Stabilized => {
                log::debug!("board stabilized at generation {}", self.generation);
                summary.stabilized = true;
            }
        }
        Ok(())
    }

    /// Advance one generation on the host's thread, outside any run.
    ///
    /// Returns whether any cell changed.
    pub fn step(&mut self) -> Result<bool, SchedulerError> {
        self.ensure_idle()?;
        let next = self.grid.step_with(self.transition);
        let changed = next != self.grid;
        self.grid = next;
        self.generation += 1;
        Ok(changed)
    }

    /// Edit one cell. Returns its new state.
    pub fn edit(&mut self, row: usize, col: usize, mode: EditMode) -> Result<bool, SchedulerError> {
        self.ensure_idle()?;
        Ok(mode.apply(&mut self.grid, row, col)?)
    }

    /// Edit the cell under a pointer. Returns the cell and its new state, or
    /// `None` when the pointer is off the board.
    pub fn edit_at(
        &mut self,
        locator: &CellLocator,
        x: f64,
        y: f64,
        mode: EditMode,
    ) -> Result<Option<((usize, usize), bool)>, SchedulerError> {
        self.ensure_idle()?;
        let Some((row, col)) = locator.locate(x, y, self.grid.rows(), self.grid.cols()) else {
            return Ok(None);
        };
        let alive = mode.apply(&mut self.grid, row, col)?;
        Ok(Some(((row, col), alive)))
    }

    /// Resize the board, keeping the overlapping region.
    pub fn resize(&mut self, rows: usize, cols: usize) -> Result<(), SchedulerError> {
        self.ensure_idle()?;
        if (rows, cols) != (self.grid.rows(), self.grid.cols()) {
            self.grid = self.grid.resized(rows, cols)?;
            log::debug!("board resized to {rows}x{cols}");
        }
        Ok(())
    }

    /// Kill every cell.
    pub fn clear(&mut self) -> Result<(), SchedulerError> {
        self.ensure_idle()?;
        self.grid.clear();
        Ok(())
    }

    /// Replace the whole board.
    pub fn load(&mut self, grid: Grid) -> Result<(), SchedulerError> {
        self.ensure_idle()?;
        self.grid = grid;
        Ok(())
    }

    fn ensure_idle(&self) -> Result<(), SchedulerError> {
        if self.is_running() {
            return Err(SchedulerError::Running);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{DiffMode, LocalScheduler, SchedulerMode};
    use crate::schema::{Pattern, Seed};

    fn local_config() -> SimulationConfig {
        SimulationConfig {
            rows: 5,
            cols: 5,
            base_interval_ms: 1,
            speed: 1.0,
            scheduler: SchedulerMode::Local,
            seed: Seed::new(Pattern::Blinker),
            ..Default::default()
        }
    }

    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn test_run_merges_patches_in_order() {
        let mut host = SimulationHost::from_config(&local_config()).unwrap();
        assert_eq!(host.scheduler_kind(), SchedulerKind::Local);
        let start = host.grid().clone();
        let mut expected = start.clone();

        host.run().unwrap();
        for _ in 0..4 {
            let summary = host.pump_wait(WAIT).unwrap();
            assert_eq!(summary.patches, 1);
            expected = expected.step_with(TransitionKind::Baseline);
            assert_eq!(host.grid(), &expected);
        }
        assert_eq!(host.grid(), &start);
        assert_eq!(host.generation(), 4);
    }

    #[test]
    fn test_unlisted_rows_are_shared_after_merge() {
        let mut host = SimulationHost::from_config(&local_config()).unwrap();
        let before = host.grid().clone();
        host.run().unwrap();
        host.pump_wait(WAIT).unwrap();
        // The blinker lives in rows 1..=3; rows 0 and 4 never change.
        for row in [0, 4] {
            assert!(std::sync::Arc::ptr_eq(before.row(row), host.grid().row(row)));
        }
    }

    #[test]
    fn test_editing_refused_while_running() {
        let mut host = SimulationHost::from_config(&local_config()).unwrap();
        host.run().unwrap();
        assert!(matches!(
            host.edit(0, 0, EditMode::Draw),
            Err(SchedulerError::Running)
        ));
        assert!(matches!(host.clear(), Err(SchedulerError::Running)));
        assert!(matches!(host.resize(3, 3), Err(SchedulerError::Running)));
        assert!(matches!(host.step(), Err(SchedulerError::Running)));

        host.stop();
        assert!(host.pump().unwrap().patches == 0);
        host.edit(0, 0, EditMode::Draw).unwrap();
        assert!(host.grid().get(0, 0));
    }

    #[test]
    fn test_empty_board_reports_stabilized() {
        let config = SimulationConfig {
            seed: Seed::default(),
            ..local_config()
        };
        let mut host = SimulationHost::from_config(&config).unwrap();
        host.run().unwrap();
        let summary = host.pump_wait(WAIT).unwrap();
        assert!(summary.stabilized);
        assert!(!summary.changed());
        assert_eq!(host.state(), SchedulerState::Stabilized);
        host.clear().unwrap();
    }

    #[test]
    fn test_resize_keeps_overlap() {
        let mut host = SimulationHost::from_config(&local_config()).unwrap();
        host.resize(3, 8).unwrap();
        assert_eq!((host.grid().rows(), host.grid().cols()), (3, 8));
        // Blinker row 2 survives; its cells are at columns 1..=3.
        assert!(host.grid().get(2, 1) && host.grid().get(2, 3));
        assert!(matches!(
            host.resize(0, 8),
            Err(SchedulerError::InvalidGridShape(_))
        ));
    }

    #[test]
    fn test_manual_step_uses_configured_transition() {
        let config = SimulationConfig {
            transition: TransitionKind::Bitset,
            ..local_config()
        };
        let mut host = SimulationHost::from_config(&config).unwrap();
        assert!(host.step().unwrap());
        assert!(host.step().unwrap());
        let still = SimulationConfig {
            seed: Seed::new(Pattern::Block),
            ..local_config()
        };
        let mut host = SimulationHost::from_config(&still).unwrap();
        assert!(!host.step().unwrap());
    }

    #[test]
    fn test_edit_at_pointer() {
        let mut host = SimulationHost::from_config(&local_config()).unwrap();
        let rect = DisplayRect {
            left: 0.0,
            top: 0.0,
            width: 50.0,
            height: 50.0,
        };
        let locator = CellLocator::for_board(rect, 5, 5, DEFAULT_CELL_SIZE);
        assert_eq!(
            host.edit_at(&locator, 42.0, 3.0, EditMode::Toggle).unwrap(),
            Some(((0, 4), true))
        );
        assert_eq!(
            host.edit_at(&locator, 60.0, 3.0, EditMode::Toggle).unwrap(),
            None
        );
    }

    #[test]
    fn test_set_speed_validated_and_kept() {
        let mut host = SimulationHost::with_scheduler(
            Grid::new(4, 4).unwrap(),
            &local_config(),
            Box::new(LocalScheduler::new(DiffMode::Rows)),
        )
        .unwrap();
        assert!(matches!(
            host.set_speed(f64::NAN),
            Err(SchedulerError::InvalidSpeed(_))
        ));
        host.set_speed(20.0).unwrap();
        assert_eq!(host.speed(), 20.0);
    }
}
