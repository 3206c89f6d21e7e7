//! Tick engine and the clock-free protocol state machine.
//!
//! [`SimulationCore`] advances a packed board and turns each generation into
//! at most one outgoing message. [`WorkerSession`] wraps it with the
//! `init` / `updateSpeed` / `stop` contract. Timers are owned by whoever
//! drives the session (cooperative host loop, worker thread, JS shell).

use std::mem;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{Cadence, SchedulerError};
use crate::compute::{BitGrid, Stability, StabilizationTracker};
use crate::protocol::{HostMessage, RowPatch, WorkerMessage};

/// How changing generations are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffMode {
    /// Only rows whose packed bytes changed.
    #[default]
    Rows,
    /// Every row, whenever anything changed.
    FullGrid,
}

/// Double-buffered bitset board plus stabilization tracking.
#[derive(Debug, Clone)]
pub struct SimulationCore {
    current: BitGrid,
    next: BitGrid,
    tracker: StabilizationTracker,
    diff_mode: DiffMode,
    generation: u64,
}

impl SimulationCore {
    pub fn new(current: BitGrid, diff_mode: DiffMode) -> Self {
        let next = BitGrid::zeroed_like(&current);
        let tracker = StabilizationTracker::new(current.rows(), current.cols());
        Self {
            current,
            next,
            tracker,
            diff_mode,
            generation: 0,
        }
    }

    /// Advance one generation.
    ///
    /// Returns the message to emit, if any: a patch when cells changed,
    /// `Stabilized` when the quiet run reached its threshold.
    pub fn tick(&mut self) -> Option<WorkerMessage> {
        let summary = self.current.step_into(&mut self.next);
        let patch = match (summary.any_change(), self.diff_mode) {
            (false, _) => None,
            (true, DiffMode::Rows) => RowPatch::diff(&self.current, &self.next),
            (true, DiffMode::FullGrid) => Some(RowPatch::full(&self.next)),
        };

        // Swap buffers (no allocation); `next` is fully rewritten on the next step.
        mem::swap(&mut self.current, &mut self.next);
        self.generation += 1;

        match self.tracker.record(summary.changed_rows) {
            Stability::Changed => {
                log::trace!(
                    "generation {}: {} rows changed",
                    self.generation,
                    summary.changed_rows
                );
                patch.map(WorkerMessage::Patch)
            }
            Stability::Quiet { quiet, threshold } => {
                log::trace!("generation {}: quiet {quiet}/{threshold}", self.generation);
                None
            }
            Stability::Stabilized => {
                log::debug!("board stabilized after {} generations", self.generation);
                Some(WorkerMessage::Stabilized)
            }
        }
    }

    /// Current packed board.
    pub fn board(&self) -> &BitGrid {
        &self.current
    }

    /// Generations computed since the core was created.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn tracker(&self) -> &StabilizationTracker {
        &self.tracker
    }
}

/// Effect of a handled host message on the driver's timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionChange {
    /// A run began; anchor the timer at the current time.
    Started,
    /// Speed changed; keep the anchor, only the period is different.
    SpeedChanged,
    /// The run ended; cancel the timer.
    Stopped,
    /// Nothing changed (message arrived while no run was active).
    Ignored,
}

/// Protocol state machine shared by every scheduler form.
#[derive(Debug, Clone)]
pub struct WorkerSession {
    core: Option<SimulationCore>,
    cadence: Cadence,
    running: bool,
    diff_mode: DiffMode,
}

impl WorkerSession {
    pub fn new(diff_mode: DiffMode) -> Self {
        Self {
            core: None,
            cadence: Cadence::default(),
            running: false,
            diff_mode,
        }
    }

    /// Apply one host message. Invalid messages leave the session untouched.
    pub fn handle(&mut self, message: HostMessage) -> Result<SessionChange, SchedulerError> {
        match message {
            HostMessage::Init {
                rows,
                cols,
                buffer,
                base_interval,
                speed,
            } => {
                let board = BitGrid::from_bytes(rows, cols, buffer)?;
                let cadence = Cadence::from_millis(base_interval, speed)?;
                log::debug!(
                    "session started: {rows}x{cols}, period {:?}",
                    cadence.period()
                );
                self.core = Some(SimulationCore::new(board, self.diff_mode));
                self.cadence = cadence;
                self.running = true;
                Ok(SessionChange::Started)
            }
            HostMessage::UpdateSpeed { speed } => {
                // Invalid speeds are rejected even when idle.
                let mut cadence = self.cadence;
                cadence.set_speed(speed)?;
                if !self.running {
                    log::trace!("ignoring speed update for inactive session");
                    return Ok(SessionChange::Ignored);
                }
                self.cadence = cadence;
                log::debug!("session speed {speed}, period {:?}", self.cadence.period());
                Ok(SessionChange::SpeedChanged)
            }
            HostMessage::Stop => {
                if !self.running {
                    return Ok(SessionChange::Ignored);
                }
                self.running = false;
                log::debug!("session stopped");
                Ok(SessionChange::Stopped)
            }
        }
    }

    /// Run one tick if a run is active.
    pub fn tick(&mut self) -> Option<WorkerMessage> {
        if !self.running {
            return None;
        }
        let core = self.core.as_mut()?;
        let message = core.tick();
        if message == Some(WorkerMessage::Stabilized) {
            self.running = false;
        }
        message
    }

    /// Tick period while running.
    pub fn period(&self) -> Option<Duration> {
        self.running.then(|| self.cadence.period())
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn core(&self) -> Option<&SimulationCore> {
        self.core.as_ref()
    }
}
