//! Scheduler module - Drives generations at a configurable cadence.
//!
//! Two interchangeable forms implement [`Scheduler`]:
//!
//! - [`LocalScheduler`]: cooperative, ticks run when the host pumps it.
//! - [`WorkerScheduler`]: a dedicated thread reachable only through channels.
//!
//! Both delegate every tick to the same [`WorkerSession`], so patches and
//! stabilization behave identically. [`create_scheduler`] prefers the worker
//! and falls back to the local form when a thread cannot be spawned.

mod cadence;
mod local;
mod session;
mod worker;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::compute::{Grid, GridError};
use crate::protocol::WorkerMessage;

pub use cadence::*;
pub use local::*;
pub use session::*;
pub use worker::*;

/// Lifecycle of a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Never started.
    Idle,
    /// Ticking.
    Running,
    /// Halted by `stop()`.
    Stopped,
    /// Halted by itself after the board stopped changing.
    Stabilized,
}

impl SchedulerState {
    #[inline]
    pub fn is_running(self) -> bool {
        self == SchedulerState::Running
    }
}

/// Which implementation is behind a `dyn Scheduler`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerKind {
    Local,
    Worker,
}

/// Requested scheduler placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerMode {
    /// Background worker, falling back to local if unavailable.
    #[default]
    Worker,
    /// Always run on the host's own thread.
    Local,
}

/// Common interface of both scheduler forms.
pub trait Scheduler {
    fn kind(&self) -> SchedulerKind;

    /// Begin a run from `grid`. Resets all run state, including stabilization.
    ///
    /// Inputs are validated before anything changes.
    fn start(
        &mut self,
        grid: &Grid,
        base_interval: Duration,
        speed: f64,
    ) -> Result<(), SchedulerError>;

    /// Change the speed multiplier; time elapsed since the last tick still counts.
    fn set_speed(&mut self, speed: f64) -> Result<(), SchedulerError>;

    /// Halt. No tick scheduled before this call will be observed.
    fn stop(&mut self);

    /// Drain messages that are ready, without blocking.
    fn poll(&mut self) -> Vec<WorkerMessage>;

    /// Wait up to `timeout` for the next message.
    fn next_message(&mut self, timeout: Duration) -> Option<WorkerMessage>;

    fn state(&self) -> SchedulerState;
}

/// Scheduler errors.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Invalid grid shape: {0}")]
    InvalidGridShape(#[from] GridError),
    #[error("Speed must be a finite positive multiplier, got {0}")]
    InvalidSpeed(f64),
    #[error("Base interval must be a positive duration")]
    InvalidInterval,
    #[error("Background simulation context unavailable: {0}")]
    BackgroundContextUnavailable(#[source] std::io::Error),
    #[error("Board cannot be edited while the simulation is running")]
    Running,
    #[error("Background simulation context disconnected")]
    Disconnected,
}

/// Create a scheduler for `mode`, falling back to [`LocalScheduler`] when a
/// background worker cannot be created.
pub fn create_scheduler(mode: SchedulerMode, diff_mode: DiffMode) -> Box<dyn Scheduler> {
    create_scheduler_with(mode, diff_mode, WorkerScheduler::spawn)
}

/// [`create_scheduler`] with an explicit worker constructor.
pub fn create_scheduler_with<F>(
    mode: SchedulerMode,
    diff_mode: DiffMode,
    spawn_worker: F,
) -> Box<dyn Scheduler>
where
    F: FnOnce(DiffMode) -> Result<WorkerScheduler, SchedulerError>,
{
    match mode {
        SchedulerMode::Local => Box::new(LocalScheduler::new(diff_mode)),
        SchedulerMode::Worker => match spawn_worker(diff_mode) {
            Ok(worker) => Box::new(worker),
            Err(err) => {
                log::warn!("{err}; falling back to in-process scheduler");
                Box::new(LocalScheduler::new(diff_mode))
            }
        },
    }
}
