//! In-process cooperative scheduler.
//!
//! Ticks run inside `poll`/`poll_at` on the caller's thread, so each tick is
//! atomic with respect to host code. Hosts that already track frame time
//! (e.g. an animation callback timestamp) can drive it with the `*_at`
//! variants instead of the wall clock.

use std::thread;
use std::time::{Duration, Instant};

use super::{
    Cadence, DiffMode, Scheduler, SchedulerError, SchedulerKind, SchedulerState, SessionChange,
    WorkerSession,
};
use crate::compute::{BitGrid, Grid};
use crate::protocol::{HostMessage, WorkerMessage};

/// Maximum ticks run by a single poll; a host that stalls longer re-anchors
/// the timer instead of replaying the backlog.
pub const MAX_CATCH_UP_TICKS: usize = 64;

/// Cooperative scheduler running on the host's thread.
#[derive(Debug)]
pub struct LocalScheduler {
    session: WorkerSession,
    state: SchedulerState,
    /// Time of the last tick (or of the start). `None` when no tick is pending.
    anchor: Option<Instant>,
}

impl LocalScheduler {
    pub fn new(diff_mode: DiffMode) -> Self {
        Self {
            session: WorkerSession::new(diff_mode),
            state: SchedulerState::Idle,
            anchor: None,
        }
    }

    /// Start with an explicit start time.
    pub fn start_at(
        &mut self,
        grid: &Grid,
        base_interval: Duration,
        speed: f64,
        now: Instant,
    ) -> Result<(), SchedulerError> {
        let cadence = Cadence::new(base_interval, speed)?;
        let init = HostMessage::Init {
            rows: grid.rows(),
            cols: grid.cols(),
            buffer: BitGrid::encode(grid).into_bytes(),
            base_interval: cadence.base_interval_ms(),
            speed,
        };
        if self.session.handle(init)? == SessionChange::Started {
            self.state = SchedulerState::Running;
            self.anchor = Some(now);
        }
        Ok(())
    }

    /// Next tick deadline, if one is pending.
    pub fn deadline(&self) -> Option<Instant> {
        Some(self.anchor? + self.session.period()?)
    }

    /// Run every tick due at `now`, in generation order.
    pub fn poll_at(&mut self, now: Instant) -> Vec<WorkerMessage> {
        let mut messages = Vec::new();
        let mut ticks = 0;
        while let Some(deadline) = self.deadline() {
            if deadline > now {
                break;
            }
            if ticks == MAX_CATCH_UP_TICKS {
                log::debug!("local scheduler fell behind; re-anchoring timer");
                self.anchor = Some(now);
                break;
            }
            ticks += 1;
            self.anchor = Some(deadline);
            if let Some(message) = self.tick() {
                messages.push(message);
            }
        }
        messages
    }

    fn tick(&mut self) -> Option<WorkerMessage> {
        let message = self.session.tick();
        if message == Some(WorkerMessage::Stabilized) {
            self.state = SchedulerState::Stabilized;
            self.anchor = None;
        }
        message
    }

    /// The working copy of the board, while a run exists.
    pub fn board(&self) -> Option<&BitGrid> {
        self.session.core().map(|core| core.board())
    }
}

impl Scheduler for LocalScheduler {
    fn kind(&self) -> SchedulerKind {
        SchedulerKind::Local
    }

    fn start(
        &mut self,
        grid: &Grid,
        base_interval: Duration,
        speed: f64,
    ) -> Result<(), SchedulerError> {
        self.start_at(grid, base_interval, speed, Instant::now())
    }

    fn set_speed(&mut self, speed: f64) -> Result<(), SchedulerError> {
        // The anchor is kept, so the next deadline is last tick + new period.
        self.session
            .handle(HostMessage::UpdateSpeed { speed })
            .map(|_| ())
    }

    fn stop(&mut self) {
        if let Ok(SessionChange::Stopped) = self.session.handle(HostMessage::Stop) {
            self.state = SchedulerState::Stopped;
        }
        self.anchor = None;
    }

    fn poll(&mut self) -> Vec<WorkerMessage> {
        self.poll_at(Instant::now())
    }

    fn next_message(&mut self, timeout: Duration) -> Option<WorkerMessage> {
        let give_up = Instant::now() + timeout;
        while let Some(deadline) = self.deadline() {
            if deadline > give_up {
                thread::sleep(give_up.saturating_duration_since(Instant::now()));
                return None;
            }
            thread::sleep(deadline.saturating_duration_since(Instant::now()));
            self.anchor = Some(deadline);
            if let Some(message) = self.tick() {
                return Some(message);
            }
        }
        None
    }

    fn state(&self) -> SchedulerState {
        self.state
    }
}
