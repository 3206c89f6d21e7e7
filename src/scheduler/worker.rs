//! Background worker scheduler.
//!
//! The worker owns its own packed board on a dedicated thread. The host side
//! talks to it only through channels; every buffer is moved, never shared.
//! Between ticks the thread is parked in `recv_timeout`.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use super::{
    Cadence, DiffMode, Scheduler, SchedulerError, SchedulerKind, SchedulerState, SessionChange,
    WorkerSession,
};
use crate::compute::{BitGrid, Grid};
use crate::protocol::{HostMessage, WorkerMessage};

/// Name given to the worker thread.
pub const WORKER_THREAD_NAME: &str = "life-sim-worker";

/// Host -> worker channel payload.
#[derive(Debug)]
enum WorkerCommand {
    /// A protocol message tagged with the run it belongs to.
    Deliver { epoch: u64, message: HostMessage },
    Shutdown,
}

/// Worker -> host channel payload.
#[derive(Debug)]
struct Delivery {
    epoch: u64,
    message: WorkerMessage,
}

/// Host handle to a background simulation thread.
pub struct WorkerScheduler {
    commands: Sender<WorkerCommand>,
    deliveries: Receiver<Delivery>,
    handle: Option<thread::JoinHandle<()>>,
    /// Run counter; deliveries from any other run are stale.
    epoch: u64,
    state: SchedulerState,
    /// Host-side copy of the worker's cadence, used to validate speed changes.
    cadence: Cadence,
}

impl WorkerScheduler {
    /// Spawn the worker thread.
    pub fn spawn(diff_mode: DiffMode) -> Result<Self, SchedulerError> {
        let (commands, command_rx) = mpsc::channel::<WorkerCommand>();
        let (delivery_tx, deliveries) = mpsc::channel::<Delivery>();

        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.into())
            .spawn(move || run_worker(command_rx, delivery_tx, diff_mode))
            .map_err(SchedulerError::BackgroundContextUnavailable)?;

        log::debug!("spawned {WORKER_THREAD_NAME}");
        Ok(Self {
            commands,
            deliveries,
            handle: Some(handle),
            epoch: 0,
            state: SchedulerState::Idle,
            cadence: Cadence::default(),
        })
    }

    fn send(&self, message: HostMessage) -> Result<(), SchedulerError> {
        self.commands
            .send(WorkerCommand::Deliver {
                epoch: self.epoch,
                message,
            })
            .map_err(|_| SchedulerError::Disconnected)
    }

    /// Filter one delivery. Returns it if it belongs to the active run.
    fn accept(&mut self, delivery: Delivery) -> Option<WorkerMessage> {
        if delivery.epoch != self.epoch || !self.state.is_running() {
            log::trace!(
                "dropping stale {:?} from run {}",
                delivery.message,
                delivery.epoch
            );
            return None;
        }
        if delivery.message == WorkerMessage::Stabilized {
            self.state = SchedulerState::Stabilized;
        }
        Some(delivery.message)
    }

    fn mark_disconnected(&mut self) {
        if self.state.is_running() {
            log::error!("{WORKER_THREAD_NAME} disconnected while running");
            self.state = SchedulerState::Stopped;
        }
    }
}

impl Scheduler for WorkerScheduler {
    fn kind(&self) -> SchedulerKind {
        SchedulerKind::Worker
    }

    fn start(
        &mut self,
        grid: &Grid,
        base_interval: Duration,
        speed: f64,
    ) -> Result<(), SchedulerError> {
        let cadence = Cadence::new(base_interval, speed)?;
        let buffer = BitGrid::encode(grid).into_bytes();

        self.epoch += 1;
        let init = HostMessage::Init {
            rows: grid.rows(),
            cols: grid.cols(),
            buffer,
            base_interval: cadence.base_interval_ms(),
            speed,
        };
        if let Err(err) = self.send(init) {
            self.state = SchedulerState::Stopped;
            return Err(err);
        }
        self.cadence = cadence;
        self.state = SchedulerState::Running;
        Ok(())
    }

    fn set_speed(&mut self, speed: f64) -> Result<(), SchedulerError> {
        // Validate here; the worker would only log a rejected speed.
        let mut cadence = self.cadence;
        cadence.set_speed(speed)?;
        if !self.state.is_running() {
            return Ok(());
        }
        self.send(HostMessage::UpdateSpeed { speed })?;
        self.cadence = cadence;
        Ok(())
    }

    fn stop(&mut self) {
        if self.state.is_running() {
            self.state = SchedulerState::Stopped;
            // A closed channel means the worker is gone, which is also stopped.
            let _ = self.send(HostMessage::Stop);
        }
    }

    fn poll(&mut self) -> Vec<WorkerMessage> {
        let mut messages = Vec::new();
        loop {
            match self.deliveries.try_recv() {
                Ok(delivery) => messages.extend(self.accept(delivery)),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.mark_disconnected();
                    break;
                }
            }
        }
        messages
    }

    fn next_message(&mut self, timeout: Duration) -> Option<WorkerMessage> {
        let give_up = Instant::now() + timeout;
        loop {
            let remaining = give_up.saturating_duration_since(Instant::now());
            match self.deliveries.recv_timeout(remaining) {
                Ok(delivery) => {
                    if let Some(message) = self.accept(delivery) {
                        return Some(message);
                    }
                }
                Err(RecvTimeoutError::Timeout) => return None,
                Err(RecvTimeoutError::Disconnected) => {
                    self.mark_disconnected();
                    return None;
                }
            }
        }
    }

    fn state(&self) -> SchedulerState {
        self.state
    }
}

impl Drop for WorkerScheduler {
    fn drop(&mut self) {
        let _ = self.commands.send(WorkerCommand::Shutdown);
        if let Some(handle) = self.handle.take()
            && let Err(err) = handle.join()
        {
            log::error!("{WORKER_THREAD_NAME} panicked: {err:?}");
        }
    }
}

/// Worker thread body.
fn run_worker(commands: Receiver<WorkerCommand>, deliveries: Sender<Delivery>, diff_mode: DiffMode) {
    let mut session = WorkerSession::new(diff_mode);
    let mut epoch = 0u64;
    // Time of the last tick (or of the start) while a run is active.
    let mut anchor: Option<Instant> = None;

    loop {
        let deadline = anchor.zip(session.period()).map(|(at, period)| at + period);
        let command = match deadline {
            Some(deadline) => {
                let wait = deadline.saturating_duration_since(Instant::now());
                match commands.recv_timeout(wait) {
                    Ok(command) => Some(command),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            None => match commands.recv() {
                Ok(command) => Some(command),
                Err(_) => break,
            },
        };

        match command {
            Some(WorkerCommand::Shutdown) => break,
            Some(WorkerCommand::Deliver {
                epoch: message_epoch,
                message,
            }) => {
                let is_init = matches!(message, HostMessage::Init { .. });
                if !is_init && message_epoch != epoch {
                    log::trace!("ignoring {message:?} for finished run {message_epoch}");
                    continue;
                }
                match session.handle(message) {
                    Ok(SessionChange::Started) => {
                        epoch = message_epoch;
                        anchor = Some(Instant::now());
                    }
                    Ok(SessionChange::Stopped) => anchor = None,
                    Ok(SessionChange::SpeedChanged | SessionChange::Ignored) => {}
                    Err(err) => log::warn!("{WORKER_THREAD_NAME} rejected message: {err}"),
                }
            }
            None => {
                let message = session.tick();
                anchor = session.is_running().then(Instant::now);
                if let Some(message) = message
                    && deliveries.send(Delivery { epoch, message }).is_err()
                {
                    break;
                }
            }
        }
    }

    log::debug!("{WORKER_THREAD_NAME} exiting");
}
