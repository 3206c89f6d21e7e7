//! Tick period derived from a base interval and a speed multiplier.

use std::time::Duration;

use super::SchedulerError;

/// Reference period used when none is configured.
pub const DEFAULT_BASE_INTERVAL: Duration = Duration::from_millis(200);

/// `period = base_interval / speed`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cadence {
    base_interval: Duration,
    speed: f64,
    period: Duration,
}

impl Cadence {
    pub fn new(base_interval: Duration, speed: f64) -> Result<Self, SchedulerError> {
        if base_interval.is_zero() {
            return Err(SchedulerError::InvalidInterval);
        }
        let period = period_for(base_interval, speed)?;
        Ok(Self {
            base_interval,
            speed,
            period,
        })
    }

    /// Build from a millisecond interval as carried on the wire.
    pub fn from_millis(base_interval_ms: f64, speed: f64) -> Result<Self, SchedulerError> {
        if !base_interval_ms.is_finite() || base_interval_ms <= 0.0 {
            return Err(SchedulerError::InvalidInterval);
        }
        let nanos = (base_interval_ms * 1_000_000.0).round();
        if nanos >= u64::MAX as f64 {
            return Err(SchedulerError::InvalidInterval);
        }
        Self::new(Duration::from_nanos(nanos as u64), speed)
    }

    /// Change the speed multiplier. On error the cadence is unchanged.
    pub fn set_speed(&mut self, speed: f64) -> Result<(), SchedulerError> {
        self.period = period_for(self.base_interval, speed)?;
        self.speed = speed;
        Ok(())
    }

    #[inline]
    pub fn period(&self) -> Duration {
        self.period
    }

    #[inline]
    pub fn speed(&self) -> f64 {
        self.speed
    }

    #[inline]
    pub fn base_interval(&self) -> Duration {
        self.base_interval
    }

    /// Base interval in milliseconds, as carried on the wire.
    pub fn base_interval_ms(&self) -> f64 {
        self.base_interval.as_secs_f64() * 1000.0
    }
}

impl Default for Cadence {
    fn default() -> Self {
        Self {
            base_interval: DEFAULT_BASE_INTERVAL,
            speed: 1.0,
            period: DEFAULT_BASE_INTERVAL,
        }
    }
}

fn period_for(base_interval: Duration, speed: f64) -> Result<Duration, SchedulerError> {
    if !speed.is_finite() || speed <= 0.0 {
        return Err(SchedulerError::InvalidSpeed(speed));
    }
    let nanos = (base_interval.as_nanos() as f64 / speed).round();
    if nanos >= u64::MAX as f64 {
        return Err(SchedulerError::InvalidSpeed(speed));
    }
    Ok(Duration::from_nanos(nanos as u64))
}
