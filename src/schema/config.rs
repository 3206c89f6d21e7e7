//! Configuration types for simulation parameters.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{Pattern, Seed};
use crate::compute::TransitionKind;
use crate::scheduler::{DiffMode, SchedulerMode, DEFAULT_BASE_INTERVAL};

fn default_base_interval_ms() -> u64 {
    DEFAULT_BASE_INTERVAL.as_millis() as u64
}

fn default_speed() -> f64 {
    SpeedPreset::Normal.multiplier()
}

/// Top-level simulation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Board height in cells.
    pub rows: usize,
    /// Board width in cells.
    pub cols: usize,
    /// Tick period at speed 1, in milliseconds.
    #[serde(default = "default_base_interval_ms")]
    pub base_interval_ms: u64,
    /// Speed multiplier; the tick period is `base_interval / speed`.
    #[serde(default = "default_speed")]
    pub speed: f64,
    /// Where generations are computed.
    #[serde(default)]
    pub scheduler: SchedulerMode,
    /// How changing generations are reported.
    #[serde(default)]
    pub diff: DiffMode,
    /// Transition used when stepping the board manually.
    #[serde(default)]
    pub transition: TransitionKind,
    /// Initial board contents.
    #[serde(default)]
    pub seed: Seed,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            rows: 40,
            cols: 60,
            base_interval_ms: default_base_interval_ms(),
            speed: default_speed(),
            scheduler: SchedulerMode::default(),
            diff: DiffMode::default(),
            transition: TransitionKind::default(),
            seed: Seed::default(),
        }
    }
}

impl SimulationConfig {
    /// Load and validate a JSON configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    #[inline]
    pub fn base_interval(&self) -> Duration {
        Duration::from_millis(self.base_interval_ms)
    }

    #[inline]
    pub fn cell_count(&self) -> usize {
        self.rows * self.cols
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rows == 0 || self.cols == 0 {
            return Err(ConfigError::InvalidDimensions);
        }
        if self.base_interval_ms == 0 {
            return Err(ConfigError::InvalidInterval);
        }
        if !self.speed.is_finite() || self.speed <= 0.0 {
            return Err(ConfigError::InvalidSpeed(self.speed));
        }
        if let Pattern::Random { density, .. } = &self.seed.pattern
            && !(0.0..=1.0).contains(density)
        {
            return Err(ConfigError::InvalidDensity(*density));
        }
        Ok(())
    }
}

/// Speed settings cycled through by the run controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedPreset {
    Slow,
    #[default]
    Normal,
    Fast,
}

impl SpeedPreset {
    pub fn multiplier(self) -> f64 {
        match self {
            SpeedPreset::Slow => 1.0,
            SpeedPreset::Normal => 2.0,
            SpeedPreset::Fast => 20.0,
        }
    }

    /// Next preset in the cycle: slow, normal, fast, slow.
    pub fn next(self) -> Self {
        match self {
            SpeedPreset::Slow => SpeedPreset::Normal,
            SpeedPreset::Normal => SpeedPreset::Fast,
            SpeedPreset::Fast => SpeedPreset::Slow,
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Board dimensions (rows, cols) must be non-zero")]
    InvalidDimensions,
    #[error("Base interval must be non-zero")]
    InvalidInterval,
    #[error("Speed must be a finite positive multiplier, got {0}")]
    InvalidSpeed(f64),
    #[error("Random fill density must be within [0, 1], got {0}")]
    InvalidDensity(f64),
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = SimulationConfig::default();
        config.validate().unwrap();
        assert_eq!(config.base_interval(), Duration::from_millis(200));
        assert_eq!(config.speed, 2.0);
        assert_eq!(config.scheduler, SchedulerMode::Worker);
        assert_eq!(config.diff, DiffMode::Rows);
    }

    #[test]
    fn test_minimal_json_uses_defaults() {
        let config: SimulationConfig = serde_json::from_str(r#"{"rows":8,"cols":9}"#).unwrap();
        assert_eq!(config.cell_count(), 72);
        assert_eq!(config.base_interval_ms, 200);
        assert_eq!(config.transition, TransitionKind::RowSharing);
        assert_eq!(config.seed, Seed::default());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = SimulationConfig {
            rows: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidDimensions)));

        config.rows = 10;
        config.speed = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidSpeed(_))));

        config.speed = 1.0;
        config.base_interval_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidInterval)));

        config.base_interval_ms = 100;
        config.seed = Seed::new(Pattern::Random {
            density: 2.0,
            seed: None,
        });
        assert!(matches!(config.validate(), Err(ConfigError::InvalidDensity(_))));
    }

    #[test]
    fn test_from_path_loads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"rows":5,"cols":5,"speed":20.0,"scheduler":"local","diff":"full_grid",
                "seed":{{"pattern":{{"type":"glider"}}}}}}"#
        )
        .unwrap();

        let config = SimulationConfig::from_path(file.path()).unwrap();
        assert_eq!(config.scheduler, SchedulerMode::Local);
        assert_eq!(config.diff, DiffMode::FullGrid);
        assert_eq!(config.seed.pattern, Pattern::Glider);
    }

    #[test]
    fn test_from_path_reports_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(
            SimulationConfig::from_path(&missing),
            Err(ConfigError::Io(_))
        ));

        let bad = dir.path().join("bad.json");
        fs::write(&bad, "{ rows: 5 }").unwrap();
        assert!(matches!(
            SimulationConfig::from_path(&bad),
            Err(ConfigError::Json(_))
        ));

        let invalid = dir.path().join("invalid.json");
        fs::write(&invalid, r#"{"rows":5,"cols":0}"#).unwrap();
        assert!(matches!(
            SimulationConfig::from_path(&invalid),
            Err(ConfigError::InvalidDimensions)
        ));
    }

    #[test]
    fn test_speed_presets_cycle() {
        let mut preset = SpeedPreset::Slow;
        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(preset.multiplier());
            preset = preset.next();
        }
        assert_eq!(seen, vec![1.0, 2.0, 20.0]);
        assert_eq!(preset, SpeedPreset::Slow);
    }
}
