//! Configuration loading and typed config structures for the Marsim kernel.
//!
//! The canonical configuration lives in `marsim-config.yaml` at the project
//! root. This module defines strongly-typed structs that mirror the YAML
//! structure, and provides a loader that reads and validates the file.

use std::path::Path;

use chrono::{DateTime, Utc};
use marsim_events::HistoryConfig;
use marsim_types::{BuildingCategory, Coordinates, MILLISOLS_PER_SOL};
use serde::Deserialize;
use tracing::warn;

use crate::activity::GroupActivityInfo;

/// Environment variable overriding `clock.time_ratio`.
pub const TIME_RATIO_ENV: &str = "MARSIM_TIME_RATIO";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is out of range.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level simulation configuration.
///
/// Mirrors the structure of `marsim-config.yaml`. Every section is optional
/// and falls back to its defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SimulationConfig {
    /// Master clock settings.
    #[serde(default)]
    pub clock: ClockConfig,

    /// Historical event log settings.
    #[serde(default)]
    pub history: HistoryConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Run boundaries for the clock driver.
    #[serde(default)]
    pub simulation: SimulationBoundsConfig,

    /// Settlements to create at startup.
    #[serde(default)]
    pub settlements: Vec<SettlementConfig>,

    /// Recurring group activities scheduled at every settlement.
    #[serde(default)]
    pub activities: Vec<GroupActivityInfo>,
}

impl SimulationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// `MARSIM_TIME_RATIO` overrides `clock.time_ratio` when set. The result
    /// is validated before it is returned.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.clock.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Check every section for out-of-range values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.clock.validate()?;
        for activity in &self.activities {
            activity.validate()?;
        }
        for settlement in &self.settlements {
            if settlement.name.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    reason: "settlement name must not be empty".to_owned(),
                });
            }
        }
        Ok(())
    }
}

/// Master clock configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClockConfig {
    /// Simulated seconds per real second.
    #[serde(default = "default_time_ratio")]
    pub time_ratio: f64,

    /// Sol the simulation starts on.
    #[serde(default = "default_start_sol")]
    pub start_sol: u32,

    /// Millisol within the start sol.
    #[serde(default)]
    pub start_millisol: f64,

    /// Earth date and time matching the start instant.
    #[serde(default = "default_earth_start")]
    pub earth_start: DateTime<Utc>,

    /// Real milliseconds the driver waits between pulses.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Largest real gap accepted between two pulses. Longer gaps (host
    /// sleep, debugger stops) are replaced by a nominal pulse.
    #[serde(default = "default_max_elapsed_ms")]
    pub max_elapsed_ms: u64,

    /// Simulated width of the replacement pulse, in millisols.
    #[serde(default = "default_nominal_pulse_millisols")]
    pub nominal_pulse_millisols: f64,
}

impl ClockConfig {
    /// Override the time ratio from `MARSIM_TIME_RATIO` when it is set.
    ///
    /// An unparseable value is logged and ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(TIME_RATIO_ENV) {
            match val.trim().parse::<f64>() {
                Ok(ratio) => self.time_ratio = ratio,
                Err(e) => warn!(value = val, error = %e, "Ignoring unparseable {TIME_RATIO_ENV}"),
            }
        }
    }

    /// Check the clock section for out-of-range values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.time_ratio.is_finite() || self.time_ratio <= 0.0 {
            return Err(ConfigError::Invalid {
                reason: format!("clock.time_ratio must be positive, got {}", self.time_ratio),
            });
        }
        if !(0.0..MILLISOLS_PER_SOL).contains(&self.start_millisol) {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "clock.start_millisol must be in [0, 1000), got {}",
                    self.start_millisol
                ),
            });
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                reason: "clock.tick_interval_ms must be at least 1".to_owned(),
            });
        }
        if self.max_elapsed_ms == 0 {
            return Err(ConfigError::Invalid {
                reason: "clock.max_elapsed_ms must be at least 1".to_owned(),
            });
        }
        if !self.nominal_pulse_millisols.is_finite() || self.nominal_pulse_millisols <= 0.0 {
            return Err(ConfigError::Invalid {
                reason: "clock.nominal_pulse_millisols must be positive".to_owned(),
            });
        }
        Ok(())
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            time_ratio: default_time_ratio(),
            start_sol: default_start_sol(),
            start_millisol: 0.0,
            earth_start: default_earth_start(),
            tick_interval_ms: default_tick_interval_ms(),
            max_elapsed_ms: default_max_elapsed_ms(),
            nominal_pulse_millisols: default_nominal_pulse_millisols(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Run boundaries for the clock driver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SimulationBoundsConfig {
    /// Stop after this many pulses (0 = unlimited).
    #[serde(default)]
    pub max_pulses: u64,

    /// Stop once this sol is reached (0 = unlimited).
    #[serde(default)]
    pub max_sol: u32,
}

/// A settlement to create at startup.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SettlementConfig {
    /// Display name.
    pub name: String,

    /// Surface location; the longitude sets the local time zone.
    #[serde(default)]
    pub coordinates: Coordinates,

    /// Buildings that can host activities.
    #[serde(default)]
    pub venues: Vec<VenueConfig>,
}

/// A building entry under a settlement.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VenueConfig {
    /// Display name.
    pub name: String,

    /// Functional category.
    pub category: BuildingCategory,

    /// Number of people it holds.
    #[serde(default = "default_venue_capacity")]
    pub capacity: u32,

    /// Whether the building is pressurized.
    #[serde(default = "default_true")]
    pub has_life_support: bool,
}

const fn default_time_ratio() -> f64 {
    256.0
}

const fn default_start_sol() -> u32 {
    1
}

/// 2043-09-30T00:00:00Z.
fn default_earth_start() -> DateTime<Utc> {
    DateTime::from_timestamp(2_327_184_000, 0).unwrap_or_default()
}

const fn default_tick_interval_ms() -> u64 {
    100
}

const fn default_max_elapsed_ms() -> u64 {
    30_000
}

const fn default_nominal_pulse_millisols() -> f64 {
    0.25
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_venue_capacity() -> u32 {
    10
}

const fn default_true() -> bool {
    true
}
