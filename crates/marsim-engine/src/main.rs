//! Engine binary for the Marsim time kernel.
//!
//! Wires together the master clock, the historical event log and the
//! configured settlements, then drives the clock in real time until a
//! bound is reached or the process is interrupted.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `marsim-config.yaml` (or `MARSIM_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Create the master clock
//! 4. Create the historical event log and its log listener
//! 5. Create settlements and schedule their group activities
//! 6. Register listeners with the clock
//! 7. Run the clock driver until a bound or Ctrl-C
//! 8. Log the result

mod error;
mod observer;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use marsim_core::clock::{ClockTimeSource, MasterClock};
use marsim_core::config::{LoggingConfig, SimulationConfig};
use marsim_core::driver;
use marsim_core::settlement::Settlement;
use marsim_core::wall::SystemWallClock;
use marsim_events::HistoricalEventManager;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::observer::{HistoryLogger, SolReporter};

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "marsim-config.yaml";

/// Environment variable naming an alternative configuration file.
const CONFIG_PATH_ENV: &str = "MARSIM_CONFIG";

/// Application entry point for the engine.
///
/// # Errors
///
/// Returns an error if any initialization step fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config_path = std::env::var(CONFIG_PATH_ENV)
        .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let config = load_config(&config_path)?;

    // 2. Initialize structured logging.
    init_logging(&config.logging)?;
    info!(
        path = %config_path.display(),
        settlements = config.settlements.len(),
        activities = config.activities.len(),
        time_ratio = config.clock.time_ratio,
        "marsim-engine starting"
    );

    // 3. Create the master clock.
    let clock = Arc::new(MasterClock::new(
        &config.clock,
        Arc::new(SystemWallClock::new()),
    )?);

    // 4. Create the history log. Settlements listening to the clock hold
    // the log, so it reads the clock through a weak handle.
    let history = Arc::new(HistoricalEventManager::new(
        Arc::new(ClockTimeSource::new(&clock)),
        config.history.clone(),
    ));
    let history_logger = Arc::new(HistoryLogger::new());
    history.add_listener(history_logger.clone());

    // 5. Create settlements and schedule activities.
    let now = clock.mars_time();
    let settlements: Vec<Arc<Settlement>> = config
        .settlements
        .iter()
        .map(|s| Settlement::from_config(s, Some(Arc::clone(&history))))
        .collect();
    for settlement in &settlements {
        settlement.schedule_activities(&config.activities, &now);
    }
    if settlements.is_empty() {
        warn!("No settlements configured; the clock will run with nothing scheduled");
    }

    // 6. Register listeners.
    for settlement in &settlements {
        clock.add_listener(settlement.clone());
    }
    let sol_reporter = Arc::new(SolReporter::new(settlements));
    clock.add_listener(sol_reporter.clone());
    info!(listeners = clock.listener_count(), "Clock listeners registered");

    // 7. Stop cleanly on Ctrl-C.
    {
        let clock = Arc::clone(&clock);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Interrupt received, stopping clock");
                    clock.request_stop();
                }
                Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
            }
        });
    }

    let result =
        driver::run_clock(&clock, &config.simulation, config.clock.tick_interval_ms).await;

    // 8. Log results.
    driver::log_run_end(&result, &clock);
    info!(
        end_reason = ?result.end_reason,
        total_pulses = result.total_pulses,
        history_events = history.len(),
        history_logged = history_logger.logged(),
        sol_reports = sol_reporter.reported(),
        "marsim-engine shutdown complete"
    );

    Ok(())
}

/// Load the simulation configuration from `path`.
///
/// A missing file yields the defaults.
fn load_config(path: &Path) -> Result<SimulationConfig, EngineError> {
    if path.exists() {
        Ok(SimulationConfig::from_file(path)?)
    } else {
        Ok(SimulationConfig::default())
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_logging(logging: &LoggingConfig) -> Result<(), EngineError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .map_err(|e| EngineError::Logging {
            message: format!("invalid log level '{}': {e}", logging.level),
        })?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    let installed = if logging.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| EngineError::Logging {
        message: e.to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_file_uses_defaults() {
        let config = load_config(Path::new("does-not-exist.yaml")).unwrap();
        assert_eq!(config, SimulationConfig::default());
    }

    #[test]
    fn project_config_file_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../marsim-config.yaml");
        let config = load_config(&path).unwrap();
        assert!(!config.settlements.is_empty());
        assert!(!config.activities.is_empty());
    }
}
