//! Real-time driver for the master clock.
//!
//! [`run_clock`] is the top-level async loop that turns wall-clock time into
//! pulses:
//!
//! - **Bounded runs**: stop after `max_pulses` pulses or on reaching `max_sol`
//! - **Pause/resume**: the loop parks on the clock's resume notification
//! - **Clean stop**: [`MasterClock::request_stop`] ends the loop between pulses
//!
//! Everything that happens in simulated time (queues, activities, history)
//! hangs off the clock's listeners; the driver only paces it.

use std::sync::Arc;

use marsim_types::MarsTime;
use serde::Serialize;
use tracing::{info, warn};

use crate::clock::MasterClock;
use crate::config::SimulationBoundsConfig;

/// Reason why the driver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ClockEndReason {
    /// Delivered the configured `max_pulses` pulses.
    MaxPulsesReached,
    /// Simulated time reached the configured `max_sol`.
    MaxSolReached,
    /// [`MasterClock::request_stop`] was called.
    Stopped,
}

/// Result of a driver run.
#[derive(Debug, Clone, Copy)]
pub struct ClockRunResult {
    /// Why the run ended.
    pub end_reason: ClockEndReason,
    /// Pulses delivered by this run.
    pub total_pulses: u64,
    /// Mars time when the run ended.
    pub final_time: MarsTime,
}

/// Drive `clock` in real time until a stop condition is met.
///
/// Sleeps `tick_interval_ms` between ticks. While the clock is paused the
/// loop waits for a resume or stop instead of polling.
pub async fn run_clock(
    clock: &Arc<MasterClock>,
    bounds: &SimulationBoundsConfig,
    tick_interval_ms: u64,
) -> ClockRunResult {
    let mut total_pulses: u64 = 0;

    info!(
        max_pulses = bounds.max_pulses,
        max_sol = bounds.max_sol,
        tick_interval_ms,
        start = %clock.mars_time(),
        time_ratio = clock.time_ratio(),
        "Clock driver starting"
    );

    let end_reason = loop {
        // --- Check pause ---
        if clock.is_paused() {
            info!("Clock paused, waiting for resume...");
            clock.wait_if_paused().await;
            if !clock.is_stop_requested() {
                info!("Clock driver resumed");
            }
        }

        // --- Check stop request ---
        if clock.is_stop_requested() {
            info!("Clock stop requested");
            break ClockEndReason::Stopped;
        }

        // --- Sleep for tick interval ---
        if tick_interval_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(tick_interval_ms)).await;
        }

        // --- Tick ---
        let Some(pulse) = clock.tick() else {
            continue;
        };
        total_pulses = total_pulses.saturating_add(1);

        // --- Check bounds (after pulse) ---
        if bounds.max_pulses > 0 && total_pulses >= bounds.max_pulses {
            info!(
                pulses = total_pulses,
                max_pulses = bounds.max_pulses,
                "Pulse limit reached"
            );
            break ClockEndReason::MaxPulsesReached;
        }
        if bounds.max_sol > 0 && pulse.mars_time().sol() >= bounds.max_sol {
            info!(
                sol = pulse.mars_time().sol(),
                max_sol = bounds.max_sol,
                "Sol limit reached"
            );
            break ClockEndReason::MaxSolReached;
        }
    };

    ClockRunResult {
        end_reason,
        total_pulses,
        final_time: clock.mars_time(),
    }
}

/// Log the end of a driver run.
pub fn log_run_end(result: &ClockRunResult, clock: &MasterClock) {
    info!(
        reason = ?result.end_reason,
        total_pulses = result.total_pulses,
        final_time = %result.final_time,
        actual_time_ratio = clock.actual_time_ratio(),
        average_pulses_per_second = clock.average_pulses_per_second(),
        "Clock run ended"
    );
    if result.total_pulses == 0 {
        warn!("Clock run ended with no pulses delivered");
    }
}
