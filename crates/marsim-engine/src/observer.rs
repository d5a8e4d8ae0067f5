//! Listeners that surface kernel activity in the log.
//!
//! [`HistoryLogger`] writes every recorded historical event as a structured
//! log line. [`SolReporter`] logs a per-settlement summary at the start of
//! each sol.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use marsim_core::activity::ActivityHost;
use marsim_core::clock::{ClockListener, ClockListenerError, ClockPulse};
use marsim_core::settlement::Settlement;
use marsim_events::{HistoricalEventListener, HistoricalRecord, HistoryListenerError};
use tracing::info;

/// Writes each recorded historical event to the log.
#[derive(Debug, Default)]
pub struct HistoryLogger {
    /// Events logged so far.
    logged: AtomicU64,
}

impl HistoryLogger {
    /// Create a logger.
    pub const fn new() -> Self {
        Self {
            logged: AtomicU64::new(0),
        }
    }

    /// Events logged so far.
    pub fn logged(&self) -> u64 {
        self.logged.load(Ordering::Relaxed)
    }
}

impl HistoricalEventListener for HistoryLogger {
    fn on_event_added(&self, record: &HistoricalRecord) -> Result<(), HistoryListenerError> {
        let event = &record.event;
        info!(
            id = %record.id,
            at = %record.timestamp,
            kind = ?event.event_type,
            category = ?event.category,
            source = event.source,
            cause = event.cause,
            settlement = event.settlement,
            location = event.location,
            "Historical event"
        );
        self.logged.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Logs settlement status whenever a new sol begins.
#[derive(Debug)]
pub struct SolReporter {
    /// Settlements to report on.
    settlements: Vec<Arc<Settlement>>,
    /// Sols reported so far.
    reported: AtomicU64,
}

impl SolReporter {
    /// Create a reporter for the given settlements.
    pub const fn new(settlements: Vec<Arc<Settlement>>) -> Self {
        Self {
            settlements,
            reported: AtomicU64::new(0),
        }
    }

    /// Sols reported so far.
    pub fn reported(&self) -> u64 {
        self.reported.load(Ordering::Relaxed)
    }
}

impl ClockListener for SolReporter {
    fn on_pulse(&self, pulse: &ClockPulse) -> Result<(), ClockListenerError> {
        if !pulse.is_new_sol() {
            return Ok(());
        }
        for settlement in &self.settlements {
            info!(
                sol = pulse.mars_time().sol(),
                settlement = settlement.name(),
                activities = settlement.group_activities(false).len(),
                active = settlement.group_activities(true).len(),
                pending_events = settlement.future_events().len(),
                "Sol report"
            );
        }
        self.reported.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn on_pause_change(&self, paused: bool, show_ui: bool) {
        info!(paused, show_ui, "Clock pause changed");
    }
}
