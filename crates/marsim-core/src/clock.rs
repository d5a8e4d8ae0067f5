//! The master clock.
//!
//! The clock is the single source of truth for simulated time. Each pulse
//! maps a slice of real elapsed time through the time ratio into a slice of
//! Mars time, advances the Mars and Earth clocks, and pushes an immutable
//! [`ClockPulse`] to every registered [`ClockListener`].
//!
//! # Design Principles
//!
//! - One logical driver calls [`MasterClock::tick`] (or
//!   [`MasterClock::advance`]). Pulse construction and delivery are
//!   serialized, so every listener sees pulses in non-decreasing time order.
//! - The listener set is a copy-on-write snapshot. Listeners may register or
//!   deregister (even from inside a callback) without blocking delivery.
//! - A listener that returns an error or panics is logged and skipped. The
//!   clock and the other listeners carry on.
//! - Real time comes from an injected [`WallClock`], never from the system
//!   directly.

use std::collections::VecDeque;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use chrono::{DateTime, TimeDelta, Utc};
use marsim_types::{HALF_SOL, MILLISECONDS_PER_MILLISOL, MarsTime, MarsTimeSource};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use crate::config::ClockConfig;
use crate::wall::WallClock;

/// Top of the doubling range: 1x, 2x, 4x ... 256x.
pub const MID_TIME_RATIO: f64 = 256.0;

/// Top of the x1.5 range (six steps above [`MID_TIME_RATIO`]).
pub const HIGH_TIME_RATIO: f64 = MID_TIME_RATIO * 11.390_625;

/// Fastest ratio reachable by [`MasterClock::increase_speed`] (six x1.25
/// steps above [`HIGH_TIME_RATIO`]).
pub const MAX_TIME_RATIO: f64 = HIGH_TIME_RATIO * 3.814_697_265_625;

/// Number of recent pulses kept for the pulse-rate figures.
const PULSE_LOG_SIZE: usize = 40;

/// Weight of the previous value in the actual-ratio moving average.
const ACTUAL_RATIO_WEIGHT: f64 = 0.9;

/// Errors that can occur during clock operations.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// The requested time ratio is zero, negative or not finite.
    #[error("invalid time ratio {ratio}: must be positive and finite")]
    InvalidTimeRatio {
        /// The rejected ratio.
        ratio: f64,
    },

    /// Invalid clock configuration.
    #[error("invalid clock configuration: {reason}")]
    InvalidConfig {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

/// Error returned by a [`ClockListener`]. Logged by the clock, never fatal.
#[derive(Debug, thiserror::Error)]
pub enum ClockListenerError {
    /// The listener could not process the pulse.
    #[error("clock listener failed: {reason}")]
    Failed {
        /// Explanation from the listener.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Pulse
// ---------------------------------------------------------------------------

/// One advance of simulated time, as delivered to listeners.
///
/// Immutable. A throttled listener receives a copy whose `elapsed` also
/// covers the pulses it skipped.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClockPulse {
    /// Monotonic pulse number, starting at 1.
    id: u64,
    /// Simulated millisols covered by this pulse.
    elapsed: f64,
    /// Mars time after the pulse.
    mars_time: MarsTime,
    /// Earth time after the pulse.
    earth_time: DateTime<Utc>,
    /// The sol differs from the previous pulse.
    is_new_sol: bool,
    /// A new sol began or the millisol crossed 500.
    is_new_half_sol: bool,
    /// The whole millisol differs from the previous pulse.
    is_new_int_millisol: bool,
    /// A new whole millisol began or the fraction crossed one half.
    is_new_half_millisol: bool,
}

impl ClockPulse {
    /// Build a pulse with no boundary flags set.
    ///
    /// The clock builds its own pulses; this is for driving schedulers and
    /// listeners directly.
    pub const fn new(
        id: u64,
        elapsed: f64,
        mars_time: MarsTime,
        earth_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            elapsed,
            mars_time,
            earth_time,
            is_new_sol: false,
            is_new_half_sol: false,
            is_new_int_millisol: false,
            is_new_half_millisol: false,
        }
    }

    /// Pulse number.
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Simulated millisols covered by this pulse.
    pub const fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Mars time after the pulse.
    pub const fn mars_time(&self) -> &MarsTime {
        &self.mars_time
    }

    /// Earth time after the pulse.
    pub const fn earth_time(&self) -> DateTime<Utc> {
        self.earth_time
    }

    /// Whether this is the first pulse of a sol.
    pub const fn is_new_sol(&self) -> bool {
        self.is_new_sol
    }

    /// Whether this pulse starts a new half sol.
    pub const fn is_new_half_sol(&self) -> bool {
        self.is_new_half_sol
    }

    /// Whether this pulse starts a new whole millisol.
    pub const fn is_new_int_millisol(&self) -> bool {
        self.is_new_int_millisol
    }

    /// Whether this pulse starts a new half millisol.
    pub const fn is_new_half_millisol(&self) -> bool {
        self.is_new_half_millisol
    }

    /// Copy of this pulse covering `extra` more millisols.
    ///
    /// Non-finite or negative `extra` is ignored.
    #[must_use]
    pub fn with_added_elapsed(&self, extra: f64) -> Self {
        let mut pulse = *self;
        if extra.is_finite() && extra > 0.0 {
            pulse.elapsed += extra;
        }
        pulse
    }
}

// ---------------------------------------------------------------------------
// Listeners
// ---------------------------------------------------------------------------

/// Receiver of clock pulses.
///
/// Callbacks run on the driver's thread, in registration order. They must
/// not call [`MasterClock::advance`] or [`MasterClock::tick`].
pub trait ClockListener: Send + Sync {
    /// Handle one pulse.
    fn on_pulse(&self, pulse: &ClockPulse) -> Result<(), ClockListenerError>;

    /// Called when the clock is paused or resumed.
    fn on_pause_change(&self, _paused: bool, _show_ui: bool) {}
}

/// Delivery bookkeeping for a throttled listener.
#[derive(Debug, Default)]
struct Throttle {
    /// Uptime of the last delivery (or of registration).
    last_delivered_ms: u64,
    /// Millisols of pulses skipped since the last delivery.
    skipped_millisols: f64,
}

/// A registered listener and its throttle state.
struct ListenerSlot {
    /// The listener.
    listener: Arc<dyn ClockListener>,
    /// Minimum uptime between deliveries; 0 delivers every pulse.
    min_interval_ms: u64,
    /// Skip bookkeeping, only touched when `min_interval_ms > 0`.
    throttle: Mutex<Throttle>,
}

impl ListenerSlot {
    /// Decide whether this pulse reaches the listener, and in what form.
    fn admit(&self, pulse: &ClockPulse, uptime_ms: u64) -> Option<ClockPulse> {
        if self.min_interval_ms == 0 {
            return Some(*pulse);
        }
        let mut throttle = self.throttle.lock();
        if uptime_ms.saturating_sub(throttle.last_delivered_ms) < self.min_interval_ms {
            throttle.skipped_millisols += pulse.elapsed;
            return None;
        }
        let delivered = pulse.with_added_elapsed(throttle.skipped_millisols);
        throttle.skipped_millisols = 0.0;
        throttle.last_delivered_ms = uptime_ms;
        Some(delivered)
    }
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Mutable clock state, guarded by one lock.
#[derive(Debug)]
struct ClockState {
    /// Current Mars time.
    mars_time: MarsTime,
    /// Current Earth time.
    earth_time: DateTime<Utc>,
    /// Id the next pulse will carry.
    next_pulse_id: u64,
    /// Requested simulated-to-real ratio.
    desired_ratio: f64,
    /// Moving average of the ratio actually achieved.
    actual_ratio: f64,
    /// Sol of the previous pulse.
    last_sol: Option<u32>,
    /// Whole millisol of the previous pulse.
    last_int_millisol: Option<u32>,
    /// Millisol of the previous pulse.
    last_millisol: f64,
    /// Real milliseconds spent running.
    uptime_ms: u64,
    /// Uptime stamps of the most recent pulses.
    pulse_log: VecDeque<u64>,
    /// Wall clock reading at the last tick or resume.
    last_stamp_ms: u64,
}

/// The simulation's master clock.
///
/// Share it as `Arc<MasterClock>`; every method takes `&self`.
pub struct MasterClock {
    /// Time, ratio and pulse bookkeeping.
    state: Mutex<ClockState>,
    /// Serializes pulse construction and delivery.
    dispatch: Mutex<()>,
    /// Copy-on-write listener snapshot.
    listeners: RwLock<Arc<Vec<Arc<ListenerSlot>>>>,
    /// Whether the clock is paused.
    paused: AtomicBool,
    /// Whether a stop has been requested.
    stop_requested: AtomicBool,
    /// Wakes the driver when resumed or stopped.
    resume_notify: Notify,
    /// Real time source.
    wall: Arc<dyn WallClock>,
    /// Largest real gap accepted between pulses.
    max_elapsed_ms: u64,
    /// Replacement width for an oversized gap, in millisols.
    nominal_pulse_millisols: f64,
}

impl fmt::Debug for MasterClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterClock")
            .field("state", &*self.state.lock())
            .field("paused", &self.is_paused())
            .field("listeners", &self.listener_count())
            .field("wall", &self.wall)
            .finish_non_exhaustive()
    }
}

impl MasterClock {
    /// Create a running clock from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidConfig`] if the configuration does not
    /// validate.
    pub fn new(config: &ClockConfig, wall: Arc<dyn WallClock>) -> Result<Self, ClockError> {
        config
            .validate()
            .map_err(|e| ClockError::InvalidConfig {
                reason: e.to_string(),
            })?;

        let mars_time = MarsTime::new(config.start_sol, config.start_millisol);
        let state = ClockState {
            mars_time,
            earth_time: config.earth_start,
            next_pulse_id: 1,
            desired_ratio: config.time_ratio,
            actual_ratio: config.time_ratio,
            last_sol: None,
            last_int_millisol: None,
            last_millisol: mars_time.millisol(),
            uptime_ms: 0,
            pulse_log: VecDeque::with_capacity(PULSE_LOG_SIZE),
            last_stamp_ms: wall.now_ms(),
        };

        info!(
            %mars_time,
            earth_time = %config.earth_start,
            time_ratio = config.time_ratio,
            "Master clock created"
        );

        Ok(Self {
            state: Mutex::new(state),
            dispatch: Mutex::new(()),
            listeners: RwLock::new(Arc::new(Vec::new())),
            paused: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
            resume_notify: Notify::new(),
            wall,
            max_elapsed_ms: config.max_elapsed_ms,
            nominal_pulse_millisols: config.nominal_pulse_millisols,
        })
    }

    // -----------------------------------------------------------------------
    // Pulses
    // -----------------------------------------------------------------------

    /// Read the wall clock and advance by the real time since the last tick.
    ///
    /// Returns the pulse delivered, or `None` while paused or when no real
    /// time has passed.
    pub fn tick(&self) -> Option<ClockPulse> {
        let now = self.wall.now_ms();
        let real_elapsed_ms = {
            let mut state = self.state.lock();
            let elapsed = now.saturating_sub(state.last_stamp_ms);
            state.last_stamp_ms = now;
            elapsed
        };
        self.advance(real_elapsed_ms)
    }

    /// Advance simulated time by `real_elapsed_ms` of real time.
    ///
    /// The simulated delta is `real_elapsed_ms * ratio / 88 775.244`
    /// millisols. A gap longer than the configured maximum is replaced by
    /// the nominal pulse. The resulting pulse is delivered to every listener
    /// before this returns.
    ///
    /// Returns `None` (and changes nothing) while paused or for a zero gap.
    pub fn advance(&self, real_elapsed_ms: u64) -> Option<ClockPulse> {
        let _dispatch = self.dispatch.lock();
        if self.is_paused() || real_elapsed_ms == 0 {
            return None;
        }

        let (pulse, uptime_ms) = self.build_pulse(real_elapsed_ms);

        if pulse.is_new_sol {
            info!(
                sol = pulse.mars_time.sol(),
                earth_time = %pulse.earth_time,
                pulse_id = pulse.id,
                "New sol"
            );
        }

        self.fire_pulse(&pulse, uptime_ms);
        Some(pulse)
    }

    /// Update clock state for one pulse and return it with the new uptime.
    fn build_pulse(&self, real_elapsed_ms: u64) -> (ClockPulse, u64) {
        let mut state = self.state.lock();

        let (real_ms, elapsed) = if real_elapsed_ms > self.max_elapsed_ms {
            warn!(
                real_elapsed_ms,
                max_elapsed_ms = self.max_elapsed_ms,
                "Real elapsed time too long, substituting a nominal pulse"
            );
            (
                self.nominal_pulse_millisols * MILLISECONDS_PER_MILLISOL / state.desired_ratio,
                self.nominal_pulse_millisols,
            )
        } else {
            let real_ms = ms_to_f64(real_elapsed_ms);
            (
                real_ms,
                real_ms * state.desired_ratio / MILLISECONDS_PER_MILLISOL,
            )
        };

        let sim_ms = elapsed * MILLISECONDS_PER_MILLISOL;
        state.actual_ratio = ACTUAL_RATIO_WEIGHT.mul_add(
            state.actual_ratio,
            (1.0 - ACTUAL_RATIO_WEIGHT) * sim_ms / real_ms,
        );

        state.uptime_ms = state.uptime_ms.saturating_add(f64_to_ms(real_ms));
        let uptime_ms = state.uptime_ms;
        state.pulse_log.push_back(uptime_ms);
        while state.pulse_log.len() > PULSE_LOG_SIZE {
            state.pulse_log.pop_front();
        }

        let mars_time = state.mars_time.add_time(elapsed);
        #[allow(clippy::cast_possible_truncation)]
        let sim_micros = (sim_ms * 1000.0) as i64;
        let earth_time = state
            .earth_time
            .checked_add_signed(TimeDelta::microseconds(sim_micros))
            .unwrap_or(state.earth_time);

        let sol = mars_time.sol();
        let millisol = mars_time.millisol();
        let int_millisol = mars_time.millisol_int();
        let is_new_sol = state.last_sol != Some(sol);
        let is_new_half_sol =
            is_new_sol || (state.last_millisol < HALF_SOL && millisol >= HALF_SOL);
        let is_new_int_millisol = is_new_sol || state.last_int_millisol != Some(int_millisol);
        let is_new_half_millisol = is_new_int_millisol
            || (state.last_millisol.fract() < 0.5 && millisol.fract() >= 0.5);

        state.last_sol = Some(sol);
        state.last_int_millisol = Some(int_millisol);
        state.last_millisol = millisol;
        state.mars_time = mars_time;
        state.earth_time = earth_time;

        let id = state.next_pulse_id;
        state.next_pulse_id = id.saturating_add(1);

        let pulse = ClockPulse {
            id,
            elapsed,
            mars_time,
            earth_time,
            is_new_sol,
            is_new_half_sol,
            is_new_int_millisol,
            is_new_half_millisol,
        };
        (pulse, uptime_ms)
    }

    /// Deliver a pulse to a snapshot of the listener set.
    fn fire_pulse(&self, pulse: &ClockPulse, uptime_ms: u64) {
        let snapshot = Arc::clone(&*self.listeners.read());
        for slot in snapshot.iter() {
            let Some(delivered) = slot.admit(pulse, uptime_ms) else {
                continue;
            };
            match catch_unwind(AssertUnwindSafe(|| slot.listener.on_pulse(&delivered))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(pulse_id = pulse.id, error = %e, "Clock listener failed");
                }
                Err(_panic) => {
                    error!(pulse_id = pulse.id, "Clock listener panicked");
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Pause / Stop
    // -----------------------------------------------------------------------

    /// Pause or resume the clock.
    ///
    /// Listeners are told only when the state actually changes. Resuming
    /// restamps the wall clock, so the next tick covers only the real time
    /// since the resume. Returns whether the state changed.
    pub fn set_paused(&self, paused: bool, show_ui: bool) -> bool {
        {
            let mut state = self.state.lock();
            if self.paused.swap(paused, Ordering::AcqRel) == paused {
                return false;
            }
            if !paused {
                state.last_stamp_ms = self.wall.now_ms();
            }
        }

        if paused {
            info!(show_ui, "Clock paused");
        } else {
            self.resume_notify.notify_one();
            info!(show_ui, "Clock resumed");
        }

        let snapshot = Arc::clone(&*self.listeners.read());
        for slot in snapshot.iter() {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                slot.listener.on_pause_change(paused, show_ui);
            }));
            if outcome.is_err() {
                error!(paused, "Clock listener panicked on pause change");
            }
        }
        true
    }

    /// Whether the clock is paused.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Ask the driver to stop after its current pulse.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
        self.resume_notify.notify_one();
    }

    /// Whether a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Wait until the clock is resumed or a stop is requested.
    ///
    /// Returns immediately if the clock is running.
    pub async fn wait_if_paused(&self) {
        while self.is_paused() && !self.is_stop_requested() {
            self.resume_notify.notified().await;
        }
    }

    // -----------------------------------------------------------------------
    // Time Ratio
    // -----------------------------------------------------------------------

    /// Set the simulated-to-real time ratio for future pulses.
    ///
    /// Returns the previous ratio.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidTimeRatio`] if `ratio` is not a positive
    /// finite number; the current ratio is kept.
    pub fn set_time_ratio(&self, ratio: f64) -> Result<f64, ClockError> {
        if !ratio.is_finite() || ratio <= 0.0 {
            return Err(ClockError::InvalidTimeRatio { ratio });
        }
        let prev = std::mem::replace(&mut self.state.lock().desired_ratio, ratio);
        info!(prev, ratio, "Time ratio changed");
        Ok(prev)
    }

    /// The requested time ratio.
    pub fn time_ratio(&self) -> f64 {
        self.state.lock().desired_ratio
    }

    /// Moving average of the time ratio actually achieved.
    pub fn actual_time_ratio(&self) -> f64 {
        self.state.lock().actual_ratio
    }

    /// Step the time ratio up one notch. Returns the new ratio.
    ///
    /// Doubles up to [`MID_TIME_RATIO`], then grows by x1.5 up to
    /// [`HIGH_TIME_RATIO`], then by x1.25, capped at [`MAX_TIME_RATIO`].
    pub fn increase_speed(&self) -> f64 {
        let mut state = self.state.lock();
        let current = state.desired_ratio;
        let next = if current >= MAX_TIME_RATIO {
            current
        } else if current >= HIGH_TIME_RATIO {
            (current * 1.25).min(MAX_TIME_RATIO)
        } else if current >= MID_TIME_RATIO {
            current * 1.5
        } else {
            current * 2.0
        };
        state.desired_ratio = next;
        debug!(ratio = next, "Speed increased");
        next
    }

    /// Step the time ratio down one notch, never below 1. Returns the new
    /// ratio.
    pub fn decrease_speed(&self) -> f64 {
        let mut state = self.state.lock();
        let current = state.desired_ratio;
        let next = if current > HIGH_TIME_RATIO {
            current / 1.25
        } else if current > MID_TIME_RATIO {
            current / 1.5
        } else {
            current / 2.0
        }
        .max(1.0);
        state.desired_ratio = next;
        debug!(ratio = next, "Speed decreased");
        next
    }

    // -----------------------------------------------------------------------
    // Listeners
    // -----------------------------------------------------------------------

    /// Register a listener for every pulse.
    ///
    /// Returns `false` if the listener was already registered.
    pub fn add_listener(&self, listener: Arc<dyn ClockListener>) -> bool {
        self.add_listener_throttled(listener, 0)
    }

    /// Register a listener that wants at most one pulse per
    /// `min_interval_ms` of clock uptime.
    ///
    /// Skipped pulses are not lost: their elapsed millisols are added to the
    /// next pulse delivered. Returns `false` if the listener was already
    /// registered.
    pub fn add_listener_throttled(
        &self,
        listener: Arc<dyn ClockListener>,
        min_interval_ms: u64,
    ) -> bool {
        let uptime_ms = self.state.lock().uptime_ms;
        let mut guard = self.listeners.write();
        if guard.iter().any(|s| Arc::ptr_eq(&s.listener, &listener)) {
            return false;
        }
        let slot = Arc::new(ListenerSlot {
            listener,
            min_interval_ms,
            throttle: Mutex::new(Throttle {
                last_delivered_ms: uptime_ms,
                skipped_millisols: 0.0,
            }),
        });
        let mut next = Vec::with_capacity(guard.len().saturating_add(1));
        next.extend(guard.iter().cloned());
        next.push(slot);
        *guard = Arc::new(next);
        true
    }

    /// Deregister a listener. Unknown listeners are ignored.
    ///
    /// Returns `true` if the listener was registered.
    pub fn remove_listener(&self, listener: &Arc<dyn ClockListener>) -> bool {
        let mut guard = self.listeners.write();
        if !guard.iter().any(|s| Arc::ptr_eq(&s.listener, listener)) {
            return false;
        }
        let next: Vec<_> = guard
            .iter()
            .filter(|s| !Arc::ptr_eq(&s.listener, listener))
            .cloned()
            .collect();
        *guard = Arc::new(next);
        true
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    // -----------------------------------------------------------------------
    // Readouts
    // -----------------------------------------------------------------------

    /// Current Mars time.
    pub fn mars_time(&self) -> MarsTime {
        self.state.lock().mars_time
    }

    /// Current Earth time.
    pub fn earth_time(&self) -> DateTime<Utc> {
        self.state.lock().earth_time
    }

    /// Number of pulses produced so far.
    pub fn pulse_count(&self) -> u64 {
        self.state.lock().next_pulse_id.saturating_sub(1)
    }

    /// Real milliseconds the clock has spent running.
    pub fn uptime_ms(&self) -> u64 {
        self.state.lock().uptime_ms
    }

    /// Pulse rate implied by the gap between the last two pulses.
    ///
    /// Zero until two pulses have been produced.
    pub fn current_pulses_per_second(&self) -> f64 {
        let state = self.state.lock();
        let mut recent = state.pulse_log.iter().rev();
        match (recent.next(), recent.next()) {
            (Some(&last), Some(&prev)) if last > prev => {
                1000.0 / ms_to_f64(last.saturating_sub(prev))
            }
            _ => 0.0,
        }
    }

    /// Pulse rate averaged over the last 40 pulses.
    ///
    /// Zero until two pulses have been produced.
    pub fn average_pulses_per_second(&self) -> f64 {
        let state = self.state.lock();
        let gaps = u64::try_from(state.pulse_log.len().saturating_sub(1)).unwrap_or(0);
        match (state.pulse_log.front(), state.pulse_log.back()) {
            (Some(&first), Some(&last)) if last > first => {
                ms_to_f64(gaps) * 1000.0 / ms_to_f64(last.saturating_sub(first))
            }
            _ => 0.0,
        }
    }
}

impl MarsTimeSource for MasterClock {
    fn mars_time(&self) -> MarsTime {
        Self::mars_time(self)
    }
}

/// Time source that reads a clock without keeping it alive.
///
/// Hand this to components the clock's own listeners hold on to, such as a
/// history log, so the clock and its listeners do not own each other. Once
/// the clock is dropped the last time read is returned.
#[derive(Debug)]
pub struct ClockTimeSource {
    clock: Weak<MasterClock>,
    last: Mutex<MarsTime>,
}

impl ClockTimeSource {
    /// Create a source reading `clock`.
    pub fn new(clock: &Arc<MasterClock>) -> Self {
        Self {
            clock: Arc::downgrade(clock),
            last: Mutex::new(clock.mars_time()),
        }
    }
}

impl MarsTimeSource for ClockTimeSource {
    fn mars_time(&self) -> MarsTime {
        let mut last = self.last.lock();
        if let Some(clock) = self.clock.upgrade() {
            *last = clock.mars_time();
        }
        *last
    }
}

#[allow(clippy::cast_precision_loss)]
const fn ms_to_f64(ms: u64) -> f64 {
    ms as f64
}

/// Round a non-negative millisecond figure to the nearest whole
/// millisecond. Negative and NaN input give 0.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
const fn f64_to_ms(ms: f64) -> u64 {
    (ms + 0.5) as u64
}
