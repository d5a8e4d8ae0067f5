//! Simulated Mars time.
//!
//! [`MarsTime`] is an immutable timestamp made of a sol (a Mars day) and the
//! fractional millisol within that sol. It is the single ordering key used by
//! the scheduler and the history log.
//!
//! # Invariants
//!
//! - `millisol` is always in `[0, 1000)`; overflow rolls into `sol`.
//! - Arithmetic never fails: negative results clamp at sol 0, millisol 0,
//!   and non-finite deltas are ignored.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of millisols in one sol.
pub const MILLISOLS_PER_SOL: f64 = 1000.0;

/// Earth seconds in one millisol.
pub const SECONDS_PER_MILLISOL: f64 = 88.775_244;

/// Earth milliseconds in one millisol.
pub const MILLISECONDS_PER_MILLISOL: f64 = SECONDS_PER_MILLISOL * 1000.0;

/// Half a sol, the boundary used for half-sol notifications.
pub const HALF_SOL: f64 = 500.0;

/// A point on the simulated Mars timeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(from = "RawMarsTime")]
pub struct MarsTime {
    /// Mission sol (day index).
    sol: u32,
    /// Position within the sol, in `[0, 1000)`.
    millisol: f64,
}

/// Unvalidated wire form; normalized on deserialization.
#[derive(Deserialize)]
struct RawMarsTime {
    sol: u32,
    millisol: f64,
}

impl From<RawMarsTime> for MarsTime {
    fn from(raw: RawMarsTime) -> Self {
        Self::new(raw.sol, raw.millisol)
    }
}

impl MarsTime {
    /// The start of the timeline.
    pub const ZERO: Self = Self {
        sol: 0,
        millisol: 0.0,
    };

    /// Create a timestamp, normalizing `millisol` into `[0, 1000)`.
    ///
    /// A `millisol` of 1250 on sol 3 becomes sol 4, millisol 250.
    pub fn new(sol: u32, millisol: f64) -> Self {
        Self::from_total_millisols(
            f64::from(sol)
                .mul_add(MILLISOLS_PER_SOL, if millisol.is_finite() { millisol } else { 0.0 }),
        )
    }

    /// Create a timestamp from a millisol count since sol 0.
    ///
    /// Negative or non-finite input yields [`MarsTime::ZERO`].
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_total_millisols(total: f64) -> Self {
        if !total.is_finite() || total <= 0.0 {
            return Self::ZERO;
        }
        let sol_f = (total / MILLISOLS_PER_SOL).floor();
        let mut sol = sol_f as u32;
        let mut millisol = f64::from(sol).mul_add(-MILLISOLS_PER_SOL, total);

        // Rounding in the division can leave the remainder a hair outside
        // the half-open range.
        if millisol < 0.0 {
            sol = sol.saturating_sub(1);
            millisol = f64::from(sol).mul_add(-MILLISOLS_PER_SOL, total).max(0.0);
        } else if millisol >= MILLISOLS_PER_SOL {
            sol = sol.saturating_add(1);
            millisol = f64::from(sol).mul_add(-MILLISOLS_PER_SOL, total).max(0.0);
        }

        Self { sol, millisol }
    }

    /// Return the mission sol.
    pub const fn sol(&self) -> u32 {
        self.sol
    }

    /// Return the fractional millisol within the sol.
    pub const fn millisol(&self) -> f64 {
        self.millisol
    }

    /// Return the whole millisol within the sol (0-999).
    ///
    /// The millisol is never negative, so truncation is the floor.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub const fn millisol_int(&self) -> u32 {
        self.millisol as u32
    }

    /// Return the number of millisols since sol 0.
    pub fn total_millisols(&self) -> f64 {
        f64::from(self.sol).mul_add(MILLISOLS_PER_SOL, self.millisol)
    }

    /// Return a new timestamp `millisols` later (or earlier when negative).
    #[must_use]
    pub fn add_time(&self, millisols: f64) -> Self {
        if !millisols.is_finite() {
            return *self;
        }
        Self::from_total_millisols(self.total_millisols() + millisols)
    }

    /// Return `self - other` in millisols.
    pub fn time_diff(&self, other: &Self) -> f64 {
        self.total_millisols() - other.total_millisols()
    }

    /// Whether this timestamp is strictly earlier than `other`.
    pub fn is_before(&self, other: &Self) -> bool {
        self < other
    }

    /// Whether this timestamp is strictly later than `other`.
    pub fn is_after(&self, other: &Self) -> bool {
        self > other
    }

    /// Whether this timestamp falls in the second half of its sol.
    pub fn is_afternoon(&self) -> bool {
        self.millisol >= HALF_SOL
    }
}

impl Default for MarsTime {
    fn default() -> Self {
        Self::ZERO
    }
}

impl PartialEq for MarsTime {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MarsTime {}

impl PartialOrd for MarsTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MarsTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sol
            .cmp(&other.sol)
            .then_with(|| self.millisol.total_cmp(&other.millisol))
    }
}

impl fmt::Display for MarsTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sol {} {:07.3}", self.sol, self.millisol)
    }
}

/// Anything that can report the current simulated time.
///
/// The master clock implements this so that subsystems outside the clock's
/// crate (such as the history log) can timestamp from the same timeline.
pub trait MarsTimeSource: Send + Sync {
    /// Return the current simulated time.
    fn mars_time(&self) -> MarsTime;
}
