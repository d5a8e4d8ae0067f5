//! Real-time sources for the master clock.
//!
//! The clock never reads the system time directly. It asks a [`WallClock`]
//! for a monotonic millisecond stamp, which lets tests drive it with a
//! [`ManualWallClock`] instead of sleeping.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// A monotonic source of real elapsed milliseconds.
pub trait WallClock: Send + Sync + fmt::Debug {
    /// Milliseconds since an arbitrary fixed origin. Never decreases.
    fn now_ms(&self) -> u64;
}

/// Wall clock backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemWallClock {
    /// Fixed origin captured at construction.
    origin: Instant,
}

impl SystemWallClock {
    /// Create a wall clock whose origin is now.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemWallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl WallClock for SystemWallClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Wall clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualWallClock {
    /// Current stamp in milliseconds.
    now: AtomicU64,
}

impl ManualWallClock {
    /// Create a manual clock at the given stamp.
    pub const fn new(start_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ms),
        }
    }

    /// Move the clock forward by `ms`. Returns the new stamp.
    pub fn advance(&self, ms: u64) -> u64 {
        let prev = self
            .now
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                Some(n.saturating_add(ms))
            })
            .unwrap_or_else(|n| n);
        prev.saturating_add(ms)
    }

    /// Set the stamp. Values earlier than the current stamp are ignored.
    pub fn set(&self, ms: u64) {
        self.now.fetch_max(ms, Ordering::AcqRel);
    }
}

impl WallClock for ManualWallClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::Acquire)
    }
}
