//! Recurring group activities.
//!
//! A [`GroupActivity`] is a self-rescheduling [`ScheduledEventHandler`]
//! that walks a small state machine every time it comes due:
//!
//! ```text
//! Unscheduled --construct-----------------> Scheduled
//! Scheduled   --venue found---------------> Pending    (wait_duration)
//! Scheduled   --no venue------------------> Scheduled  (one sol)
//! Pending     ----------------------------> Active     (activity_duration)
//! Active      --sol_frequency > 0---------> Scheduled  (until next local start)
//! Active      --sol_frequency <= 0--------> Done       (0)
//! ```
//!
//! Start times are local: an activity defined to start at millisol 500 fires
//! at local midday for its host's longitude, not at midday on the prime
//! meridian.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use marsim_events::{HistoricalEvent, HistoricalEventManager};
use marsim_types::{
    ActivityId, ActivityState, BuildingCategory, Coordinates, HistoricalEventType, MarsTime,
    TaskScope, Venue,
};
use parking_lot::Mutex;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::ConfigError;
use crate::scheduler::{FutureEventQueue, ScheduledEventHandler};

/// Millisols in a sol, as the integer the queue deals in.
const SOL: i64 = 1000;

/// Delay before retrying when no venue is available.
pub const NO_VENUE_RETRY: i32 = 1000;

/// The domain that owns a group activity: its queue, location and buildings.
pub trait ActivityHost: Send + Sync {
    /// Display name.
    fn name(&self) -> &str;

    /// The queue the activity schedules itself on.
    fn future_events(&self) -> &FutureEventQueue;

    /// Surface location.
    fn coordinates(&self) -> Coordinates;

    /// Buildings of the given category.
    fn venues(&self, category: BuildingCategory) -> Vec<Venue>;

    /// Where to report notable transitions, if anywhere.
    fn event_manager(&self) -> Option<&HistoricalEventManager>;

    /// Local time-zone offset in millisols.
    fn time_zone_offset(&self) -> u32 {
        time_zone_offset(&self.coordinates())
    }
}

/// Time-zone offset, in millisols, for a longitude.
///
/// The planet is split into 100 zones of 10 millisols each, counted
/// eastward from the prime meridian.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn time_zone_offset(coordinates: &Coordinates) -> u32 {
    let zone = (coordinates.rotation_fraction() * 100.0).floor() as u32;
    zone.min(99).saturating_mul(10)
}

/// Definition of a group activity, as loaded from configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GroupActivityInfo {
    /// Display name.
    pub name: String,

    /// Local millisol at which participants start gathering.
    #[serde(default)]
    pub start_time: u32,

    /// Sols after construction before the first occurrence.
    #[serde(default)]
    pub first_sol: u32,

    /// Millisols spent gathering before the activity starts.
    #[serde(default = "default_wait_duration")]
    pub wait_duration: u32,

    /// Millisols the activity lasts.
    #[serde(default = "default_activity_duration")]
    pub activity_duration: u32,

    /// Sols between occurrences; zero or negative means one-off.
    #[serde(default)]
    pub sol_frequency: i32,

    /// Fraction of the population eligible to take part.
    #[serde(default = "default_percent_pop")]
    pub percent_pop: f64,

    /// Priority score offered to participants.
    #[serde(default = "default_score")]
    pub score: f64,

    /// Which part of the working day participants come from.
    #[serde(default = "default_scope")]
    pub scope: TaskScope,

    /// Building category that hosts the activity.
    pub place: BuildingCategory,
}

impl GroupActivityInfo {
    /// Check the definition for out-of-range values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                reason: "activity name must not be empty".to_owned(),
            });
        }
        if self.start_time >= 1000 {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "activity '{}': start_time must be below 1000, got {}",
                    self.name, self.start_time
                ),
            });
        }
        if !(0.0..=1.0).contains(&self.percent_pop) {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "activity '{}': percent_pop must be in [0, 1], got {}",
                    self.name, self.percent_pop
                ),
            });
        }
        if !self.score.is_finite() {
            return Err(ConfigError::Invalid {
                reason: format!("activity '{}': score must be finite", self.name),
            });
        }
        Ok(())
    }

    /// Whether the activity recurs.
    pub const fn is_recurring(&self) -> bool {
        self.sol_frequency > 0
    }
}

const fn default_wait_duration() -> u32 {
    50
}

const fn default_activity_duration() -> u32 {
    100
}

const fn default_percent_pop() -> f64 {
    1.0
}

const fn default_score() -> f64 {
    100.0
}

const fn default_scope() -> TaskScope {
    TaskScope::AnyHour
}

/// Mutable part of an activity.
#[derive(Debug)]
struct ActivityInner {
    /// Current state.
    state: ActivityState,
    /// Venue picked for the current occurrence.
    meeting_place: Option<Venue>,
}

/// A history entry to report once the state lock is released.
struct Report {
    /// What happened.
    event_type: HistoricalEventType,
    /// Why.
    cause: &'static str,
}

/// A scheduled, possibly recurring, group activity.
pub struct GroupActivity {
    /// Unique identifier.
    id: ActivityId,
    /// Definition.
    info: GroupActivityInfo,
    /// Owning domain. Held weakly; a dropped host cancels the activity.
    host: Weak<dyn ActivityHost>,
    /// Host name, kept for logs after the host is gone.
    host_name: String,
    /// Start time shifted to the prime meridian, in `[0, 1000)`.
    global_start: i64,
    /// State and venue.
    inner: Mutex<ActivityInner>,
    /// Set by [`GroupActivity::cancel`].
    cancelled: AtomicBool,
}

impl std::fmt::Debug for GroupActivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupActivity")
            .field("id", &self.id)
            .field("name", &self.info.name)
            .field("host", &self.host_name)
            .field("inner", &*self.inner.lock())
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl GroupActivity {
    /// Create an activity and register its first occurrence on the host's
    /// queue.
    ///
    /// The first due time is the definition's local start time on sol
    /// `now.sol() + first_sol`, moved forward one sol if that instant has
    /// already passed.
    ///
    /// The host's queue only holds the activity weakly, so the caller must
    /// keep the returned handle alive for as long as it should keep running.
    pub fn new(
        info: GroupActivityInfo,
        host: &Arc<dyn ActivityHost>,
        now: &MarsTime,
    ) -> Arc<Self> {
        let offset = host.time_zone_offset();
        let global_start = i64::from(info.start_time)
            .saturating_sub(i64::from(offset))
            .rem_euclid(SOL);

        let activity = Arc::new(Self {
            id: ActivityId::new(),
            host: Arc::downgrade(host),
            host_name: host.name().to_owned(),
            global_start,
            info,
            inner: Mutex::new(ActivityInner {
                state: ActivityState::Unscheduled,
                meeting_place: None,
            }),
            cancelled: AtomicBool::new(false),
        });

        let first = activity.first_interval(now);
        let weak: Weak<Self> = Arc::downgrade(&activity);
        let handler: Weak<dyn ScheduledEventHandler> = weak;
        // Scheduled before queued, so a pass that fires the entry at once
        // sees a live activity.
        activity.inner.lock().state = ActivityState::Scheduled;
        host.future_events()
            .add_event_in(now, f64::from(first), handler);

        info!(
            activity = activity.info.name,
            settlement = activity.host_name,
            time_zone_offset = offset,
            first_due = %now.add_time(f64::from(first)),
            "Group activity scheduled"
        );
        activity
    }

    /// Millisols from `now` until the first occurrence.
    ///
    /// Zero when `now` is exactly the start time of the first sol.
    fn first_interval(&self, now: &MarsTime) -> i32 {
        let interval = i64::from(self.info.first_sol)
            .saturating_mul(SOL)
            .saturating_add(self.global_start)
            .saturating_sub(i64::from(now.millisol_int()));
        let interval = if interval < 0 {
            interval.saturating_add(SOL)
        } else {
            interval
        };
        i32::try_from(interval.max(0)).unwrap_or(i32::MAX)
    }

    /// Millisols from `now` until the next occurrence of a recurring
    /// activity.
    fn next_occurrence(&self, now: &MarsTime) -> i32 {
        let to_start = self
            .global_start
            .saturating_sub(i64::from(now.millisol_int()))
            .rem_euclid(SOL);
        let extra_sols = i64::from(self.info.sol_frequency)
            .saturating_sub(1)
            .max(0)
            .saturating_mul(SOL);
        let interval = to_start.saturating_add(extra_sols);
        clamp_delay(if interval == 0 { SOL } else { interval })
    }

    /// Pick the largest life-supported venue of the right category.
    ///
    /// Equal capacities go to the lowest building id.
    fn select_venue(&self, host: &dyn ActivityHost) -> Option<Venue> {
        host.venues(self.info.place)
            .into_iter()
            .filter(|v| v.has_life_support && v.category == self.info.place)
            .max_by(|a, b| a.capacity.cmp(&b.capacity).then_with(|| b.id.cmp(&a.id)))
    }

    /// Stop the activity. Takes effect the next time it comes due.
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::AcqRel) {
            info!(
                activity = self.info.name,
                settlement = self.host_name,
                "Group activity cancelled"
            );
        }
    }

    /// Whether [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Unique identifier.
    pub const fn id(&self) -> ActivityId {
        self.id
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// The definition this activity was built from.
    pub const fn info(&self) -> &GroupActivityInfo {
        &self.info
    }

    /// Name of the owning settlement.
    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    /// Current state.
    pub fn state(&self) -> ActivityState {
        self.inner.lock().state
    }

    /// Whether participants are gathering or the activity is under way.
    pub fn is_active(&self) -> bool {
        matches!(self.state(), ActivityState::Pending | ActivityState::Active)
    }

    /// The venue picked for the current occurrence.
    pub fn meeting_place(&self) -> Option<Venue> {
        self.inner.lock().meeting_place.clone()
    }

    /// Report a transition to the host's history log.
    fn report(
        &self,
        host: Option<&Arc<dyn ActivityHost>>,
        report: &Report,
        now: &MarsTime,
        venue: Option<&Venue>,
    ) {
        let Some(manager) = host.and_then(|h| h.event_manager()) else {
            return;
        };
        let mut event =
            HistoricalEvent::new(report.event_type, self.info.name.as_str(), report.cause)
                .with_context(format!("Sol {}", now.sol()))
                .with_subject(self.info.name.as_str())
                .with_settlement(self.host_name.as_str());
        if let Some(venue) = venue {
            event = event.with_location(venue.name.as_str());
        }
        manager.register_new_event(event);
    }
}

impl ScheduledEventHandler for GroupActivity {
    fn event_description(&self) -> String {
        format!(
            "Group activity '{}' at {} ({})",
            self.info.name,
            self.host_name,
            self.state().label()
        )
    }

    fn execute(&self, now: &MarsTime) -> i32 {
        let host = self.host.upgrade();
        let mut inner = self.inner.lock();
        let from = inner.state;

        if (self.is_cancelled() || host.is_none())
            && !matches!(from, ActivityState::Done | ActivityState::Unscheduled)
        {
            inner.state = ActivityState::Done;
            inner.meeting_place = None;
            drop(inner);
            info!(
                activity = self.info.name,
                settlement = self.host_name,
                host_dropped = host.is_none(),
                "Group activity stopped"
            );
            return 0;
        }

        let (to, delay, report) = match from {
            ActivityState::Scheduled => {
                match host.as_deref().and_then(|h| self.select_venue(h)) {
                    Some(venue) => {
                        inner.meeting_place = Some(venue);
                        (
                            ActivityState::Pending,
                            clamp_delay(i64::from(self.info.wait_duration)),
                            Some(Report {
                                event_type: HistoricalEventType::ActivityGathering,
                                cause: "Scheduled start",
                            }),
                        )
                    }
                    None => (
                        ActivityState::Scheduled,
                        NO_VENUE_RETRY,
                        Some(Report {
                            event_type: HistoricalEventType::ActivityDeferred,
                            cause: "No venue available",
                        }),
                    ),
                }
            }
            ActivityState::Pending => (
                ActivityState::Active,
                clamp_delay(i64::from(self.info.activity_duration)),
                Some(Report {
                    event_type: HistoricalEventType::ActivityStarted,
                    cause: "Participants gathered",
                }),
            ),
            ActivityState::Active => {
                let finished = Some(Report {
                    event_type: HistoricalEventType::ActivityFinished,
                    cause: "Scheduled end",
                });
                if self.info.is_recurring() {
                    (ActivityState::Scheduled, self.next_occurrence(now), finished)
                } else {
                    (ActivityState::Done, 0, finished)
                }
            }
            ActivityState::Done | ActivityState::Unscheduled => {
                drop(inner);
                warn!(
                    activity = self.info.name,
                    state = from.label(),
                    "Group activity executed in a terminal state"
                );
                return 0;
            }
        };

        inner.state = to;
        // The venue of the occurrence just ended is reported, then released.
        let venue = if to == ActivityState::Pending || to == ActivityState::Active {
            inner.meeting_place.clone()
        } else {
            inner.meeting_place.take()
        };
        drop(inner);

        debug!(
            activity = self.info.name,
            settlement = self.host_name,
            from = from.label(),
            to = to.label(),
            delay,
            %now,
            "Group activity transition"
        );
        if let Some(report) = report {
            self.report(host.as_ref(), &report, now, venue.as_ref());
        }
        delay
    }
}

/// Clamp a millisol interval into a positive queue delay.
fn clamp_delay(interval: i64) -> i32 {
    i32::try_from(interval.max(1)).unwrap_or(i32::MAX)
}
