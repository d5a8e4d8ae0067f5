//! Settlements: the domains that own a future-event queue and the group
//! activities scheduled on it.
//!
//! A [`Settlement`] is registered with the master clock as a
//! [`ClockListener`]. Every pulse it receives is forwarded to its
//! [`FutureEventQueue`], which runs whatever came due.

use std::sync::Arc;

use marsim_events::HistoricalEventManager;
use marsim_types::{
    ActivityState, BuildingCategory, BuildingId, Coordinates, MarsTime, SettlementId, Venue,
};
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::activity::{ActivityHost, GroupActivity, GroupActivityInfo};
use crate::clock::{ClockListener, ClockListenerError, ClockPulse};
use crate::config::SettlementConfig;
use crate::scheduler::FutureEventQueue;

/// A settlement on the surface.
pub struct Settlement {
    /// Unique identifier.
    id: SettlementId,
    /// Display name.
    name: String,
    /// Surface location.
    coordinates: Coordinates,
    /// Buildings that can host activities.
    venues: RwLock<Vec<Venue>>,
    /// Handlers scheduled against simulated time.
    queue: FutureEventQueue,
    /// Shared history log, if reporting is enabled.
    history: Option<Arc<HistoricalEventManager>>,
    /// Strong handles for the activities on `queue`, which only holds them
    /// weakly.
    activities: RwLock<Vec<Arc<GroupActivity>>>,
}

impl std::fmt::Debug for Settlement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settlement")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("coordinates", &self.coordinates)
            .field("pending_events", &self.queue.len())
            .field("activities", &self.activities.read().len())
            .finish_non_exhaustive()
    }
}

impl Settlement {
    /// Create an empty settlement.
    pub fn new(
        name: impl Into<String>,
        coordinates: Coordinates,
        history: Option<Arc<HistoricalEventManager>>,
    ) -> Arc<Self> {
        let name = name.into();
        Arc::new(Self {
            id: SettlementId::new(),
            queue: FutureEventQueue::new(name.as_str()),
            name,
            coordinates,
            venues: RwLock::new(Vec::new()),
            history,
            activities: RwLock::new(Vec::new()),
        })
    }

    /// Create a settlement and its buildings from configuration.
    pub fn from_config(
        config: &SettlementConfig,
        history: Option<Arc<HistoricalEventManager>>,
    ) -> Arc<Self> {
        let settlement = Self::new(config.name.as_str(), config.coordinates, history);
        for venue in &config.venues {
            settlement.add_venue(Venue {
                id: BuildingId::new(),
                name: venue.name.clone(),
                category: venue.category,
                capacity: venue.capacity,
                has_life_support: venue.has_life_support,
            });
        }
        info!(
            settlement = settlement.name,
            venues = config.venues.len(),
            time_zone_offset = settlement.time_zone_offset(),
            "Settlement created"
        );
        settlement
    }

    /// Unique identifier.
    pub const fn id(&self) -> SettlementId {
        self.id
    }

    /// Add a building.
    pub fn add_venue(&self, venue: Venue) {
        self.venues.write().push(venue);
    }

    /// Every building, in insertion order.
    pub fn all_venues(&self) -> Vec<Venue> {
        self.venues.read().clone()
    }

    /// Schedule a group activity here.
    ///
    /// The settlement keeps the returned activity alive until it finishes.
    pub fn schedule_activity(
        self: &Arc<Self>,
        info: GroupActivityInfo,
        now: &MarsTime,
    ) -> Arc<GroupActivity> {
        let host: Arc<dyn ActivityHost> = Arc::clone(self) as Arc<dyn ActivityHost>;
        let activity = GroupActivity::new(info, &host, now);
        self.activities.write().push(Arc::clone(&activity));
        activity
    }

    /// Schedule every activity in `infos`.
    pub fn schedule_activities(self: &Arc<Self>, infos: &[GroupActivityInfo], now: &MarsTime) {
        for info in infos {
            self.schedule_activity(info.clone(), now);
        }
    }

    /// Group activities that have not finished.
    ///
    /// With `just_active`, only those gathering or under way.
    pub fn group_activities(&self, just_active: bool) -> Vec<Arc<GroupActivity>> {
        self.activities
            .read()
            .iter()
            .filter(|a| a.state() != ActivityState::Done)
            .filter(|a| !just_active || a.is_active())
            .cloned()
            .collect()
    }

    /// Cancel the activity named `name`. Returns whether one was found.
    pub fn cancel_activity(&self, name: &str) -> bool {
        let activities = self.activities.read();
        let mut found = false;
        for activity in activities.iter().filter(|a| a.name() == name) {
            activity.cancel();
            found = true;
        }
        found
    }

    /// Release finished activities.
    fn prune_finished(&self) {
        let mut activities = self.activities.write();
        let before = activities.len();
        activities.retain(|a| a.state() != ActivityState::Done);
        let removed = before.saturating_sub(activities.len());
        if removed > 0 {
            debug!(settlement = self.name, removed, "Released finished activities");
        }
    }
}

impl ActivityHost for Settlement {
    fn name(&self) -> &str {
        &self.name
    }

    fn future_events(&self) -> &FutureEventQueue {
        &self.queue
    }

    fn coordinates(&self) -> Coordinates {
        self.coordinates
    }

    fn venues(&self, category: BuildingCategory) -> Vec<Venue> {
        self.venues
            .read()
            .iter()
            .filter(|v| v.category == category)
            .cloned()
            .collect()
    }

    fn event_manager(&self) -> Option<&HistoricalEventManager> {
        self.history.as_deref()
    }
}

impl ClockListener for Settlement {
    fn on_pulse(&self, pulse: &ClockPulse) -> Result<(), ClockListenerError> {
        let executed = self.queue.time_passing(pulse);
        if executed > 0 {
            self.prune_finished();
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::f64::consts::{FRAC_PI_2, PI};

    use chrono::Utc;
    use marsim_events::HistoryConfig;
    use marsim_types::{HistoricalEventType, MarsTimeSource, TaskScope};

    use super::*;
    use crate::config::VenueConfig;

    struct FixedTime(MarsTime);

    impl MarsTimeSource for FixedTime {
        fn mars_time(&self) -> MarsTime {
            self.0
        }
    }

    fn config(theta: f64) -> SettlementConfig {
        SettlementConfig {
            name: "Schiaparelli Point".to_owned(),
            coordinates: Coordinates::new(FRAC_PI_2, theta),
            venues: vec![
                VenueConfig {
                    name: "Command Hub".to_owned(),
                    category: BuildingCategory::Command,
                    capacity: 12,
                    has_life_support: true,
                },
                VenueConfig {
                    name: "Lander Hab".to_owned(),
                    category: BuildingCategory::Living,
                    capacity: 8,
                    has_life_support: true,
                },
            ],
        }
    }

    fn history() -> Arc<HistoricalEventManager> {
        Arc::new(HistoricalEventManager::new(
            Arc::new(FixedTime(MarsTime::new(1, 0.0))),
            HistoryConfig::default(),
        ))
    }

    fn meeting(name: &str, sol_frequency: i32) -> GroupActivityInfo {
        GroupActivityInfo {
            name: name.to_owned(),
            start_time: 500,
            first_sol: 0,
            wait_duration: 50,
            activity_duration: 200,
            sol_frequency,
            percent_pop: 1.0,
            score: 100.0,
            scope: TaskScope::AnyHour,
            place: BuildingCategory::Command,
        }
    }

    fn pulse_at(id: u64, sol: u32, millisol: f64) -> ClockPulse {
        ClockPulse::new(id, 1.0, MarsTime::new(sol, millisol), Utc::now())
    }

    #[test]
    fn from_config_builds_venues() {
        let settlement = Settlement::from_config(&config(0.0), None);
        assert_eq!(settlement.name(), "Schiaparelli Point");
        assert_eq!(settlement.all_venues().len(), 2);
        assert_eq!(settlement.venues(BuildingCategory::Command).len(), 1);
        assert_eq!(
            settlement
                .venues(BuildingCategory::Command)
                .first()
                .unwrap()
                .name,
            "Command Hub"
        );
        assert!(settlement.event_manager().is_none());
    }

    #[test]
    fn time_zone_follows_longitude() {
        let settlement = Settlement::from_config(&config(PI), None);
        assert_eq!(settlement.time_zone_offset(), 500);
    }

    #[test]
    fn pulses_drive_the_activity_cycle() {
        let history = history();
        let settlement = Settlement::from_config(&config(0.0), Some(Arc::clone(&history)));
        let activity =
            settlement.schedule_activity(meeting("Sol Meeting", 1), &MarsTime::new(1, 100.0));

        settlement.on_pulse(&pulse_at(1, 1, 499.0)).unwrap();
        assert_eq!(activity.state(), ActivityState::Scheduled);
        assert!(settlement.group_activities(true).is_empty());

        settlement.on_pulse(&pulse_at(2, 1, 500.5)).unwrap();
        assert_eq!(activity.state(), ActivityState::Pending);
        assert_eq!(settlement.group_activities(true).len(), 1);

        settlement.on_pulse(&pulse_at(3, 1, 551.0)).unwrap();
        assert_eq!(activity.state(), ActivityState::Active);

        settlement.on_pulse(&pulse_at(4, 1, 751.0)).unwrap();
        assert_eq!(activity.state(), ActivityState::Scheduled);
        assert!(settlement.group_activities(true).is_empty());
        assert_eq!(settlement.group_activities(false).len(), 1);
        assert_eq!(
            settlement.future_events().next_due(),
            Some(MarsTime::new(2, 500.0))
        );

        let latest = history.latest().unwrap();
        assert_eq!(latest.event.event_type, HistoricalEventType::ActivityFinished);
        assert_eq!(latest.event.settlement, "Schiaparelli Point");
        assert_eq!(latest.event.location, "Command Hub");
    }

    #[test]
    fn finished_one_off_is_released() {
        let settlement = Settlement::from_config(&config(0.0), None);
        let activity =
            settlement.schedule_activity(meeting("Landing Day", 0), &MarsTime::new(1, 100.0));
        for (id, millisol) in [(1, 500.0), (2, 550.0), (3, 750.0)] {
            settlement.on_pulse(&pulse_at(id, 1, millisol)).unwrap();
        }
        assert_eq!(activity.state(), ActivityState::Done);
        assert!(settlement.group_activities(false).is_empty());
        assert!(settlement.future_events().is_empty());
    }

    #[test]
    fn cancel_by_name() {
        let settlement = Settlement::from_config(&config(0.0), None);
        let now = MarsTime::new(1, 100.0);
        settlement.schedule_activities(
            &[meeting("Sol Meeting", 1), meeting("Movie Night", 1)],
            &now,
        );

        assert!(settlement.cancel_activity("Movie Night"));
        assert!(!settlement.cancel_activity("Parade"));

        settlement.on_pulse(&pulse_at(1, 1, 500.0)).unwrap();
        let remaining = settlement.group_activities(false);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining.first().unwrap().name(), "Sol Meeting");
        assert_eq!(settlement.future_events().len(), 1);
    }

    #[test]
    fn settlement_without_matching_venue_defers() {
        let mut cfg = config(0.0);
        cfg.venues.retain(|v| v.category != BuildingCategory::Command);
        let history = history();
        let settlement = Settlement::from_config(&cfg, Some(Arc::clone(&history)));
        let activity =
            settlement.schedule_activity(meeting("Sol Meeting", 1), &MarsTime::new(1, 100.0));

        settlement.on_pulse(&pulse_at(1, 1, 500.0)).unwrap();
        assert_eq!(activity.state(), ActivityState::Scheduled);
        assert_eq!(
            history.latest().unwrap().event.event_type,
            HistoricalEventType::ActivityDeferred
        );

        settlement.add_venue(Venue {
            id: BuildingId::new(),
            name: "New Hub".to_owned(),
            category: BuildingCategory::Command,
            capacity: 4,
            has_life_support: true,
        });
        settlement.on_pulse(&pulse_at(2, 2, 500.0)).unwrap();
        assert_eq!(activity.state(), ActivityState::Pending);
        assert_eq!(activity.meeting_place().unwrap().name, "New Hub");
    }
}
