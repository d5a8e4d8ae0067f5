//! Enumeration types shared across the Marsim workspace.
//!
//! Building categories and task scopes describe where and when a group
//! activity may run. [`ActivityState`] is the closed set of states a group
//! activity moves through, and the historical event enums classify entries
//! in the rolling history log.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Buildings
// ---------------------------------------------------------------------------

/// The functional category of a building.
///
/// Group activities name the category of venue they need; the host
/// settlement is queried for buildings of that category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum BuildingCategory {
    /// Command and control.
    Command,
    /// Quarters, lounges and dining areas.
    Living,
    /// Science laboratories.
    Laboratory,
    /// Infirmary and medical bays.
    Medical,
    /// Greenhouses.
    Farming,
    /// Workshops and manufacturing.
    Workshop,
    /// Observatories.
    Astronomy,
    /// Garages and vehicle bays.
    Vehicle,
    /// Storage hangars.
    Storage,
    /// Hallways, tunnels and other connectors.
    Connection,
}

/// The part of the working day a task or activity belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum TaskScope {
    /// May be taken up at any hour.
    AnyHour,
    /// Only during a worker's on-duty shift.
    WorkHour,
    /// Only while off duty.
    NonWorkHour,
}

// ---------------------------------------------------------------------------
// Group activities
// ---------------------------------------------------------------------------

/// Lifecycle state of a scheduled group activity.
///
/// Exactly one state is current at a time. `Unscheduled` only exists until
/// the activity has registered itself with its host's event queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ActivityState {
    /// Waiting for the next start time.
    Scheduled,
    /// A venue has been picked and participants are gathering.
    Pending,
    /// The activity is under way.
    Active,
    /// A one-off activity that has finished (or was cancelled).
    Done,
    /// Not yet registered with a queue.
    Unscheduled,
}

impl ActivityState {
    /// Return a lowercase label for logging.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Done => "done",
            Self::Unscheduled => "unscheduled",
        }
    }
}

// ---------------------------------------------------------------------------
// Historical events
// ---------------------------------------------------------------------------

/// Broad classification of a historical event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum HistoricalEventCategory {
    /// Equipment and building malfunctions.
    Malfunction,
    /// Illness, injury and death.
    Medical,
    /// Mission lifecycle.
    Mission,
    /// Individual task progress (very chatty).
    Task,
    /// Resupply and transport arrivals.
    Transport,
    /// Environmental hazards.
    Hazard,
    /// Scheduled group activities.
    Activity,
}

/// Specific kind of a historical event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum HistoricalEventType {
    // --- Malfunction ---
    /// A malfunction occurred and has not been repaired.
    MalfunctionUnfixed,
    /// A malfunction was repaired.
    MalfunctionFixed,
    /// A malfunction caused by human error.
    MalfunctionHumanFactors,
    /// A malfunction caused by worn-out parts.
    MalfunctionPartsFailure,

    // --- Medical ---
    /// A person fell ill or was injured.
    MedicalStarts,
    /// A person recovered.
    MedicalCured,
    /// A person died.
    MedicalDeath,
    /// A person was rescued for treatment.
    MedicalRescue,

    // --- Mission ---
    /// A mission started.
    MissionStart,
    /// A member joined a mission.
    MissionJoining,
    /// A mission finished.
    MissionFinish,
    /// A mission turned on its emergency beacon.
    MissionEmergencyBeaconOn,
    /// A mission diverted to an emergency destination.
    MissionEmergencyDestination,
    /// A mission member needs medical care.
    MissionMedicalEmergency,
    /// A mission lacks the resources to continue.
    MissionNotEnoughResources,
    /// A rescue vehicle met the stranded vehicle.
    MissionRendezvous,
    /// A stranded person was rescued.
    MissionRescuePerson,

    // --- Task ---
    /// A task finished.
    TaskFinish,

    // --- Transport ---
    /// A resupply arrived.
    TransportItemArrived,
    /// A resupply was rescheduled or modified.
    TransportItemModified,

    // --- Hazard ---
    /// A radiation exposure event.
    HazardRadiationExposure,
    /// A meteorite struck a structure.
    HazardMeteoriteImpact,

    // --- Activity ---
    /// A group activity picked a venue and is gathering participants.
    ActivityGathering,
    /// A group activity started.
    ActivityStarted,
    /// A group activity finished.
    ActivityFinished,
    /// A group activity found no venue and was deferred.
    ActivityDeferred,
}

impl HistoricalEventType {
    /// Return the category this event type belongs to.
    pub const fn category(self) -> HistoricalEventCategory {
        match self {
            Self::MalfunctionUnfixed
            | Self::MalfunctionFixed
            | Self::MalfunctionHumanFactors
            | Self::MalfunctionPartsFailure => HistoricalEventCategory::Malfunction,
            Self::MedicalStarts | Self::MedicalCured | Self::MedicalDeath | Self::MedicalRescue => {
                HistoricalEventCategory::Medical
            }
            Self::MissionStart
            | Self::MissionJoining
            | Self::MissionFinish
            | Self::MissionEmergencyBeaconOn
            | Self::MissionEmergencyDestination
            | Self::MissionMedicalEmergency
            | Self::MissionNotEnoughResources
            | Self::MissionRendezvous
            | Self::MissionRescuePerson => HistoricalEventCategory::Mission,
            Self::TaskFinish => HistoricalEventCategory::Task,
            Self::TransportItemArrived | Self::TransportItemModified => {
                HistoricalEventCategory::Transport
            }
            Self::HazardRadiationExposure | Self::HazardMeteoriteImpact => {
                HistoricalEventCategory::Hazard
            }
            Self::ActivityGathering
            | Self::ActivityStarted
            | Self::ActivityFinished
            | Self::ActivityDeferred => HistoricalEventCategory::Activity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_types_map_to_their_category() {
        assert_eq!(
            HistoricalEventType::MalfunctionFixed.category(),
            HistoricalEventCategory::Malfunction
        );
        assert_eq!(
            HistoricalEventType::MissionRescuePerson.category(),
            HistoricalEventCategory::Mission
        );
        assert_eq!(
            HistoricalEventType::ActivityStarted.category(),
            HistoricalEventCategory::Activity
        );
        assert_eq!(
            HistoricalEventType::TaskFinish.category(),
            HistoricalEventCategory::Task
        );
    }

    #[test]
    fn building_category_uses_snake_case_on_the_wire() {
        let json = serde_json::to_string(&BuildingCategory::Living).ok();
        assert_eq!(json.as_deref(), Some("\"living\""));
        let parsed: Result<TaskScope, _> = serde_json::from_str("\"non_work_hour\"");
        assert_eq!(parsed.ok(), Some(TaskScope::NonWorkHour));
    }
}
