//! Historical event values.
//!
//! A [`HistoricalEvent`] is what producers build: it describes what happened
//! but carries no timestamp. The manager stamps it on registration and keeps
//! the result as a [`HistoricalRecord`].

use marsim_types::{EventId, HistoricalEventCategory, HistoricalEventType, MarsTime};
use serde::{Deserialize, Serialize};

/// A notable occurrence, as reported by a producer.
///
/// Immutable once built. Use the `with_*` methods to fill in the optional
/// descriptive fields before handing the event to the manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalEvent {
    /// What kind of event this is.
    pub event_type: HistoricalEventType,
    /// Broad classification, derived from the event type.
    pub category: HistoricalEventCategory,
    /// Name of the entity that produced the event.
    pub source: String,
    /// Why it happened.
    pub cause: String,
    /// What the subject was doing at the time.
    pub context: String,
    /// Who or what was affected.
    pub subject: String,
    /// A second entity involved (vehicle, building, mission).
    pub related_entity: String,
    /// Where it happened.
    pub location: String,
    /// The settlement the event is associated with.
    pub settlement: String,
}

impl HistoricalEvent {
    /// Create an event with the mandatory fields; the rest start empty.
    pub fn new(
        event_type: HistoricalEventType,
        source: impl Into<String>,
        cause: impl Into<String>,
    ) -> Self {
        Self {
            event_type,
            category: event_type.category(),
            source: source.into(),
            cause: cause.into(),
            context: String::new(),
            subject: String::new(),
            related_entity: String::new(),
            location: String::new(),
            settlement: String::new(),
        }
    }

    /// Set what the subject was doing.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    /// Set who or what was affected.
    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Set the second entity involved.
    #[must_use]
    pub fn with_related_entity(mut self, entity: impl Into<String>) -> Self {
        self.related_entity = entity.into();
        self
    }

    /// Set where it happened.
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// Set the associated settlement.
    #[must_use]
    pub fn with_settlement(mut self, settlement: impl Into<String>) -> Self {
        self.settlement = settlement.into();
        self
    }

    /// Whether `other` reports the same occurrence.
    ///
    /// Compares type, category, source, cause, context, subject, related
    /// entity and location. The settlement is not compared.
    pub fn is_duplicate_of(&self, other: &Self) -> bool {
        self.event_type == other.event_type
            && self.category == other.category
            && self.source == other.source
            && self.cause == other.cause
            && self.context == other.context
            && self.subject == other.subject
            && self.related_entity == other.related_entity
            && self.location == other.location
    }
}

/// A registered, timestamped event held in the history buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalRecord {
    /// Unique record identifier.
    pub id: EventId,
    /// Simulated time at which the event was registered.
    pub timestamp: MarsTime,
    /// The event itself.
    pub event: HistoricalEvent,
}
